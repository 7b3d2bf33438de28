use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::catalog::ValueType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
    IsEmpty,
    IsNotEmpty,
    In,
    NotIn,
}

impl Operator {
    pub(crate) const ALL: [Operator; 14] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::Contains,
        Operator::NotContains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::GreaterThan,
        Operator::LessThan,
        Operator::GreaterEqual,
        Operator::LessEqual,
        Operator::IsEmpty,
        Operator::IsNotEmpty,
        Operator::In,
        Operator::NotIn,
    ];

    /// `is_empty` and `is_not_empty` look only at the record.
    pub(crate) fn takes_value(self) -> bool {
        !matches!(self, Operator::IsEmpty | Operator::IsNotEmpty)
    }

    pub(crate) fn takes_list(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::GreaterEqual => "greater_equal",
            Operator::LessEqual => "less_equal",
            Operator::IsEmpty => "is_empty",
            Operator::IsNotEmpty => "is_not_empty",
            Operator::In => "in",
            Operator::NotIn => "not_in",
        }
    }

    /// The value a condition holds right after this operator is chosen.
    pub(crate) fn cleared_value(self) -> Option<ConditionValue> {
        if !self.takes_value() {
            None
        } else if self.takes_list() {
            Some(ConditionValue::List(Vec::new()))
        } else {
            Some(ConditionValue::Scalar(String::new()))
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The right-hand side of a condition: a string, or a list of strings for
/// `in`/`not_in`. A JSON `null` is represented by the absence of a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum ConditionValue {
    Scalar(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Condition {
    pub(crate) id: String,
    pub(crate) field_id: String,
    pub(crate) operator: Operator,
    #[serde(default)]
    pub(crate) value: Option<ConditionValue>,
}

impl Condition {
    pub(crate) fn new(
        id: impl Into<String>,
        field_id: impl Into<String>,
        operator: Operator,
        value: Option<ConditionValue>,
    ) -> Self {
        Self {
            id: id.into(),
            field_id: field_id.into(),
            operator,
            value,
        }
    }

    /// Returns the scalar operand, failing if the condition holds a list or nothing.
    pub(crate) fn scalar(&self) -> Result<&str, ConditionError> {
        match &self.value {
            Some(ConditionValue::Scalar(value)) => Ok(value),
            Some(ConditionValue::List(_)) => Err(ConditionError::ExpectedScalar {
                operator: self.operator,
            }),
            None => Err(ConditionError::MissingValue {
                operator: self.operator,
            }),
        }
    }

    pub(crate) fn list(&self) -> Result<&[String], ConditionError> {
        match &self.value {
            Some(ConditionValue::List(values)) => Ok(values),
            Some(ConditionValue::Scalar(_)) => Err(ConditionError::ExpectedList {
                operator: self.operator,
            }),
            None => Err(ConditionError::MissingValue {
                operator: self.operator,
            }),
        }
    }

    /// Checks that the operand has the shape the operator needs.
    pub(crate) fn check_shape(&self) -> Result<(), ConditionError> {
        if !self.operator.takes_value() {
            Ok(())
        } else if self.operator.takes_list() {
            self.list().map(|_| ())
        } else {
            self.scalar().map(|_| ())
        }
    }

    /// Fails while the operand is still the cleared `""` or `[]`.
    pub(crate) fn check_complete(&self) -> Result<(), ConditionError> {
        let blank = match &self.value {
            Some(ConditionValue::Scalar(value)) => value.trim().is_empty(),
            Some(ConditionValue::List(values)) => values.is_empty(),
            None => false,
        };
        if blank && self.operator.takes_value() {
            Err(ConditionError::EmptyValue {
                operator: self.operator,
            })
        } else {
            Ok(())
        }
    }
}

/// The matching rule of a view.
///
/// A record matches when every condition in `all_conditions` holds and, unless
/// `any_conditions` is empty, at least one condition in `any_conditions` holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ConditionGroupSet {
    pub(crate) all_conditions: Vec<Condition>,
    pub(crate) any_conditions: Vec<Condition>,
}

impl ConditionGroupSet {
    pub(crate) fn is_empty(&self) -> bool {
        self.all_conditions.is_empty() && self.any_conditions.is_empty()
    }

    pub(crate) fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.all_conditions.iter().chain(&self.any_conditions)
    }

    /// Condition ids must be unique within their group.
    pub(crate) fn check_ids(&self) -> Result<(), ConditionError> {
        for group in [&self.all_conditions, &self.any_conditions] {
            let mut seen = HashSet::new();
            for condition in group {
                if !seen.insert(condition.id.as_str()) {
                    return Err(ConditionError::DuplicateId {
                        id: condition.id.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub(crate) enum ConditionError {
    #[error("unknown field {field_id}")]
    UnknownField { field_id: String },

    #[error("operator {operator} is not allowed on {value_type} field {field_id}")]
    IllegalOperator {
        field_id: String,
        value_type: ValueType,
        operator: Operator,
    },

    #[error("operator {operator} requires a value")]
    MissingValue { operator: Operator },

    #[error("operator {operator} needs a value to compare against")]
    EmptyValue { operator: Operator },

    #[error("operator {operator} requires a list of values")]
    ExpectedList { operator: Operator },

    #[error("operator {operator} requires a single value")]
    ExpectedScalar { operator: Operator },

    #[error("{value:?} is not a date")]
    InvalidDate { value: String },

    #[error("{value:?} is not a number")]
    InvalidNumber { value: String },

    #[error("condition id {id} is used more than once in its group")]
    DuplicateId { id: String },
}

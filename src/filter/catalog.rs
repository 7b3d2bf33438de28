use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{condition::Operator, evaluate::comparator};

/// The semantic type of a ticket field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ValueType {
    Text,
    Select,
    Multiselect,
    Date,
    Number,
}

impl ValueType {
    pub(crate) const ALL: [ValueType; 5] = [
        ValueType::Text,
        ValueType::Select,
        ValueType::Multiselect,
        ValueType::Date,
        ValueType::Number,
    ];

    /// Legal operators for this type, in display order.
    ///
    /// The first entry is what a condition starts with when its field is picked.
    pub(crate) fn operators(self) -> &'static [Operator] {
        use Operator::*;

        match self {
            ValueType::Text => &[
                Contains,
                NotContains,
                Equals,
                NotEquals,
                StartsWith,
                EndsWith,
                IsEmpty,
                IsNotEmpty,
            ],
            ValueType::Select => &[Equals, NotEquals, In, NotIn, IsEmpty, IsNotEmpty],
            ValueType::Multiselect => &[Contains, NotContains, In, NotIn, IsEmpty, IsNotEmpty],
            ValueType::Date => &[
                Equals,
                LessThan,
                GreaterThan,
                LessEqual,
                GreaterEqual,
                IsEmpty,
                IsNotEmpty,
            ],
            ValueType::Number => &[
                Equals,
                NotEquals,
                GreaterThan,
                LessThan,
                GreaterEqual,
                LessEqual,
                IsEmpty,
                IsNotEmpty,
            ],
        }
    }

    pub(crate) fn supports(self, operator: Operator) -> bool {
        self.operators().contains(&operator)
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ValueType::Text => "text",
            ValueType::Select => "select",
            ValueType::Multiselect => "multiselect",
            ValueType::Date => "date",
            ValueType::Number => "number",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FieldDescriptor {
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) value_type: ValueType,
}

impl FieldDescriptor {
    fn new(id: &str, label: &str, value_type: ValueType) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            value_type,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub(crate) enum CatalogError {
    #[error("field id must not be empty")]
    EmptyFieldId,

    #[error("field {0} is defined more than once")]
    DuplicateField(String),

    #[error("value type {0} has no operators")]
    NoOperators(ValueType),

    #[error("operator {operator} is offered for {value_type} but cannot be evaluated")]
    MissingComparator {
        value_type: ValueType,
        operator: Operator,
    },

    #[error("operator {operator} can be evaluated for {value_type} but is not offered")]
    UnlistedComparator {
        value_type: ValueType,
        operator: Operator,
    },
}

/// The fixed registry of filterable fields.
#[derive(Debug, Clone)]
pub(crate) struct Catalog {
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Builds a catalog, refusing one whose operator table and comparison table
    /// disagree for any value type.
    pub(crate) fn new(fields: Vec<FieldDescriptor>) -> Result<Self, CatalogError> {
        for value_type in ValueType::ALL {
            if value_type.operators().is_empty() {
                return Err(CatalogError::NoOperators(value_type));
            }
            for operator in Operator::ALL {
                match (value_type.supports(operator), comparator(value_type, operator)) {
                    (true, None) => {
                        return Err(CatalogError::MissingComparator {
                            value_type,
                            operator,
                        })
                    }
                    (false, Some(_)) => {
                        return Err(CatalogError::UnlistedComparator {
                            value_type,
                            operator,
                        })
                    }
                    _ => {}
                }
            }
        }

        let mut index = HashMap::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            if field.id.is_empty() {
                return Err(CatalogError::EmptyFieldId);
            }
            if index.insert(field.id.clone(), position).is_some() {
                return Err(CatalogError::DuplicateField(field.id.clone()));
            }
        }
        Ok(Self { fields, index })
    }

    /// The fields a ticket exposes to views.
    pub(crate) fn ticket_fields() -> Result<Self, CatalogError> {
        Self::new(vec![
            FieldDescriptor::new("status", "Status", ValueType::Select),
            FieldDescriptor::new("priority", "Priority", ValueType::Select),
            FieldDescriptor::new("type", "Type", ValueType::Select),
            FieldDescriptor::new("channel", "Channel", ValueType::Select),
            FieldDescriptor::new("subject", "Subject", ValueType::Text),
            FieldDescriptor::new("description", "Description", ValueType::Text),
            FieldDescriptor::new("requester", "Requester", ValueType::Text),
            FieldDescriptor::new("assignee", "Assignee", ValueType::Select),
            FieldDescriptor::new("group", "Group", ValueType::Select),
            FieldDescriptor::new("tags", "Tags", ValueType::Multiselect),
            FieldDescriptor::new("created_at", "Created", ValueType::Date),
            FieldDescriptor::new("updated_at", "Updated", ValueType::Date),
            FieldDescriptor::new("due_date", "Due date", ValueType::Date),
            FieldDescriptor::new("replies", "Replies", ValueType::Number),
        ])
    }

    pub(crate) fn field(&self, id: &str) -> Option<&FieldDescriptor> {
        self.index.get(id).map(|&position| &self.fields[position])
    }

    pub(crate) fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }
}

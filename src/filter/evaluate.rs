use chrono::NaiveDate;

use super::{
    catalog::{Catalog, ValueType},
    condition::{Condition, ConditionError, ConditionGroupSet, Operator},
    record::{parse_date, FieldValue, Record},
};

/// Compares a present, non-null record value against a condition's operand.
pub(crate) type Comparator = fn(&FieldValue, &Condition) -> Result<bool, ConditionError>;

/// The comparison table, keyed by `(value type, operator)`.
///
/// `None` marks a pair that is not legal. `Catalog::new` checks this table
/// against `ValueType::operators`, so the two cannot drift apart.
pub(crate) fn comparator(value_type: ValueType, operator: Operator) -> Option<Comparator> {
    use Operator::*;

    let comparator: Comparator = match (value_type, operator) {
        (_, IsEmpty | IsNotEmpty) => presence,

        (ValueType::Text | ValueType::Select, Equals) => text_equals,
        (ValueType::Text | ValueType::Select, NotEquals) => |v, c| text_equals(v, c).map(|b| !b),
        (ValueType::Text, Contains) => text_contains,
        (ValueType::Text, NotContains) => |v, c| text_contains(v, c).map(|b| !b),
        (ValueType::Text, StartsWith) => text_starts_with,
        (ValueType::Text, EndsWith) => text_ends_with,
        (ValueType::Select, In) => select_in,
        (ValueType::Select, NotIn) => |v, c| select_in(v, c).map(|b| !b),

        (ValueType::Multiselect, Contains) => list_contains,
        (ValueType::Multiselect, NotContains) => |v, c| list_contains(v, c).map(|b| !b),
        (ValueType::Multiselect, In) => list_intersects,
        (ValueType::Multiselect, NotIn) => |v, c| list_intersects(v, c).map(|b| !b),

        (ValueType::Date, Equals) => |v, c| date_cmp(v, c, |r, o| r == o),
        (ValueType::Date, LessThan) => |v, c| date_cmp(v, c, |r, o| r < o),
        (ValueType::Date, GreaterThan) => |v, c| date_cmp(v, c, |r, o| r > o),
        (ValueType::Date, LessEqual) => |v, c| date_cmp(v, c, |r, o| r <= o),
        (ValueType::Date, GreaterEqual) => |v, c| date_cmp(v, c, |r, o| r >= o),

        (ValueType::Number, Equals) => |v, c| number_cmp(v, c, |r, o| r == o),
        (ValueType::Number, NotEquals) => |v, c| number_cmp(v, c, |r, o| r != o),
        (ValueType::Number, LessThan) => |v, c| number_cmp(v, c, |r, o| r < o),
        (ValueType::Number, GreaterThan) => |v, c| number_cmp(v, c, |r, o| r > o),
        (ValueType::Number, LessEqual) => |v, c| number_cmp(v, c, |r, o| r <= o),
        (ValueType::Number, GreaterEqual) => |v, c| number_cmp(v, c, |r, o| r >= o),

        (
            ValueType::Text,
            GreaterThan | LessThan | GreaterEqual | LessEqual | In | NotIn,
        )
        | (
            ValueType::Select,
            Contains | NotContains | StartsWith | EndsWith | GreaterThan | LessThan
            | GreaterEqual | LessEqual,
        )
        | (
            ValueType::Multiselect,
            Equals | NotEquals | StartsWith | EndsWith | GreaterThan | LessThan | GreaterEqual
            | LessEqual,
        )
        | (
            ValueType::Date,
            NotEquals | Contains | NotContains | StartsWith | EndsWith | In | NotIn,
        )
        | (
            ValueType::Number,
            Contains | NotContains | StartsWith | EndsWith | In | NotIn,
        ) => return None,
    };
    Some(comparator)
}

fn presence(value: &FieldValue, condition: &Condition) -> Result<bool, ConditionError> {
    let empty = value.is_empty();
    Ok(if condition.operator == Operator::IsEmpty {
        empty
    } else {
        !empty
    })
}

fn text_equals(value: &FieldValue, condition: &Condition) -> Result<bool, ConditionError> {
    let operand = condition.scalar()?;
    Ok(value.as_text().is_some_and(|text| text == operand))
}

fn text_contains(value: &FieldValue, condition: &Condition) -> Result<bool, ConditionError> {
    let operand = condition.scalar()?;
    Ok(value.as_text().is_some_and(|text| text.contains(operand)))
}

fn text_starts_with(value: &FieldValue, condition: &Condition) -> Result<bool, ConditionError> {
    let operand = condition.scalar()?;
    Ok(value.as_text().is_some_and(|text| text.starts_with(operand)))
}

fn text_ends_with(value: &FieldValue, condition: &Condition) -> Result<bool, ConditionError> {
    let operand = condition.scalar()?;
    Ok(value.as_text().is_some_and(|text| text.ends_with(operand)))
}

fn select_in(value: &FieldValue, condition: &Condition) -> Result<bool, ConditionError> {
    let operands = condition.list()?;
    Ok(value
        .as_text()
        .is_some_and(|text| operands.iter().any(|operand| *operand == text)))
}

fn list_contains(value: &FieldValue, condition: &Condition) -> Result<bool, ConditionError> {
    let operand = condition.scalar()?;
    Ok(value
        .as_list()
        .is_some_and(|items| items.contains(&operand)))
}

fn list_intersects(value: &FieldValue, condition: &Condition) -> Result<bool, ConditionError> {
    let operands = condition.list()?;
    Ok(value.as_list().is_some_and(|items| {
        items
            .iter()
            .any(|item| operands.iter().any(|operand| operand == item))
    }))
}

fn date_operand(condition: &Condition) -> Result<NaiveDate, ConditionError> {
    let operand = condition.scalar()?;
    parse_date(operand).ok_or_else(|| ConditionError::InvalidDate {
        value: operand.to_string(),
    })
}

fn date_cmp(
    value: &FieldValue,
    condition: &Condition,
    holds: fn(NaiveDate, NaiveDate) -> bool,
) -> Result<bool, ConditionError> {
    let operand = date_operand(condition)?;
    Ok(value.as_date().is_some_and(|date| holds(date, operand)))
}

fn number_operand(condition: &Condition) -> Result<f64, ConditionError> {
    let operand = condition.scalar()?;
    operand
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .ok_or_else(|| ConditionError::InvalidNumber {
            value: operand.to_string(),
        })
}

#[allow(clippy::float_cmp)]
fn number_cmp(
    value: &FieldValue,
    condition: &Condition,
    holds: fn(f64, f64) -> bool,
) -> Result<bool, ConditionError> {
    let operand = number_operand(condition)?;
    Ok(value.as_number().is_some_and(|number| holds(number, operand)))
}

/// A condition that can never match, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Diagnostic {
    pub(crate) condition_id: String,
    pub(crate) error: ConditionError,
}

/// Decides whether records satisfy a condition group.
///
/// Holds nothing but a reference to the catalog, so it is `Copy` and can be
/// shared freely across threads and requests.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Evaluator<'c> {
    catalog: &'c Catalog,
}

impl<'c> Evaluator<'c> {
    pub(crate) fn new(catalog: &'c Catalog) -> Self {
        Self { catalog }
    }

    /// Resolves the comparator for a condition, checking everything about it
    /// that does not depend on the record.
    pub(crate) fn prepare(&self, condition: &Condition) -> Result<Comparator, ConditionError> {
        let field = self
            .catalog
            .field(&condition.field_id)
            .ok_or_else(|| ConditionError::UnknownField {
                field_id: condition.field_id.clone(),
            })?;
        let compare = comparator(field.value_type, condition.operator).ok_or_else(|| {
            ConditionError::IllegalOperator {
                field_id: field.id.clone(),
                value_type: field.value_type,
                operator: condition.operator,
            }
        })?;
        condition.check_shape()?;
        if condition.operator.takes_value() {
            match field.value_type {
                ValueType::Date => {
                    date_operand(condition)?;
                }
                ValueType::Number => {
                    number_operand(condition)?;
                }
                ValueType::Text | ValueType::Select | ValueType::Multiselect => {}
            }
        }
        Ok(compare)
    }

    /// Evaluates one condition against a record.
    ///
    /// A record without the field, or with a null in it, satisfies `is_empty`
    /// and nothing else.
    pub(crate) fn evaluate_one<R: Record + ?Sized>(
        &self,
        record: &R,
        condition: &Condition,
    ) -> Result<bool, ConditionError> {
        let compare = self.prepare(condition)?;
        let value = record.field(&condition.field_id).unwrap_or(FieldValue::Null);
        if matches!(value, FieldValue::Null) && condition.operator.takes_value() {
            return Ok(false);
        }
        compare(&value, condition)
    }

    /// Whether `record` satisfies `group`. Malformed conditions count as false.
    pub(crate) fn matches<R: Record + ?Sized>(&self, record: &R, group: &ConditionGroupSet) -> bool {
        let holds = |condition: &Condition| self.evaluate_one(record, condition).unwrap_or(false);

        group.all_conditions.iter().all(holds)
            && (group.any_conditions.is_empty() || group.any_conditions.iter().any(holds))
    }

    /// Lists every condition in `group` that cannot match any record.
    pub(crate) fn diagnose(&self, group: &ConditionGroupSet) -> Vec<Diagnostic> {
        group
            .conditions()
            .filter_map(|condition| {
                self.prepare(condition).err().map(|error| Diagnostic {
                    condition_id: condition.id.clone(),
                    error,
                })
            })
            .collect()
    }
}

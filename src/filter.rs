//! Ticket filter conditions and their evaluation.
//!
//! A saved view carries a [`ConditionGroupSet`]: every condition of the "all"
//! group must hold, and at least one of the "any" group when it is non-empty.
//! Conditions are `{field, operator, value}` triples checked against the
//! [`Catalog`], which fixes the value type of every field and therefore the
//! operators that are legal on it.

mod builder;
mod catalog;
mod condition;
mod evaluate;
mod record;

use tracing::warn;

pub(crate) use self::builder::{default_operator_for, ConditionBuilder};
pub(crate) use self::catalog::{Catalog, ValueType};
pub(crate) use self::condition::{
    Condition, ConditionError, ConditionGroupSet, ConditionValue, Operator,
};
pub(crate) use self::evaluate::Evaluator;
pub(crate) use self::record::{compare_by, FieldValue, Record};

/// Filters `records` down to those matching `group`.
///
/// Malformed conditions never match. Each one is logged once before the batch
/// is evaluated.
pub(crate) fn matching<'a, R, I>(
    evaluator: Evaluator<'a>,
    group: &'a ConditionGroupSet,
    records: I,
) -> impl Iterator<Item = R> + 'a
where
    R: Record + 'a,
    I: IntoIterator<Item = R>,
    I::IntoIter: 'a,
{
    log_diagnostics(evaluator, group);
    records
        .into_iter()
        .filter(move |record| evaluator.matches(record, group))
}

/// Logs every condition in `group` that can never match.
pub(crate) fn log_diagnostics(evaluator: Evaluator<'_>, group: &ConditionGroupSet) {
    for diagnostic in evaluator.diagnose(group) {
        warn!(
            condition_id = %diagnostic.condition_id,
            error = %diagnostic.error,
            "condition can never match"
        );
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::*;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test records are objects"),
        }
    }

    #[test]
    fn matching_skips_malformed_conditions() {
        let catalog = Catalog::ticket_fields().unwrap();
        let group: ConditionGroupSet = serde_json::from_value(json!({
            "allConditions": [],
            "anyConditions": [
                {"id": "a", "fieldId": "sla_breach", "operator": "equals", "value": "yes"},
                {"id": "b", "fieldId": "priority", "operator": "equals", "value": "High"}
            ]
        }))
        .unwrap();
        let records = vec![
            record(json!({"priority": "High"})),
            record(json!({"priority": "Low", "sla_breach": "yes"})),
        ];

        let matched: Vec<_> = matching(Evaluator::new(&catalog), &group, records).collect();
        assert_eq!(matched, vec![record(json!({"priority": "High"}))]);
    }
}

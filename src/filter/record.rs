use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};

/// A field value read off a record.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldValue {
    Null,
    Text(String),
    Number(f64),
    Date(DateTime<Utc>),
    List(Vec<String>),
}

impl FieldValue {
    pub(crate) fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(text) => text.is_empty(),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Number(_) | FieldValue::Date(_) => false,
        }
    }

    /// The value as it would be shown in a list cell or group header.
    pub(crate) fn display(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(text) => Some(text.clone()),
            FieldValue::Number(number) => Some(number.to_string()),
            FieldValue::Date(date) => Some(date.date_naive().to_string()),
            FieldValue::List(items) => Some(items.join(", ")),
        }
    }

    pub(crate) fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(text) => Some(text.clone()),
            FieldValue::Number(number) => Some(number.to_string()),
            FieldValue::Date(date) => Some(date.to_rfc3339()),
            FieldValue::Null | FieldValue::List(_) => None,
        }
    }

    /// A lone text value counts as a one-element list.
    pub(crate) fn as_list(&self) -> Option<Vec<&str>> {
        match self {
            FieldValue::List(items) => Some(items.iter().map(String::as_str).collect()),
            FieldValue::Text(text) => Some(vec![text.as_str()]),
            FieldValue::Null | FieldValue::Number(_) | FieldValue::Date(_) => None,
        }
    }

    pub(crate) fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(date) => Some(date.date_naive()),
            FieldValue::Text(text) => parse_date(text),
            _ => None,
        }
    }

    pub(crate) fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(number) => Some(*number),
            FieldValue::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Orders two values of the same field. Values of differing kinds fall
    /// back to comparing their display text.
    pub(crate) fn compare(&self, other: &FieldValue) -> Ordering {
        match (self, other) {
            (FieldValue::Number(a), FieldValue::Number(b)) => a.total_cmp(b),
            (FieldValue::Date(a), FieldValue::Date(b)) => a.cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            (FieldValue::List(a), FieldValue::List(b)) => a.cmp(b),
            _ => self.display().cmp(&other.display()),
        }
    }
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp, keeping the UTC day.
pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|date| date.with_timezone(&Utc).date_naive())
    })
}

/// Anything whose fields can be looked up by catalog id.
pub(crate) trait Record {
    /// `None` when the record has no such field at all.
    fn field(&self, field_id: &str) -> Option<FieldValue>;
}

impl<R: Record + ?Sized> Record for &R {
    fn field(&self, field_id: &str) -> Option<FieldValue> {
        (**self).field(field_id)
    }
}

impl Record for Map<String, Value> {
    fn field(&self, field_id: &str) -> Option<FieldValue> {
        self.get(field_id).map(|value| match value {
            Value::Null => FieldValue::Null,
            Value::String(text) => FieldValue::Text(text.clone()),
            Value::Number(number) => number
                .as_f64()
                .map_or(FieldValue::Null, FieldValue::Number),
            Value::Bool(flag) => FieldValue::Text(flag.to_string()),
            Value::Array(items) => FieldValue::List(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            Value::Object(_) => FieldValue::Text(value.to_string()),
        })
    }
}

/// Orders records by one field, with records lacking a value always last.
pub(crate) fn compare_by<R: Record>(a: &R, b: &R, field_id: &str, descending: bool) -> Ordering {
    let a = a.field(field_id).filter(|value| !value.is_empty());
    let b = b.field(field_id).filter(|value| !value.is_empty());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ordering = a.compare(&b);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn json_records() {
        let record = object(json!({
            "status": "Open",
            "tags": ["vip", 3],
            "replies": 4,
            "assignee": null
        }));
        assert_eq!(
            record.field("status"),
            Some(FieldValue::Text("Open".to_string()))
        );
        assert_eq!(
            record.field("tags"),
            Some(FieldValue::List(vec!["vip".to_string(), "3".to_string()]))
        );
        assert_eq!(record.field("replies"), Some(FieldValue::Number(4.0)));
        assert_eq!(record.field("assignee"), Some(FieldValue::Null));
        assert_eq!(record.field("group"), None);
    }

    #[test]
    fn emptiness() {
        assert!(FieldValue::Null.is_empty());
        assert!(FieldValue::Text(String::new()).is_empty());
        assert!(FieldValue::List(Vec::new()).is_empty());
        assert!(!FieldValue::Text(" ".to_string()).is_empty());
        assert!(!FieldValue::Number(0.0).is_empty());
    }

    #[test]
    fn dates_parse_to_utc_day() {
        assert_eq!(
            parse_date("2024-03-01"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(
            parse_date("2024-03-01T23:30:00-02:00"),
            NaiveDate::from_ymd_opt(2024, 3, 2)
        );
        assert_eq!(parse_date("March 1st"), None);
    }

    #[test]
    fn missing_values_sort_last_in_both_directions() {
        let a = object(json!({"replies": 2}));
        let b = object(json!({"replies": 5}));
        let none = object(json!({}));

        assert_eq!(compare_by(&a, &b, "replies", false), Ordering::Less);
        assert_eq!(compare_by(&a, &b, "replies", true), Ordering::Greater);
        assert_eq!(compare_by(&none, &a, "replies", false), Ordering::Greater);
        assert_eq!(compare_by(&none, &a, "replies", true), Ordering::Greater);
    }
}

use std::{fmt, ops::Bound};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Tree;

use super::{decode, encode, Database, Entity, Iter, TryFromKeyValue};
use crate::filter::{FieldValue, Record};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Ticket {
    pub(crate) id: u64,
    pub(crate) subject: String,
    pub(crate) description: String,
    pub(crate) status: String,
    pub(crate) priority: String,
    #[serde(rename = "type")]
    pub(crate) ticket_type: String,
    pub(crate) channel: String,
    pub(crate) requester: String,
    pub(crate) assignee: Option<String>,
    pub(crate) group: Option<String>,
    pub(crate) tags: Vec<String>,
    pub(crate) replies: u32,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) due_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Zero-padded to the width of `u64::MAX` so that byte order is id order.
    pub(crate) fn key_for(id: u64) -> Vec<u8> {
        format!("{id:020}").into_bytes()
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:020}", self.id)
    }
}

impl TryFromKeyValue for Ticket {
    fn try_from_key_value(_key: &[u8], value: &[u8]) -> Result<Self> {
        decode(value)
    }
}

impl Entity for Ticket {
    fn tree(db: &Database) -> &Tree {
        &db.tickets
    }

    fn key(&self) -> Vec<u8> {
        Self::key_for(self.id)
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(self)
    }
}

fn optional_text(value: Option<&String>) -> FieldValue {
    value.map_or(FieldValue::Null, |text| FieldValue::Text(text.clone()))
}

impl Record for Ticket {
    fn field(&self, field_id: &str) -> Option<FieldValue> {
        let value = match field_id {
            "id" => FieldValue::Number(self.id as f64),
            "subject" => FieldValue::Text(self.subject.clone()),
            "description" => FieldValue::Text(self.description.clone()),
            "status" => FieldValue::Text(self.status.clone()),
            "priority" => FieldValue::Text(self.priority.clone()),
            "type" => FieldValue::Text(self.ticket_type.clone()),
            "channel" => FieldValue::Text(self.channel.clone()),
            "requester" => FieldValue::Text(self.requester.clone()),
            "assignee" => optional_text(self.assignee.as_ref()),
            "group" => optional_text(self.group.as_ref()),
            "tags" => FieldValue::List(self.tags.clone()),
            "replies" => FieldValue::Number(f64::from(self.replies)),
            "created_at" => FieldValue::Date(self.created_at),
            "updated_at" => FieldValue::Date(self.updated_at),
            "due_date" => self.due_at.map_or(FieldValue::Null, FieldValue::Date),
            _ => return None,
        };
        Some(value)
    }
}

impl Database {
    pub(crate) fn insert_tickets(&self, tickets: Vec<Ticket>) -> Result<()> {
        for ticket in tickets {
            self.insert(&ticket)?;
        }
        Ok(())
    }

    pub(crate) fn tickets(&self, start: Bound<Vec<u8>>, end: Bound<Vec<u8>>) -> Iter<Ticket> {
        self.range(start, end)
    }

    pub(crate) fn ticket(&self, id: u64) -> Result<Option<Ticket>> {
        self.get(&Ticket::key_for(id))
    }
}

#[cfg(test)]
impl Ticket {
    pub(crate) fn sample(id: u64) -> Self {
        let created_at = "2024-05-01T09:00:00Z".parse().unwrap();
        Self {
            id,
            subject: format!("Ticket {id}"),
            description: String::new(),
            status: "Open".to_string(),
            priority: "Normal".to_string(),
            ticket_type: "Question".to_string(),
            channel: "Email".to_string(),
            requester: "someone@example.com".to_string(),
            assignee: None,
            group: None,
            tags: Vec::new(),
            replies: 0,
            created_at,
            updated_at: created_at,
            due_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{database::TestDatabase, filter::Catalog};

    #[test]
    fn every_catalog_field_resolves_on_a_ticket() {
        let catalog = Catalog::ticket_fields().unwrap();
        let ticket = Ticket::sample(1);
        for field in catalog.fields() {
            assert!(ticket.field(&field.id).is_some(), "{}", field.id);
        }
        assert_eq!(ticket.field("mood"), None);
    }

    #[test]
    fn unset_optional_fields_read_as_null() {
        let ticket = Ticket::sample(1);
        assert_eq!(ticket.field("assignee"), Some(FieldValue::Null));
        assert_eq!(ticket.field("due_date"), Some(FieldValue::Null));
    }

    #[test]
    fn tickets_round_trip_through_the_store() {
        let test = TestDatabase::new();
        let mut ticket = Ticket::sample(42);
        ticket.tags = vec!["vip".to_string()];
        ticket.assignee = Some("dana".to_string());
        test.db.insert_tickets(vec![ticket.clone()]).unwrap();
        assert_eq!(test.db.ticket(42).unwrap(), Some(ticket));
        assert_eq!(test.db.ticket(43).unwrap(), None);
    }

    #[test]
    fn json_uses_camel_case_and_type() {
        let value = serde_json::to_value(Ticket::sample(1)).unwrap();
        assert_eq!(value["type"], "Question");
        assert_eq!(value["createdAt"], "2024-05-01T09:00:00Z");
        assert!(value["dueAt"].is_null());
    }
}

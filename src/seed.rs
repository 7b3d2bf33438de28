//! Demo data loaded into an empty store.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::info;

use crate::{
    database::{
        CustomField, Database, DirectoryEntity, Form, Group, Member, Role, Tag, Ticket, View,
        ViewDraft,
    },
    filter::{Catalog, ValueType},
};

const TICKET_COUNT: u64 = 60;

const STATUSES: [&str; 5] = ["New", "Open", "Pending", "Solved", "Closed"];
const PRIORITIES: [&str; 4] = ["Low", "Normal", "High", "Urgent"];
const TYPES: [&str; 4] = ["Question", "Incident", "Problem", "Task"];
const CHANNELS: [&str; 4] = ["Email", "Web", "Chat", "Phone"];
const SUBJECTS: [&str; 6] = [
    "Cannot log in",
    "Refund for duplicate charge",
    "Export to CSV fails",
    "How do I add a teammate?",
    "Invoice shows wrong address",
    "App crashes on startup",
];
const TAGS: [&str; 5] = ["vip", "billing", "bug", "refund", "onboarding"];

/// Fills an empty store with tickets, directory entries and a few views.
pub(crate) fn seed(db: &Database, catalog: &Catalog) -> Result<()> {
    let now = Utc::now();
    let members = [
        ("Ada Park", "ada@example.com", Role::Admin),
        ("Ben Ortiz", "ben@example.com", Role::Agent),
        ("Chloe Wu", "chloe@example.com", Role::Agent),
        ("Dev Rao", "dev@example.com", Role::Viewer),
    ]
    .into_iter()
    .map(|(name, email, role)| Member {
        id: String::new(),
        name: name.to_string(),
        email: email.to_string(),
        role,
    })
    .map(|member| store(db, member))
    .collect::<Result<Vec<_>>>()?;

    for name in TAGS {
        store(
            db,
            Tag {
                id: String::new(),
                name: name.to_string(),
                color: None,
                description: None,
            },
        )?;
    }

    let groups = [("Billing", &members[..2]), ("Technical", &members[1..3])]
        .into_iter()
        .map(|(name, members)| Group {
            id: String::new(),
            name: name.to_string(),
            description: None,
            member_ids: members.iter().map(|member| member.id.clone()).collect(),
        })
        .map(|group| store(db, group))
        .collect::<Result<Vec<_>>>()?;

    let plan = store(
        db,
        CustomField {
            id: String::new(),
            label: "Plan".to_string(),
            value_type: ValueType::Select,
            options: vec!["Free".to_string(), "Pro".to_string(), "Enterprise".to_string()],
            required: true,
            description: None,
        },
    )?;
    let order = store(
        db,
        CustomField {
            id: String::new(),
            label: "Order number".to_string(),
            value_type: ValueType::Text,
            options: Vec::new(),
            required: false,
            description: Some("Shown on the receipt".to_string()),
        },
    )?;
    store(
        db,
        Form {
            id: String::new(),
            name: "Billing request".to_string(),
            field_ids: vec![plan.id, order.id],
            is_active: true,
        },
    )?;

    db.insert_tickets(
        (1..=TICKET_COUNT)
            .map(|id| ticket(id, now, &members, &groups))
            .collect(),
    )?;

    for draft in views()? {
        draft.validate(catalog)?;
        let view = View::new(db.generate_id()?.to_string(), draft, now);
        db.save_view(&view)?;
    }

    db.flush()?;
    info!(tickets = TICKET_COUNT, "seeded demo data");
    Ok(())
}

fn store<T: DirectoryEntity>(db: &Database, mut entity: T) -> Result<T> {
    entity.set_id(db.generate_id()?.to_string());
    entity.validate(db)?;
    db.insert(&entity)?;
    Ok(entity)
}

fn ticket(id: u64, now: DateTime<Utc>, members: &[Member], groups: &[Group]) -> Ticket {
    let i = id as usize;
    let created_at = now - Duration::hours((TICKET_COUNT - id) as i64 * 7 + 3);
    let assignee = (i % 5 != 0).then(|| members[i % 3].name.clone());
    let group = (i % 4 != 0).then(|| groups[i % groups.len()].name.clone());
    let tags = TAGS
        .iter()
        .enumerate()
        .filter(|(n, _)| (i + n) % 4 == 0)
        .map(|(_, tag)| (*tag).to_string())
        .collect();
    Ticket {
        id,
        subject: SUBJECTS[i % SUBJECTS.len()].to_string(),
        description: format!("Reported through the demo data set, ticket #{id}."),
        status: STATUSES[i % STATUSES.len()].to_string(),
        priority: PRIORITIES[(i * 7) % PRIORITIES.len()].to_string(),
        ticket_type: TYPES[i % TYPES.len()].to_string(),
        channel: CHANNELS[(i / 2) % CHANNELS.len()].to_string(),
        requester: format!("customer{}@example.org", i % 17),
        assignee,
        group,
        tags,
        replies: (i % 9) as u32,
        created_at,
        updated_at: created_at + Duration::hours((i % 30) as i64),
        due_at: (i % 3 == 0).then(|| created_at + Duration::days(3)),
    }
}

fn views() -> Result<Vec<ViewDraft>> {
    let views = [
        json!({
            "name": "Open urgent tickets",
            "divisionId": "support",
            "ownerId": "ada@example.com",
            "columns": ["subject", "status", "priority", "assignee"],
            "conditions": {
                "allConditions": [
                    {"id": "c1", "fieldId": "status", "operator": "in", "value": ["New", "Open"]}
                ],
                "anyConditions": [
                    {"id": "c2", "fieldId": "priority", "operator": "equals", "value": "High"},
                    {"id": "c3", "fieldId": "priority", "operator": "equals", "value": "Urgent"}
                ]
            },
            "orderBy": "created_at",
            "sortDirection": "desc",
            "isPublic": true,
            "isDefault": true
        }),
        json!({
            "name": "Unassigned",
            "divisionId": "support",
            "ownerId": "ada@example.com",
            "columns": ["subject", "status", "group", "created_at"],
            "conditions": {
                "allConditions": [
                    {"id": "c1", "fieldId": "assignee", "operator": "is_empty"},
                    {"id": "c2", "fieldId": "status", "operator": "not_in", "value": ["Solved", "Closed"]}
                ]
            },
            "groupBy": "group",
            "isPublic": true
        }),
        json!({
            "name": "My billing queue",
            "divisionId": "support",
            "ownerId": "ben@example.com",
            "columns": ["subject", "requester", "tags", "due_date"],
            "conditions": {
                "anyConditions": [
                    {"id": "c1", "fieldId": "tags", "operator": "contains", "value": "billing"},
                    {"id": "c2", "fieldId": "tags", "operator": "contains", "value": "refund"}
                ]
            },
            "orderBy": "due_date"
        }),
    ]
    .into_iter()
    .map(serde_json::from_value)
    .collect::<Result<_, _>>()?;
    Ok(views)
}

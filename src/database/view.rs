use std::{collections::HashSet, sync::PoisonError};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Tree;
use tracing::{debug, warn};

use super::{Database, Entity, TryFromKeyValue};
use crate::{
    error::{require_text, ValidationError},
    filter::{Catalog, ConditionGroupSet, Evaluator},
};

const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub(crate) fn is_descending(self) -> bool {
        self == SortDirection::Desc
    }
}

/// The part of a view a client writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ViewDraft {
    pub(crate) name: String,
    pub(crate) division_id: String,
    pub(crate) owner_id: String,
    #[serde(default)]
    pub(crate) conditions: ConditionGroupSet,
    pub(crate) columns: Vec<String>,
    #[serde(default)]
    pub(crate) group_by: Option<String>,
    #[serde(default)]
    pub(crate) order_by: Option<String>,
    #[serde(default)]
    pub(crate) sort_direction: SortDirection,
    #[serde(default)]
    pub(crate) is_public: bool,
    #[serde(default)]
    pub(crate) is_default: bool,
}

impl ViewDraft {
    pub(crate) fn validate(&self, catalog: &Catalog) -> Result<(), ValidationError> {
        require_text("name", &self.name, MAX_NAME_LEN)?;
        require_text("divisionId", &self.division_id, MAX_NAME_LEN)?;
        require_text("ownerId", &self.owner_id, MAX_NAME_LEN)?;

        if self.columns.is_empty() {
            return Err(ValidationError::new("columns", "must not be empty"));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !catalog.contains(column) {
                return Err(ValidationError::new(
                    "columns",
                    format!("unknown field {column}"),
                ));
            }
            if !seen.insert(column.as_str()) {
                return Err(ValidationError::new(
                    "columns",
                    format!("{column} is listed more than once"),
                ));
            }
        }
        for (name, field) in [("groupBy", &self.group_by), ("orderBy", &self.order_by)] {
            if let Some(field) = field {
                if !catalog.contains(field) {
                    return Err(ValidationError::new(name, format!("unknown field {field}")));
                }
            }
        }

        self.conditions
            .check_ids()
            .map_err(|e| ValidationError::new("conditions", e.to_string()))?;
        let evaluator = Evaluator::new(catalog);
        for (group, conditions) in [
            ("allConditions", &self.conditions.all_conditions),
            ("anyConditions", &self.conditions.any_conditions),
        ] {
            for (position, condition) in conditions.iter().enumerate() {
                evaluator
                    .prepare(condition)
                    .map(|_| ())
                    .and_then(|()| condition.check_complete())
                    .map_err(|e| {
                        ValidationError::new(
                            format!("conditions.{group}[{position}]"),
                            e.to_string(),
                        )
                    })?;
            }
        }
        Ok(())
    }
}

/// A saved, named filter over tickets plus how to display the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct View {
    pub(crate) id: String,
    #[serde(flatten)]
    pub(crate) draft: ViewDraft,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl View {
    pub(crate) fn new(id: String, draft: ViewDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            draft,
            created_at: now,
            updated_at: now,
        }
    }

    /// Public views are visible to the whole division, private ones only to
    /// their owner.
    pub(crate) fn is_visible_to(&self, division_id: &str, user_id: Option<&str>) -> bool {
        self.draft.division_id == division_id
            && (self.draft.is_public || user_id == Some(self.draft.owner_id.as_str()))
    }
}

/// Views are kept as JSON so their condition groups stay in the document form
/// clients exchange.
impl TryFromKeyValue for View {
    fn try_from_key_value(_key: &[u8], value: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(value)?)
    }
}

impl Entity for View {
    fn tree(db: &Database) -> &Tree {
        &db.views
    }

    fn key(&self) -> Vec<u8> {
        self.id.as_bytes().to_vec()
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl Database {
    pub(crate) fn view(&self, id: &str) -> Result<Option<View>> {
        self.get(id.as_bytes())
    }

    /// Stores `view`. A default view takes the default flag away from every
    /// other view in its division.
    pub(crate) fn save_view(&self, view: &View) -> Result<()> {
        let _guard = self.view_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if view.draft.is_default {
            for mut other in self.stored_views()? {
                if other.id != view.id
                    && other.draft.division_id == view.draft.division_id
                    && other.draft.is_default
                {
                    debug!(view = %other.id, division = %other.draft.division_id, "clearing default view");
                    other.draft.is_default = false;
                    self.insert(&other)?;
                }
            }
        }
        self.insert(view)
    }

    pub(crate) fn visible_views(&self, division_id: &str, user_id: Option<&str>) -> Result<Vec<View>> {
        Ok(self
            .stored_views()?
            .into_iter()
            .filter(|view| view.is_visible_to(division_id, user_id))
            .collect())
    }

    /// Every view that still decodes. The rest are logged and skipped.
    fn stored_views(&self) -> Result<Vec<View>> {
        let mut views = Vec::new();
        for item in self.views.iter() {
            let (key, value) = item?;
            match View::try_from_key_value(&key, &value) {
                Ok(view) => views.push(view),
                Err(e) => warn!(
                    view = %String::from_utf8_lossy(&key),
                    "skipping undecodable view: {e:#}"
                ),
            }
        }
        Ok(views)
    }
}

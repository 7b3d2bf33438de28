//! Tags, groups, team members, custom fields and forms.
//!
//! These share one set of CRUD routes, so each kind only describes its key,
//! its rules and what has to happen to other records when it is deleted.

use std::{collections::HashSet, sync::LazyLock};

use anyhow::Result;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sled::Tree;

use super::{decode, encode, Database, Entity, TryFromKeyValue};
use crate::{
    error::{require_text, ApiError, ValidationError},
    filter::ValueType,
};

const MAX_NAME_LEN: usize = 100;

static TAG_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]{0,49}$").expect("valid tag pattern"));
static COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid color pattern"));
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern")
});

pub(crate) trait DirectoryEntity:
    Entity + Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Path segment of the kind's routes.
    const KIND: &'static str;
    /// Singular name used in messages.
    const NAME: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    /// Rule violations come back as `ApiError::Invalid`, failed lookups as
    /// `ApiError::Storage`.
    fn validate(&self, db: &Database) -> Result<(), ApiError>;

    /// Removes references to the entity `id` from other records.
    fn detach(_db: &Database, _id: &str) -> Result<()> {
        Ok(())
    }
}

macro_rules! stored_by_id {
    ($entity:ty, $tree:ident) => {
        impl TryFromKeyValue for $entity {
            fn try_from_key_value(_key: &[u8], value: &[u8]) -> Result<Self> {
                decode(value)
            }
        }

        impl Entity for $entity {
            fn tree(db: &Database) -> &Tree {
                &db.$tree
            }

            fn key(&self) -> Vec<u8> {
                self.id.as_bytes().to_vec()
            }

            fn to_bytes(&self) -> Result<Vec<u8>> {
                encode(self)
            }
        }
    };
}

fn invalid(field: &str, reason: impl Into<String>) -> ApiError {
    ValidationError::new(field, reason).into()
}

fn check_unique(field: &str, values: &[String]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for value in values {
        if !seen.insert(value.as_str()) {
            return Err(ValidationError::new(
                field,
                format!("{value} is listed more than once"),
            ));
        }
    }
    Ok(())
}

fn check_color(color: Option<&String>) -> Result<(), ValidationError> {
    match color {
        Some(color) if !COLOR.is_match(color) => Err(ValidationError::new(
            "color",
            "must be a hex color like #1f2937",
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Tag {
    #[serde(default)]
    pub(crate) id: String,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) color: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

stored_by_id!(Tag, tags);

impl DirectoryEntity for Tag {
    const KIND: &'static str = "tags";
    const NAME: &'static str = "tag";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self, db: &Database) -> Result<(), ApiError> {
        if !TAG_NAME.is_match(&self.name) {
            return Err(invalid(
                "name",
                "must be lowercase letters, digits, '-' or '_' (at most 50)",
            ));
        }
        check_color(self.color.as_ref())?;
        let taken = db
            .all::<Tag>()?
            .iter()
            .any(|tag| tag.name == self.name && tag.id != self.id);
        if taken {
            return Err(invalid(
                "name",
                format!("tag {} already exists", self.name),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Group {
    #[serde(default)]
    pub(crate) id: String,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) member_ids: Vec<String>,
}

stored_by_id!(Group, groups);

impl DirectoryEntity for Group {
    const KIND: &'static str = "groups";
    const NAME: &'static str = "group";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self, db: &Database) -> Result<(), ApiError> {
        require_text("name", &self.name, MAX_NAME_LEN)?;
        check_unique("memberIds", &self.member_ids)?;
        for member_id in &self.member_ids {
            let known = db.get::<Member>(member_id.as_bytes())?.is_some();
            if !known {
                return Err(invalid(
                    "memberIds",
                    format!("unknown member {member_id}"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    Admin,
    #[default]
    Agent,
    Viewer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Member {
    #[serde(default)]
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) email: String,
    #[serde(default)]
    pub(crate) role: Role,
}

stored_by_id!(Member, members);

impl DirectoryEntity for Member {
    const KIND: &'static str = "members";
    const NAME: &'static str = "member";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self, db: &Database) -> Result<(), ApiError> {
        require_text("name", &self.name, MAX_NAME_LEN)?;
        if !EMAIL.is_match(&self.email) {
            return Err(invalid("email", "must be an email address"));
        }
        let taken = db
            .all::<Member>()?
            .iter()
            .any(|member| member.email.eq_ignore_ascii_case(&self.email) && member.id != self.id);
        if taken {
            return Err(invalid(
                "email",
                format!("{} is already a member", self.email),
            ));
        }
        Ok(())
    }

    fn detach(db: &Database, id: &str) -> Result<()> {
        for mut group in db.all::<Group>()? {
            if group.member_ids.iter().any(|member_id| member_id == id) {
                group.member_ids.retain(|member_id| member_id != id);
                db.insert(&group)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CustomField {
    #[serde(default)]
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) value_type: ValueType,
    #[serde(default)]
    pub(crate) options: Vec<String>,
    #[serde(default)]
    pub(crate) required: bool,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

stored_by_id!(CustomField, custom_fields);

impl DirectoryEntity for CustomField {
    const KIND: &'static str = "custom-fields";
    const NAME: &'static str = "custom field";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self, _db: &Database) -> Result<(), ApiError> {
        require_text("label", &self.label, MAX_NAME_LEN)?;
        match self.value_type {
            ValueType::Select | ValueType::Multiselect => {
                if self.options.is_empty() {
                    return Err(invalid(
                        "options",
                        format!("a {} field needs at least one option", self.value_type),
                    ));
                }
                if self.options.iter().any(|option| option.trim().is_empty()) {
                    return Err(invalid("options", "must not be empty"));
                }
                Ok(check_unique("options", &self.options)?)
            }
            ValueType::Text | ValueType::Date | ValueType::Number => {
                if self.options.is_empty() {
                    Ok(())
                } else {
                    Err(invalid(
                        "options",
                        format!("a {} field takes no options", self.value_type),
                    ))
                }
            }
        }
    }

    fn detach(db: &Database, id: &str) -> Result<()> {
        for mut form in db.all::<Form>()? {
            if form.field_ids.iter().any(|field_id| field_id == id) {
                form.field_ids.retain(|field_id| field_id != id);
                db.insert(&form)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Form {
    #[serde(default)]
    pub(crate) id: String,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) field_ids: Vec<String>,
    #[serde(default)]
    pub(crate) is_active: bool,
}

stored_by_id!(Form, forms);

impl DirectoryEntity for Form {
    const KIND: &'static str = "forms";
    const NAME: &'static str = "form";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self, db: &Database) -> Result<(), ApiError> {
        require_text("name", &self.name, MAX_NAME_LEN)?;
        check_unique("fieldIds", &self.field_ids)?;
        for field_id in &self.field_ids {
            let known = db.get::<CustomField>(field_id.as_bytes())?.is_some();
            if !known {
                return Err(invalid(
                    "fieldIds",
                    format!("unknown custom field {field_id}"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::TestDatabase;

    trait Rules {
        fn rules(&self, db: &Database) -> Result<(), ValidationError>;
    }

    impl<T: DirectoryEntity> Rules for T {
        fn rules(&self, db: &Database) -> Result<(), ValidationError> {
            match self.validate(db) {
                Ok(()) => Ok(()),
                Err(ApiError::Invalid(e)) => Err(e),
                Err(e) => panic!("unexpected failure: {e}"),
            }
        }
    }

    fn tag(id: &str, name: &str) -> Tag {
        Tag {
            id: id.to_string(),
            name: name.to_string(),
            color: None,
            description: None,
        }
    }

    fn member(id: &str, email: &str) -> Member {
        Member {
            id: id.to_string(),
            name: "Sam".to_string(),
            email: email.to_string(),
            role: Role::Agent,
        }
    }

    #[test]
    fn tag_names_and_colors() {
        let test = TestDatabase::new();
        assert_eq!(tag("t1", "billing-issue").rules(&test.db), Ok(()));
        assert!(tag("t1", "Billing").rules(&test.db).is_err());
        assert!(tag("t1", "-lead").rules(&test.db).is_err());

        let mut colored = tag("t1", "vip");
        colored.color = Some("#12abEF".to_string());
        assert_eq!(colored.rules(&test.db), Ok(()));
        colored.color = Some("red".to_string());
        assert_eq!(colored.rules(&test.db).unwrap_err().field, "color");
    }

    #[test]
    fn tag_names_are_unique_but_renaming_in_place_is_fine() {
        let test = TestDatabase::new();
        test.db.insert(&tag("t1", "vip")).unwrap();
        assert!(tag("t2", "vip").rules(&test.db).is_err());
        assert_eq!(tag("t1", "vip").rules(&test.db), Ok(()));
    }

    #[test]
    fn member_email() {
        let test = TestDatabase::new();
        assert!(member("m1", "not-an-email").rules(&test.db).is_err());
        test.db.insert(&member("m1", "sam@example.com")).unwrap();
        assert_eq!(
            member("m2", "SAM@example.com").rules(&test.db),
            Err(ValidationError::new(
                "email",
                "SAM@example.com is already a member"
            ))
        );
    }

    #[test]
    fn groups_reference_existing_members() {
        let test = TestDatabase::new();
        test.db.insert(&member("m1", "sam@example.com")).unwrap();
        let mut group = Group {
            id: "g1".to_string(),
            name: "Billing".to_string(),
            description: None,
            member_ids: vec!["m1".to_string()],
        };
        assert_eq!(group.rules(&test.db), Ok(()));
        group.member_ids.push("m9".to_string());
        assert_eq!(
            group.rules(&test.db).unwrap_err().reason,
            "unknown member m9"
        );
    }

    #[test]
    fn deleting_a_member_detaches_it_from_groups() {
        let test = TestDatabase::new();
        test.db.insert(&member("m1", "sam@example.com")).unwrap();
        test.db.insert(&member("m2", "kim@example.com")).unwrap();
        let group = Group {
            id: "g1".to_string(),
            name: "Billing".to_string(),
            description: None,
            member_ids: vec!["m1".to_string(), "m2".to_string()],
        };
        test.db.insert(&group).unwrap();

        Member::detach(&test.db, "m1").unwrap();
        let group = test.db.get::<Group>(b"g1").unwrap().unwrap();
        assert_eq!(group.member_ids, vec!["m2".to_string()]);
    }

    #[test]
    fn custom_field_options() {
        let test = TestDatabase::new();
        let mut field = CustomField {
            id: "f1".to_string(),
            label: "Plan".to_string(),
            value_type: ValueType::Select,
            options: Vec::new(),
            required: false,
            description: None,
        };
        assert_eq!(
            field.rules(&test.db).unwrap_err().reason,
            "a select field needs at least one option"
        );
        field.options = vec!["Free".to_string(), "Pro".to_string(), "Free".to_string()];
        assert!(field.rules(&test.db).is_err());
        field.options.pop();
        assert_eq!(field.rules(&test.db), Ok(()));

        field.value_type = ValueType::Date;
        assert_eq!(
            field.rules(&test.db).unwrap_err().reason,
            "a date field takes no options"
        );
    }

    #[test]
    fn forms_reference_existing_fields_and_lose_deleted_ones() {
        let test = TestDatabase::new();
        let field = CustomField {
            id: "f1".to_string(),
            label: "Order number".to_string(),
            value_type: ValueType::Text,
            options: Vec::new(),
            required: true,
            description: None,
        };
        test.db.insert(&field).unwrap();
        let mut form = Form {
            id: "form1".to_string(),
            name: "Returns".to_string(),
            field_ids: vec!["f1".to_string()],
            is_active: true,
        };
        assert_eq!(form.rules(&test.db), Ok(()));
        test.db.insert(&form).unwrap();

        CustomField::detach(&test.db, "f1").unwrap();
        assert!(test
            .db
            .get::<Form>(b"form1")
            .unwrap()
            .unwrap()
            .field_ids
            .is_empty());

        form.field_ids = vec!["f2".to_string()];
        assert!(form.rules(&test.db).is_err());
    }

    #[test]
    fn unreadable_records_are_storage_failures() {
        let test = TestDatabase::new();
        test.db.tags.insert(b"t0", vec![0xff]).unwrap();
        assert!(matches!(
            tag("t1", "vip").validate(&test.db),
            Err(ApiError::Storage(_))
        ));

        test.db.members.insert(b"m1", vec![0xff]).unwrap();
        let group = Group {
            id: "g1".to_string(),
            name: "Billing".to_string(),
            description: None,
            member_ids: vec!["m1".to_string()],
        };
        assert!(matches!(
            group.validate(&test.db),
            Err(ApiError::Storage(_))
        ));
    }
}

mod directory;
mod ticket;
mod view;

use std::{
    marker::PhantomData,
    ops::Bound,
    path::Path,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use sled::{Db, Tree};

pub(crate) use self::directory::{CustomField, DirectoryEntity, Form, Group, Member, Role, Tag};
pub(crate) use self::ticket::Ticket;
pub(crate) use self::view::{SortDirection, View, ViewDraft};

/// Handle to the dashboard's store. Cloning is cheap; every clone refers to the
/// same underlying sled database.
#[derive(Clone)]
pub(crate) struct Database {
    db: Db,
    tickets: Tree,
    views: Tree,
    tags: Tree,
    groups: Tree,
    members: Tree,
    custom_fields: Tree,
    forms: Tree,
    view_lock: Arc<Mutex<()>>,
}

pub(crate) trait TryFromKeyValue: Sized {
    fn try_from_key_value(key: &[u8], value: &[u8]) -> Result<Self>;
}

/// A record kind with a tree of its own.
pub(crate) trait Entity: TryFromKeyValue {
    fn tree(db: &Database) -> &Tree;
    fn key(&self) -> Vec<u8>;
    fn to_bytes(&self) -> Result<Vec<u8>>;
}

impl Database {
    pub(crate) fn connect(path: &Path) -> Result<Database> {
        let db = sled::open(path)
            .with_context(|| format!("cannot open database at {}", path.display()))?;
        Ok(Database {
            tickets: db.open_tree("tickets")?,
            views: db.open_tree("views")?,
            tags: db.open_tree("tags")?,
            groups: db.open_tree("groups")?,
            members: db.open_tree("members")?,
            custom_fields: db.open_tree("custom_fields")?,
            forms: db.open_tree("forms")?,
            view_lock: Arc::new(Mutex::new(())),
            db,
        })
    }

    /// True when nothing has been stored yet.
    pub(crate) fn is_empty(&self) -> bool {
        [
            &self.tickets,
            &self.views,
            &self.tags,
            &self.groups,
            &self.members,
            &self.custom_fields,
            &self.forms,
        ]
        .iter()
        .all(|tree| tree.is_empty())
    }

    pub(crate) fn generate_id(&self) -> Result<u64> {
        Ok(self.db.generate_id()?)
    }

    pub(crate) fn get<T: Entity>(&self, key: &[u8]) -> Result<Option<T>> {
        T::tree(self)
            .get(key)?
            .map(|value| T::try_from_key_value(key, &value))
            .transpose()
    }

    pub(crate) fn insert<T: Entity>(&self, entity: &T) -> Result<()> {
        T::tree(self).insert(entity.key(), entity.to_bytes()?)?;
        Ok(())
    }

    pub(crate) fn remove<T: Entity>(&self, key: &[u8]) -> Result<Option<T>> {
        T::tree(self)
            .remove(key)?
            .map(|value| T::try_from_key_value(key, &value))
            .transpose()
    }

    pub(crate) fn range<T: Entity>(&self, start: Bound<Vec<u8>>, end: Bound<Vec<u8>>) -> Iter<T> {
        Iter::new(T::tree(self).range((start, end)))
    }

    pub(crate) fn all<T: Entity>(&self) -> Result<Vec<T>> {
        Iter::new(T::tree(self).iter()).collect()
    }

    pub(crate) fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

pub(crate) struct Iter<T> {
    inner: sled::Iter,
    phantom: PhantomData<T>,
}

impl<T> Iter<T> {
    fn new(inner: sled::Iter) -> Self {
        Self {
            inner,
            phantom: PhantomData,
        }
    }
}

impl<T: TryFromKeyValue> Iterator for Iter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|item| {
            let (key, value) = item?;
            T::try_from_key_value(&key, &value)
        })
    }
}

impl<T: TryFromKeyValue> DoubleEndedIterator for Iter<T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|item| {
            let (key, value) = item?;
            T::try_from_key_value(&key, &value)
        })
    }
}

#[cfg(test)]
pub(crate) struct TestDatabase {
    _dir: tempfile::TempDir, // keeps the data directory alive for the test
    pub(crate) db: Database,
}

#[cfg(test)]
impl TestDatabase {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        Self { _dir: dir, db }
    }
}

#[cfg(test)]
mod tests {
    use std::ops::Bound;

    use super::{Tag, TestDatabase};
    use crate::database::Ticket;

    #[test]
    fn new_database_is_empty() {
        let test = TestDatabase::new();
        assert!(test.db.is_empty());
        assert!(test.db.all::<Tag>().unwrap().is_empty());
    }

    #[test]
    fn insert_get_remove() {
        let test = TestDatabase::new();
        let tag = Tag {
            id: "t1".to_string(),
            name: "vip".to_string(),
            color: Some("#ff8800".to_string()),
            description: None,
        };
        test.db.insert(&tag).unwrap();
        assert!(!test.db.is_empty());
        assert_eq!(test.db.get::<Tag>(b"t1").unwrap(), Some(tag.clone()));
        assert_eq!(test.db.remove::<Tag>(b"t1").unwrap(), Some(tag));
        assert_eq!(test.db.get::<Tag>(b"t1").unwrap(), None);
    }

    #[test]
    fn ranges_follow_ticket_ids() {
        let test = TestDatabase::new();
        let tickets: Vec<Ticket> = [3, 12, 7].into_iter().map(Ticket::sample).collect();
        test.db.insert_tickets(tickets).unwrap();

        let ids: Vec<u64> = test
            .db
            .range::<Ticket>(Bound::Unbounded, Bound::Unbounded)
            .map(|ticket| ticket.unwrap().id)
            .collect();
        assert_eq!(ids, vec![3, 7, 12]);

        let after_seven: Vec<u64> = test
            .db
            .range::<Ticket>(Bound::Excluded(Ticket::key_for(7)), Bound::Unbounded)
            .map(|ticket| ticket.unwrap().id)
            .collect();
        assert_eq!(after_seven, vec![12]);

        let newest_first: Vec<u64> = test
            .db
            .range::<Ticket>(Bound::Unbounded, Bound::Unbounded)
            .rev()
            .map(|ticket| ticket.unwrap().id)
            .collect();
        assert_eq!(newest_first, vec![12, 7, 3]);
    }

    #[test]
    fn wide_ticket_ids_keep_their_order() {
        let test = TestDatabase::new();
        let tickets: Vec<Ticket> = [u64::MAX, 10_000_000_000, 9_999_999_999, 2]
            .into_iter()
            .map(Ticket::sample)
            .collect();
        test.db.insert_tickets(tickets).unwrap();

        let ids: Vec<u64> = test
            .db
            .range::<Ticket>(Bound::Unbounded, Bound::Unbounded)
            .map(|ticket| ticket.unwrap().id)
            .collect();
        assert_eq!(ids, vec![2, 9_999_999_999, 10_000_000_000, u64::MAX]);
        assert_eq!(Ticket::key_for(u64::MAX).len(), 20);
    }
}

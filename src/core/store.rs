//! Persistence collaborator traits
//!
//! The service layer talks to storage exclusively through [`EntityStore`].
//! Writes are staged in a [`ChangeSet`] (one per action) and committed
//! atomically with [`EntityStore::save`].

use crate::core::entity::{Entity, EntityId, VersionToken};
use crate::core::error::StoreError;
use crate::core::query::Query;
use async_trait::async_trait;

/// Reports schema migrations that still have to be applied
#[async_trait]
pub trait SchemaStatus: Send + Sync {
    /// Names of pending migrations, empty when the schema is up to date
    async fn pending_migrations(&self) -> Result<Vec<String>, StoreError>;
}

/// Queryable, writable collection of entities of type `E`
///
/// Implementations must make `save` all-or-nothing and must report a stale
/// `expected_version` (or a staged row that no longer exists) as
/// [`StoreError::Concurrency`].
#[async_trait]
pub trait EntityStore<E: Entity>: SchemaStatus {
    /// Execute a query and return the matching rows
    async fn fetch(&self, query: &Query<E>) -> Result<Vec<E>, StoreError>;

    /// Count the rows a query would return
    async fn count(&self, query: &Query<E>) -> Result<usize, StoreError>;

    /// Commit staged changes.
    ///
    /// Returns the persisted state of every inserted or updated row, in
    /// staging order. Removals contribute nothing to the returned list.
    async fn save(&self, changes: ChangeSet<E>) -> Result<Vec<E>, StoreError>;
}

/// A single staged write
#[derive(Debug, Clone)]
pub enum Change<E> {
    Insert(E),
    Update {
        entity: E,
        expected_version: Option<VersionToken>,
    },
    Remove {
        id: EntityId,
        expected_version: Option<VersionToken>,
    },
}

/// Unit of work: writes staged during one service action
#[derive(Debug, Clone)]
pub struct ChangeSet<E> {
    changes: Vec<Change<E>>,
}

impl<E> Default for ChangeSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ChangeSet<E> {
    pub fn new() -> Self {
        Self {
            changes: Vec::new(),
        }
    }

    pub fn insert(&mut self, entity: E) {
        self.changes.push(Change::Insert(entity));
    }

    pub fn update(&mut self, entity: E, expected_version: Option<VersionToken>) {
        self.changes.push(Change::Update {
            entity,
            expected_version,
        });
    }

    pub fn remove(&mut self, id: EntityId, expected_version: Option<VersionToken>) {
        self.changes.push(Change::Remove {
            id,
            expected_version,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn changes(&self) -> &[Change<E>] {
        &self.changes
    }

    pub fn into_changes(self) -> Vec<Change<E>> {
        self.changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_set_preserves_staging_order() {
        let mut changes = ChangeSet::new();
        changes.insert("a");
        changes.update("b", Some(vec![1]));
        changes.remove(7, None);

        assert_eq!(changes.len(), 3);
        match changes.changes() {
            [
                Change::Insert("a"),
                Change::Update {
                    entity: "b",
                    expected_version: Some(v),
                },
                Change::Remove {
                    id: 7,
                    expected_version: None,
                },
            ] => assert_eq!(v, &vec![1]),
            other => panic!("Unexpected staging order: {:?}", other),
        }
    }
}

//! In-memory implementation of EntityStore for testing and development

use crate::core::entity::{Entity, EntityId, VersionToken};
use crate::core::error::StoreError;
use crate::core::query::Query;
use crate::core::store::{Change, ChangeSet, EntityStore, SchemaStatus};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

#[derive(Clone)]
struct CurrentRow<E> {
    entity: E,
    valid_from: DateTime<Utc>,
}

#[derive(Clone)]
struct HistoryRow<E> {
    entity: E,
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
}

struct Table<E> {
    rows: BTreeMap<EntityId, CurrentRow<E>>,
    history: Vec<HistoryRow<E>>,
    next_id: EntityId,
    next_version: u64,
    pending_migrations: Vec<String>,
}

impl<E: Entity> Table<E> {
    fn stamp(&mut self, entity: &mut E) {
        if E::is_versioned() {
            self.next_version += 1;
            entity.set_version(self.next_version.to_be_bytes().to_vec());
        }
    }

    fn check_version(
        &self,
        id: EntityId,
        expected: Option<&VersionToken>,
    ) -> Result<(), StoreError> {
        let row = self.rows.get(&id).ok_or(StoreError::Concurrency)?;
        match (row.entity.version(), expected) {
            (Some(current), Some(expected)) if current != expected.as_slice() => {
                Err(StoreError::Concurrency)
            }
            _ => Ok(()),
        }
    }

    fn retire(&mut self, id: EntityId, now: DateTime<Utc>) -> Option<CurrentRow<E>> {
        let row = self.rows.remove(&id)?;
        self.history.push(HistoryRow {
            entity: row.entity.clone(),
            valid_from: row.valid_from,
            valid_to: now,
        });
        Some(row)
    }
}

/// In-memory, system-versioned entity store
///
/// Useful for testing and development. Uses RwLock for thread-safe access.
/// Ids are assigned from 1 upwards; version tokens are 8-byte big-endian
/// counters shared by the whole table.
pub struct InMemoryStore<E> {
    table: Arc<RwLock<Table<E>>>,
}

impl<E> Clone for InMemoryStore<E> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
        }
    }
}

impl<E: Entity> Default for InMemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> InMemoryStore<E> {
    /// Create an empty store with an up-to-date schema
    pub fn new() -> Self {
        Self::with_pending_migrations(Vec::new())
    }

    /// Create a store that reports `names` as pending migrations
    pub fn with_pending_migrations(names: Vec<String>) -> Self {
        Self {
            table: Arc::new(RwLock::new(Table {
                rows: BTreeMap::new(),
                history: Vec::new(),
                next_id: 1,
                next_version: 0,
                pending_migrations: names,
            })),
        }
    }

    /// Mark every pending migration as applied
    pub fn apply_migrations(&self) -> Result<(), StoreError> {
        let mut table = self
            .table
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        table.pending_migrations.clear();
        Ok(())
    }

    /// Current rows ordered by id, bypassing any query
    pub fn snapshot(&self) -> Result<Vec<E>, StoreError> {
        let table = self
            .table
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        Ok(table.rows.values().map(|row| row.entity.clone()).collect())
    }

    fn source(&self, query: &Query<E>) -> Result<Vec<E>, StoreError> {
        let table = self
            .table
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let Some(window) = query.window() else {
            return Ok(table.rows.values().map(|row| row.entity.clone()).collect());
        };

        let mut rows: Vec<(EntityId, DateTime<Utc>, E)> = table
            .history
            .iter()
            .map(|row| (row.entity.clone(), row.valid_from, row.valid_to))
            .chain(
                table
                    .rows
                    .values()
                    .map(|row| (row.entity.clone(), row.valid_from, DateTime::<Utc>::MAX_UTC)),
            )
            .filter(|(_, from, to)| window.overlaps(*from, *to))
            .map(|(mut entity, from, to)| {
                entity.set_valid_period(from, to);
                (entity.id(), from, entity)
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        Ok(rows.into_iter().map(|(_, _, entity)| entity).collect())
    }
}

#[async_trait]
impl<E: Entity> SchemaStatus for InMemoryStore<E> {
    async fn pending_migrations(&self) -> Result<Vec<String>, StoreError> {
        let table = self
            .table
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        Ok(table.pending_migrations.clone())
    }
}

#[async_trait]
impl<E: Entity> EntityStore<E> for InMemoryStore<E> {
    async fn fetch(&self, query: &Query<E>) -> Result<Vec<E>, StoreError> {
        let source = self.source(query)?;
        Ok(query.evaluate(source))
    }

    async fn count(&self, query: &Query<E>) -> Result<usize, StoreError> {
        let source = self.source(query)?;
        Ok(query.evaluate(source).len())
    }

    async fn save(&self, changes: ChangeSet<E>) -> Result<Vec<E>, StoreError> {
        let mut table = self
            .table
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        // Validate everything first so a failed save leaves the table untouched
        for change in changes.changes() {
            match change {
                Change::Insert(_) => {}
                Change::Update {
                    entity,
                    expected_version,
                } => table.check_version(entity.id(), expected_version.as_ref())?,
                Change::Remove {
                    id,
                    expected_version,
                } => table.check_version(*id, expected_version.as_ref())?,
            }
        }

        let now = Utc::now();
        let mut persisted = Vec::new();
        for change in changes.into_changes() {
            match change {
                Change::Insert(mut entity) => {
                    let id = table.next_id;
                    table.next_id += 1;
                    entity.set_id(id);
                    table.stamp(&mut entity);
                    table.rows.insert(
                        id,
                        CurrentRow {
                            entity: entity.clone(),
                            valid_from: now,
                        },
                    );
                    persisted.push(entity);
                }
                Change::Update { mut entity, .. } => {
                    let id = entity.id();
                    table.retire(id, now);
                    table.stamp(&mut entity);
                    table.rows.insert(
                        id,
                        CurrentRow {
                            entity: entity.clone(),
                            valid_from: now,
                        },
                    );
                    persisted.push(entity);
                }
                Change::Remove { id, .. } => {
                    table.retire(id, now);
                }
            }
        }
        Ok(persisted)
    }
}

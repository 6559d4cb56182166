//! Entity and DTO traits consumed by the service layer
//!
//! The pipeline never looks inside an entity beyond what these traits expose:
//! a numeric identity, an optional opaque version token for optimistic
//! concurrency, and dynamic field access for generic filtering and sorting.

use crate::core::field::FieldValue;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Numeric identity shared by every persisted entity.
pub type EntityId = i64;

/// Opaque concurrency token, compared byte-for-byte.
pub type VersionToken = Vec<u8>;

/// Base trait for persisted entities.
///
/// Entities without a concurrency token keep the default `version()`
/// implementation; the store will then never stamp or check versions for them.
pub trait Entity: Clone + Send + Sync + 'static {
    /// The plural resource name (e.g., "orders")
    fn resource_name() -> &'static str;

    /// Get the unique identifier for this entity instance
    fn id(&self) -> EntityId;

    /// Assign the identity (used by stores when inserting)
    fn set_id(&mut self, id: EntityId);

    /// Current concurrency token, `None` for entities that are not concurrency-aware
    fn version(&self) -> Option<&[u8]> {
        None
    }

    /// Stamp a new concurrency token (called by stores on every write)
    fn set_version(&mut self, _version: VersionToken) {}

    /// Whether the store should stamp version tokens for this entity type
    fn is_versioned() -> bool {
        false
    }

    /// Populate the system-time period on rows read from history
    fn set_valid_period(&mut self, _valid_from: DateTime<Utc>, _valid_to: DateTime<Utc>) {}

    /// Get the value of a specific field by name
    fn field_value(&self, _field: &str) -> Option<FieldValue> {
        None
    }

    /// Get the tenant ID for multi-tenant isolation.
    ///
    /// Returns None by default for single-tenant applications or system-wide entities.
    fn tenant_id(&self) -> Option<Uuid> {
        None
    }
}

/// Wire-side representation of an entity.
pub trait Dto: Clone + Send + Sync + 'static {
    /// Identity of the entity this DTO represents (ignored on create)
    fn id(&self) -> EntityId;

    /// Concurrency token the client last saw
    fn version(&self) -> Option<&[u8]> {
        None
    }
}

/// Bidirectional mapping between DTOs and entities.
pub trait DtoMapper<E: Entity, D: Dto>: Send + Sync {
    /// Full representation of a persisted entity
    fn to_dto(&self, entity: &E) -> D;

    /// Build a fresh entity from an incoming DTO
    fn to_new_entity(&self, dto: &D) -> E;

    /// Copy the DTO's writable fields onto an existing entity
    fn apply(&self, dto: &D, entity: &mut E);

    fn to_dtos(&self, entities: &[E]) -> Vec<D> {
        entities.iter().map(|entity| self.to_dto(entity)).collect()
    }

    fn to_new_entities(&self, dtos: &[D]) -> Vec<E> {
        dtos.iter().map(|dto| self.to_new_entity(dto)).collect()
    }
}

/// Compare a stored token against the one supplied by a client.
///
/// Returns `None` when the write may proceed, or the problem message to
/// report as a conflict.
pub fn check_version(stored: Option<&[u8]>, supplied: Option<&[u8]>) -> Option<&'static str> {
    match (stored, supplied) {
        (None, _) => None,
        (Some(_), None) => Some(MISSING_TIMESTAMP),
        (Some(stored), Some(supplied)) if stored != supplied => Some(ENTITY_MODIFIED),
        _ => None,
    }
}

/// Conflict detail when a concurrency-aware entity is written without a token
pub const MISSING_TIMESTAMP: &str = "You must provide a timestamp.";

/// Conflict detail when the supplied token is stale
pub const ENTITY_MODIFIED: &str = "The entity was modified.";

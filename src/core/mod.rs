//! Core module containing fundamental traits and types for the framework

pub mod auth;
pub mod entity;
pub mod error;
pub mod field;
pub mod outcome;
pub mod query;
pub mod store;

pub use auth::{AuthContext, AuthPolicy};
pub use entity::{Dto, DtoMapper, Entity, EntityId, VersionToken};
pub use error::{ExecutionError, PipelineError, PolicyError, QueryError, StoreError};
pub use field::FieldValue;
pub use outcome::{Outcome, Problem, ProblemResponse};
pub use query::{Comparator, Predicate, Projection, Query, TemporalWindow};
pub use store::{Change, ChangeSet, EntityStore, SchemaStatus};

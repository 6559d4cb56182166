//! # Scaffold-RS
//!
//! A generic, authorization-aware CRUD service layer for Rust.
//!
//! ## Features
//!
//! - **Authorization Pipeline**: Every action folds an ordered chain of handlers
//!   over the request, runs the core action with the accumulated row filter,
//!   then folds the same chain over the response
//! - **Typed Outcomes**: Expected failures (not found, conflicts, rejected
//!   requests) are values, never panics or errors
//! - **Optimistic Concurrency**: Explicit version token checks on update and delete
//! - **Temporal History**: List the system-versioned history of an entity set
//! - **Configuration-Based**: Page-size ceilings and policies via YAML configuration
//! - **Cancellation**: A `CancellationToken` is raced against every suspension point
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use scaffold::prelude::*;
//!
//! let store = Arc::new(InMemoryStore::<Order>::new());
//! let handlers = HandlerSet::empty()
//!     .with(PolicyHandler::new(ctx.clone(), ActionPolicies::default()))
//!     .with(TenantScopeHandler::new(ctx));
//!
//! let orders = CrudService::new(store, Arc::new(OrderMapper), handlers, PipelineState::shared());
//!
//! let cancel = CancellationToken::new();
//! let created = orders.create(new_order, &cancel).await?;
//!
//! let request = ListQueryBuilder::new(50).build(&ListQuery::new().top(10), |o: &Order| OrderDto::from(o), true);
//! let page = orders.get_list(request, &cancel).await?;
//! ```

pub mod authorization;
pub mod config;
pub mod core;
pub mod pipeline;
pub mod service;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core Traits ===
    pub use crate::core::{
        auth::{AuthContext, AuthPolicy},
        entity::{Dto, DtoMapper, Entity, EntityId, VersionToken},
        error::{ExecutionError, PipelineError, PolicyError, QueryError, StoreError},
        field::FieldValue,
        outcome::{Outcome, Problem},
        query::{Projection, Query, TemporalWindow},
        store::{ChangeSet, EntityStore, SchemaStatus},
    };

    // === Authorization ===
    pub use crate::authorization::{
        Action, ActionPolicies, Authorization, AuthorizationHandler, AuthorizationWithoutStore,
        CustomAuthorizationHandler, HandlerSet, PolicyHandler, RowFilter, TenantScopeHandler,
    };

    // === Pipeline ===
    pub use crate::pipeline::{Pipeline, PipelineState};

    // === Services ===
    pub use crate::service::{
        CrudService, DeleteRequest, GetHistoryRequest, GetListRequest, ListPage, ListParams,
        ListQuery, ListQueryBuilder, NoHooks, ReadService, UpdateMultipleRequest, WriteHooks,
    };

    // === Storage ===
    pub use crate::storage::InMemoryStore;

    // === Config ===
    pub use crate::config::{EntityConfig, PagingConfig, PolicyConfig, ScaffoldConfig};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use std::sync::Arc;
    pub use tokio_util::sync::CancellationToken;
    pub use uuid::Uuid;
}

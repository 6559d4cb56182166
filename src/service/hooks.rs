//! Extension points around persisting writes

use crate::core::entity::{Dto, Entity};
use async_trait::async_trait;

/// Hooks invoked by [`CrudService`](crate::service::CrudService) around each save
///
/// Every method defaults to doing nothing. An error from any hook aborts the
/// action and is reported as an internal server error; nothing staged after
/// the failing hook is saved.
#[allow(unused_variables)]
#[async_trait]
pub trait WriteHooks<E: Entity, D: Dto>: Send + Sync {
    /// Entities are staged for insert but not yet saved
    async fn before_create(&self, entities: &mut [E], dtos: &[D]) -> anyhow::Result<()> {
        Ok(())
    }

    /// Entities were saved; `dtos` is what the caller will receive
    async fn after_create(&self, entities: &[E], dtos: &mut [D]) -> anyhow::Result<()> {
        Ok(())
    }

    /// Incoming fields were applied onto `entities`, nothing saved yet
    async fn before_update(&self, entities: &mut [E], dtos: &[D]) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_update(&self, entities: &[E], dtos: &mut [D]) -> anyhow::Result<()> {
        Ok(())
    }

    async fn before_delete(&self, entity: &E) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_delete(&self, entity: &E) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Hooks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<E: Entity, D: Dto> WriteHooks<E, D> for NoHooks {}

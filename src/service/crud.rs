//! Full create/read/update/delete entity service

use crate::authorization::handler::HandlerSet;
use crate::authorization::operation::{Create, CreateMany, Delete, Update, UpdateMany};
use crate::authorization::result::Authorization;
use crate::config::ScaffoldConfig;
use crate::core::entity::{Dto, DtoMapper, Entity, EntityId, VersionToken, check_version};
use crate::core::error::{ExecutionError, PipelineError};
use crate::core::outcome::Outcome;
use crate::core::query::Query;
use crate::core::store::{ChangeSet, EntityStore};
use crate::pipeline::{PipelineState, guarded_store};
use crate::service::hooks::{NoHooks, WriteHooks};
use crate::service::read::ReadService;
use crate::service::request::{
    DeleteRequest, GetHistoryRequest, GetListRequest, ListPage, UpdateMultipleRequest,
};
use anyhow::anyhow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Authorized reads and writes of entity `E`, exposed as `D`
///
/// Every write stages its changes in a fresh [`ChangeSet`] and commits them
/// with a single `save`, so a failed action leaves the store untouched.
pub struct CrudService<E: Entity, D: Dto, S, M> {
    read: ReadService<E, D, S, M>,
    hooks: Arc<dyn WriteHooks<E, D>>,
}

impl<E: Entity, D: Dto, S, M> Clone for CrudService<E, D, S, M> {
    fn clone(&self) -> Self {
        Self {
            read: self.read.clone(),
            hooks: Arc::clone(&self.hooks),
        }
    }
}

impl<E, D, S, M> CrudService<E, D, S, M>
where
    E: Entity,
    D: Dto,
    S: EntityStore<E> + 'static,
    M: DtoMapper<E, D> + 'static,
{
    pub fn new(
        store: Arc<S>,
        mapper: Arc<M>,
        handlers: HandlerSet<E, D>,
        state: Arc<PipelineState>,
    ) -> Self {
        Self {
            read: ReadService::new(store, mapper, handlers, state),
            hooks: Arc::new(NoHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: impl WriteHooks<E, D> + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn with_config(mut self, config: &ScaffoldConfig) -> Self {
        self.read = self.read.with_config(config);
        self
    }

    /// The read half of this service
    pub fn reader(&self) -> &ReadService<E, D, S, M> {
        &self.read
    }

    pub async fn get_single(
        &self,
        id: EntityId,
        cancel: &CancellationToken,
    ) -> Result<Outcome<D>, PipelineError> {
        self.read.get_single(id, cancel).await
    }

    pub async fn get_list(
        &self,
        request: GetListRequest<D, E>,
        cancel: &CancellationToken,
    ) -> Result<Outcome<ListPage<D>>, PipelineError> {
        self.read.get_list(request, cancel).await
    }

    pub async fn get_history(
        &self,
        request: GetHistoryRequest<D, E>,
        cancel: &CancellationToken,
    ) -> Result<Outcome<ListPage<D>>, PipelineError> {
        self.read.get_history(request, cancel).await
    }

    pub async fn create(
        &self,
        dto: D,
        cancel: &CancellationToken,
    ) -> Result<Outcome<D>, PipelineError> {
        self.read
            .pipeline
            .run::<E, D, Create, _, _>(&self.read.handlers, dto, cancel, |auth| {
                self.create_single(auth, cancel)
            })
            .await
    }

    pub async fn create_many(
        &self,
        dtos: Vec<D>,
        cancel: &CancellationToken,
    ) -> Result<Outcome<Vec<D>>, PipelineError> {
        self.read
            .pipeline
            .run::<E, D, CreateMany, _, _>(&self.read.handlers, dtos, cancel, |auth| async move {
                self.insert(auth.into_values(), cancel).await.map(Outcome::success)
            })
            .await
    }

    /// Update one entity; the DTO must carry the version it was read at
    pub async fn update(
        &self,
        dto: D,
        cancel: &CancellationToken,
    ) -> Result<Outcome<D>, PipelineError> {
        self.read
            .pipeline
            .run::<E, D, Update, _, _>(&self.read.handlers, dto, cancel, |auth| {
                self.update_single(auth, cancel)
            })
            .await
    }

    /// Update several entities at once; all of them or none
    pub async fn update_many(
        &self,
        request: UpdateMultipleRequest<D, E>,
        cancel: &CancellationToken,
    ) -> Result<Outcome<Vec<D>>, PipelineError> {
        self.read
            .pipeline
            .run::<E, D, UpdateMany, _, _>(&self.read.handlers, request, cancel, |auth| {
                self.update_batch(auth, cancel)
            })
            .await
    }

    pub async fn delete(
        &self,
        request: DeleteRequest,
        cancel: &CancellationToken,
    ) -> Result<Outcome<()>, PipelineError> {
        self.read
            .pipeline
            .run::<E, D, Delete, _, _>(&self.read.handlers, request, cancel, |auth| {
                self.remove(auth, cancel)
            })
            .await
    }

    async fn create_single(
        &self,
        auth: Authorization<D, E>,
        cancel: &CancellationToken,
    ) -> Result<Outcome<D>, ExecutionError> {
        let mut created = self.insert(vec![auth.into_values()], cancel).await?;
        let dto = created
            .pop()
            .ok_or_else(|| anyhow!("store returned no row for an insert"))?;
        Ok(Outcome::success(dto))
    }

    async fn insert(&self, dtos: Vec<D>, cancel: &CancellationToken) -> Result<Vec<D>, ExecutionError> {
        let mut entities = self.read.mapper.to_new_entities(&dtos);
        self.hooks.before_create(&mut entities, &dtos).await?;

        let mut changes = ChangeSet::new();
        for entity in entities {
            changes.insert(entity);
        }
        let persisted = guarded_store(cancel, self.read.store.save(changes)).await?;

        let mut created = self.read.mapper.to_dtos(&persisted);
        self.hooks.after_create(&persisted, &mut created).await?;
        tracing::debug!(entity = E::resource_name(), count = created.len(), "entities created");
        Ok(created)
    }

    async fn update_single(
        &self,
        auth: Authorization<D, E>,
        cancel: &CancellationToken,
    ) -> Result<Outcome<D>, ExecutionError> {
        let (filter, dto) = auth.into_parts();
        let Some(mut entity) = self.read.find(&filter, dto.id(), cancel).await? else {
            return Ok(Outcome::not_found());
        };
        if let Some(conflict) = check_version(entity.version(), dto.version()) {
            return Ok(Outcome::conflict(conflict));
        }

        let expected = entity.version().map(<[u8]>::to_vec);
        self.read.mapper.apply(&dto, &mut entity);
        let mut updated = self
            .persist_updates(vec![(entity, expected)], std::slice::from_ref(&dto), cancel)
            .await?;
        let dto = updated
            .pop()
            .ok_or_else(|| anyhow!("store returned no row for an update"))?;
        Ok(Outcome::success(dto))
    }

    async fn update_batch(
        &self,
        auth: Authorization<UpdateMultipleRequest<D, E>, E>,
        cancel: &CancellationToken,
    ) -> Result<Outcome<Vec<D>>, ExecutionError> {
        let (filter, UpdateMultipleRequest { dtos, filter: narrow }) = auth.into_parts();

        let ids: HashSet<EntityId> = dtos.iter().map(|dto| dto.id()).collect();
        if ids.len() != dtos.len() {
            tracing::debug!(entity = E::resource_name(), "batch update names an id twice");
            return Ok(Outcome::not_found());
        }

        let query = narrow(
            filter
                .apply(Query::new())
                .filter(move |row: &E| ids.contains(&row.id())),
        );
        let found = guarded_store(cancel, self.read.store.fetch(&query)).await?;
        if found.len() != dtos.len() {
            tracing::debug!(
                entity = E::resource_name(),
                requested = dtos.len(),
                found = found.len(),
                "batch update matched only part of the request"
            );
            return Ok(Outcome::not_found());
        }

        let mut by_id: HashMap<EntityId, E> =
            found.into_iter().map(|entity| (entity.id(), entity)).collect();
        let mut staged = Vec::with_capacity(dtos.len());
        for dto in &dtos {
            let Some(mut entity) = by_id.remove(&dto.id()) else {
                return Ok(Outcome::not_found());
            };
            if let Some(conflict) = check_version(entity.version(), dto.version()) {
                return Ok(Outcome::conflict(conflict));
            }
            let expected = entity.version().map(<[u8]>::to_vec);
            self.read.mapper.apply(dto, &mut entity);
            staged.push((entity, expected));
        }

        let updated = self.persist_updates(staged, &dtos, cancel).await?;
        Ok(Outcome::success(updated))
    }

    async fn persist_updates(
        &self,
        staged: Vec<(E, Option<VersionToken>)>,
        dtos: &[D],
        cancel: &CancellationToken,
    ) -> Result<Vec<D>, ExecutionError> {
        let (mut entities, versions): (Vec<E>, Vec<Option<VersionToken>>) =
            staged.into_iter().unzip();
        self.hooks.before_update(&mut entities, dtos).await?;

        let mut changes = ChangeSet::new();
        for (entity, expected) in entities.into_iter().zip(versions) {
            changes.update(entity, expected);
        }
        let persisted = guarded_store(cancel, self.read.store.save(changes)).await?;

        let mut updated = self.read.mapper.to_dtos(&persisted);
        self.hooks.after_update(&persisted, &mut updated).await?;
        Ok(updated)
    }

    async fn remove(
        &self,
        auth: Authorization<DeleteRequest, E>,
        cancel: &CancellationToken,
    ) -> Result<Outcome<()>, ExecutionError> {
        let (filter, request) = auth.into_parts();
        let Some(entity) = self.read.find(&filter, request.id, cancel).await? else {
            return Ok(Outcome::not_found());
        };
        if let Some(conflict) = check_version(entity.version(), request.timestamp.as_deref()) {
            return Ok(Outcome::conflict(conflict));
        }

        self.hooks.before_delete(&entity).await?;
        let mut changes = ChangeSet::new();
        changes.remove(entity.id(), entity.version().map(<[u8]>::to_vec));
        guarded_store(cancel, self.read.store.save(changes)).await?;
        self.hooks.after_delete(&entity).await?;

        tracing::debug!(entity = E::resource_name(), id = entity.id(), "entity deleted");
        Ok(Outcome::success(()))
    }
}

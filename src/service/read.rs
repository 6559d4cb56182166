//! Read-only entity service

use crate::authorization::handler::HandlerSet;
use crate::authorization::operation::{GetHistory, GetList, GetSingle};
use crate::authorization::result::{Authorization, RowFilter};
use crate::config::ScaffoldConfig;
use crate::core::entity::{Dto, DtoMapper, Entity, EntityId};
use crate::core::error::{ExecutionError, PipelineError};
use crate::core::outcome::Outcome;
use crate::core::query::{Query, TemporalWindow};
use crate::core::store::{EntityStore, SchemaStatus};
use crate::pipeline::{Pipeline, PipelineState, guarded_store};
use crate::service::request::{GetHistoryRequest, GetListRequest, ListPage};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Authorized reads of entity `E`, exposed as `D`
pub struct ReadService<E: Entity, D: Dto, S, M> {
    pub(crate) store: Arc<S>,
    pub(crate) mapper: Arc<M>,
    pub(crate) handlers: HandlerSet<E, D>,
    pub(crate) pipeline: Pipeline,
}

impl<E: Entity, D: Dto, S, M> Clone for ReadService<E, D, S, M> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            mapper: Arc::clone(&self.mapper),
            handlers: self.handlers.clone(),
            pipeline: self.pipeline.clone(),
        }
    }
}

impl<E, D, S, M> ReadService<E, D, S, M>
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
        let schema: Arc<dyn SchemaStatus> = store.clone();
        Self {
            store,
            mapper,
            handlers,
            pipeline: Pipeline::new(state, schema),
        }
    }

    /// Apply the service-level settings of `config`
    pub fn with_config(mut self, config: &ScaffoldConfig) -> Self {
        self.pipeline = self.pipeline.with_migration_check(config.check_migrations);
        self
    }

    pub fn handlers(&self) -> &HandlerSet<E, D> {
        &self.handlers
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Fetch one entity; rows hidden by the authorization filter are `404`
    pub async fn get_single(
        &self,
        id: EntityId,
        cancel: &CancellationToken,
    ) -> Result<Outcome<D>, PipelineError> {
        self.pipeline
            .run::<E, D, GetSingle, _, _>(&self.handlers, id, cancel, |auth| {
                self.fetch_single(auth, cancel)
            })
            .await
    }

    pub async fn get_list(
        &self,
        request: GetListRequest<D, E>,
        cancel: &CancellationToken,
    ) -> Result<Outcome<ListPage<D>>, PipelineError> {
        self.pipeline
            .run::<E, D, GetList, _, _>(&self.handlers, request, cancel, |auth| async move {
                let (filter, request) = auth.into_parts();
                self.fetch_page(&filter, None, request, cancel).await
            })
            .await
    }

    /// List history rows overlapping the request's window
    pub async fn get_history(
        &self,
        request: GetHistoryRequest<D, E>,
        cancel: &CancellationToken,
    ) -> Result<Outcome<ListPage<D>>, PipelineError> {
        self.pipeline
            .run::<E, D, GetHistory, _, _>(&self.handlers, request, cancel, |auth| async move {
                let (filter, request) = auth.into_parts();
                self.fetch_page(&filter, Some(request.window), request.list, cancel)
                    .await
            })
            .await
    }

    async fn fetch_single(
        &self,
        auth: Authorization<EntityId, E>,
        cancel: &CancellationToken,
    ) -> Result<Outcome<D>, ExecutionError> {
        let (filter, id) = auth.into_parts();
        match self.find(&filter, id, cancel).await? {
            Some(entity) => Ok(Outcome::success(self.mapper.to_dto(&entity))),
            None => Ok(Outcome::not_found()),
        }
    }

    /// Look up `id` among the rows visible through `filter`
    pub(crate) async fn find(
        &self,
        filter: &RowFilter<E>,
        id: EntityId,
        cancel: &CancellationToken,
    ) -> Result<Option<E>, ExecutionError> {
        let query = filter
            .apply(Query::new())
            .filter(move |row: &E| row.id() == id)
            .take(1);
        let rows = guarded_store(cancel, self.store.fetch(&query)).await?;
        if rows.is_empty() {
            tracing::debug!(entity = E::resource_name(), id, "entity not found or not visible");
        }
        Ok(rows.into_iter().next())
    }

    async fn fetch_page(
        &self,
        filter: &RowFilter<E>,
        window: Option<TemporalWindow>,
        request: GetListRequest<D, E>,
        cancel: &CancellationToken,
    ) -> Result<Outcome<ListPage<D>>, ExecutionError> {
        let count_filter = match (request.calculate_total_count, request.filter_for_total_count) {
            (false, _) => None,
            (true, Some(count_filter)) => Some(count_filter),
            (true, None) => {
                return Err(ExecutionError::InvalidRequest(
                    "calculate_total_count requires filter_for_total_count".to_string(),
                ));
            }
        };

        // Page and count each start from their own authorization-filtered source
        let source = || {
            let query = match window {
                Some(window) => Query::new().during(window),
                None => Query::new(),
            };
            filter.apply(query)
        };

        let page = (request.filter)(source());
        let (rows, total_count) = match count_filter {
            Some(count_filter) => {
                let count = count_filter(source());
                let (rows, total) = futures::try_join!(
                    guarded_store(cancel, self.store.fetch(page.query())),
                    guarded_store(cancel, self.store.count(count.query())),
                )?;
                (rows, Some(total))
            }
            None => (guarded_store(cancel, self.store.fetch(page.query())).await?, None),
        };

        Ok(Outcome::success(ListPage::new(page.map_rows(&rows), total_count)))
    }
}

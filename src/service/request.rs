//! Request and response shapes of the generic service actions

use crate::core::entity::{EntityId, VersionToken};
use crate::core::query::{Projection, Query, TemporalWindow};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Maps an authorization-filtered entity query to a DTO projection
pub type ListFilter<E, D> = Arc<dyn Fn(Query<E>) -> Projection<E, D> + Send + Sync>;

/// Restricts which entities a batch update may touch
pub type EntityFilter<E> = Arc<dyn Fn(Query<E>) -> Query<E> + Send + Sync>;

/// Paged list request
///
/// `filter` produces the page (ordering and paging included);
/// `filter_for_total_count` produces the same predicate without ordering or
/// paging. When `calculate_total_count` is set the count filter is required;
/// a missing one is reported as [`PipelineError::InvalidRequest`](crate::core::PipelineError).
pub struct GetListRequest<D, E> {
    pub filter: ListFilter<E, D>,
    pub filter_for_total_count: Option<ListFilter<E, D>>,
    pub calculate_total_count: bool,
}

impl<D, E> Clone for GetListRequest<D, E> {
    fn clone(&self) -> Self {
        Self {
            filter: Arc::clone(&self.filter),
            filter_for_total_count: self.filter_for_total_count.clone(),
            calculate_total_count: self.calculate_total_count,
        }
    }
}

impl<D, E> fmt::Debug for GetListRequest<D, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetListRequest")
            .field("has_count_filter", &self.filter_for_total_count.is_some())
            .field("calculate_total_count", &self.calculate_total_count)
            .finish()
    }
}

impl<D, E> GetListRequest<D, E> {
    /// Page-only request, no total count
    pub fn new(filter: impl Fn(Query<E>) -> Projection<E, D> + Send + Sync + 'static) -> Self {
        Self {
            filter: Arc::new(filter),
            filter_for_total_count: None,
            calculate_total_count: false,
        }
    }

    /// Also compute the total number of matching rows with `count_filter`
    pub fn with_total_count(
        mut self,
        count_filter: impl Fn(Query<E>) -> Projection<E, D> + Send + Sync + 'static,
    ) -> Self {
        self.filter_for_total_count = Some(Arc::new(count_filter));
        self.calculate_total_count = true;
        self
    }
}

/// List request over the system-versioned history of an entity set
pub struct GetHistoryRequest<D, E> {
    pub list: GetListRequest<D, E>,
    pub window: TemporalWindow,
}

impl<D, E> Clone for GetHistoryRequest<D, E> {
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
            window: self.window,
        }
    }
}

impl<D, E> fmt::Debug for GetHistoryRequest<D, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetHistoryRequest")
            .field("list", &self.list)
            .field("window", &self.window)
            .finish()
    }
}

impl<D, E> GetHistoryRequest<D, E> {
    pub fn new(list: GetListRequest<D, E>, window: TemporalWindow) -> Self {
        Self { list, window }
    }
}

/// Batch update request
pub struct UpdateMultipleRequest<D, E> {
    pub dtos: Vec<D>,
    pub filter: EntityFilter<E>,
}

impl<D: Clone, E> Clone for UpdateMultipleRequest<D, E> {
    fn clone(&self) -> Self {
        Self {
            dtos: self.dtos.clone(),
            filter: Arc::clone(&self.filter),
        }
    }
}

impl<D: fmt::Debug, E> fmt::Debug for UpdateMultipleRequest<D, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateMultipleRequest")
            .field("dtos", &self.dtos)
            .finish_non_exhaustive()
    }
}

impl<D, E: 'static> UpdateMultipleRequest<D, E> {
    /// Batch update limited only by the authorization filter
    pub fn new(dtos: Vec<D>) -> Self {
        Self {
            dtos,
            filter: Arc::new(|query: Query<E>| query),
        }
    }

    pub fn with_filter(
        mut self,
        filter: impl Fn(Query<E>) -> Query<E> + Send + Sync + 'static,
    ) -> Self {
        self.filter = Arc::new(filter);
        self
    }
}

/// Delete request: identity plus the version token the client last saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub id: EntityId,
    pub timestamp: Option<VersionToken>,
}

impl DeleteRequest {
    pub fn new(id: EntityId, timestamp: Option<VersionToken>) -> Self {
        Self { id, timestamp }
    }
}

/// One page of DTOs plus the optional total count
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPage<D> {
    pub items: Vec<D>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
}

impl<D> ListPage<D> {
    pub fn new(items: Vec<D>, total_count: Option<usize>) -> Self {
        Self { items, total_count }
    }
}

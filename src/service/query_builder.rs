//! List and history query building
//!
//! Turns OData-style list parameters into a [`GetListRequest`] whose page
//! and count transforms share one predicate, so the total count always
//! describes the same rows the page is cut from.

use crate::config::ScaffoldConfig;
use crate::core::entity::Entity;
use crate::core::error::QueryError;
use crate::core::field::FieldValue;
use crate::core::query::{Comparator, Predicate, Query, TemporalWindow};
use crate::service::request::{GetHistoryRequest, GetListRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Raw list parameters as received from a caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListParams {
    /// Filters as JSON object
    ///
    /// # Format
    /// - Exact match: `{"field": "value"}`
    /// - Comparison: `{"field>": value, "field<": value, "field>=": value, "field<=": value, "field!=": value}`
    ///
    /// # Example
    /// ```text
    /// $filter={"status": "active", "total>": 100}
    /// ```
    #[serde(rename = "$filter", default)]
    pub filter: Option<String>,

    /// Comma-separated sort keys, `field` or `field asc|desc`
    #[serde(rename = "$orderby", default)]
    pub orderby: Option<String>,

    #[serde(rename = "$skip", default)]
    pub skip: Option<usize>,

    /// Requested page size; clamped to the configured maximum
    #[serde(rename = "$top", default)]
    pub top: Option<usize>,

    /// Also compute the total number of matching rows
    #[serde(rename = "$count", default)]
    pub count: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Operator {
    /// Split `"total>="` into `("total", Ge)`
    fn split(key: &str) -> (&str, Operator) {
        const SUFFIXES: [(&str, Operator); 5] = [
            (">=", Operator::Ge),
            ("<=", Operator::Le),
            ("!=", Operator::Ne),
            (">", Operator::Gt),
            ("<", Operator::Lt),
        ];
        SUFFIXES
            .iter()
            .find_map(|(suffix, op)| key.strip_suffix(suffix).map(|field| (field.trim_end(), *op)))
            .unwrap_or((key, Operator::Eq))
    }

    fn matches(self, ordering: Option<Ordering>) -> bool {
        match self {
            Operator::Eq => ordering == Some(Ordering::Equal),
            Operator::Ne => ordering != Some(Ordering::Equal),
            Operator::Gt => ordering == Some(Ordering::Greater),
            Operator::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            Operator::Lt => ordering == Some(Ordering::Less),
            Operator::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

/// Abstract description of a list read: predicate, ordering and paging
pub struct ListQuery<E> {
    predicate: Option<Predicate<E>>,
    order: Vec<Comparator<E>>,
    skip: usize,
    top: Option<usize>,
}

impl<E> Clone for ListQuery<E> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            order: self.order.clone(),
            skip: self.skip,
            top: self.top,
        }
    }
}

impl<E> Default for ListQuery<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for ListQuery<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListQuery")
            .field("filtered", &self.predicate.is_some())
            .field("sort_keys", &self.order.len())
            .field("skip", &self.skip)
            .field("top", &self.top)
            .finish()
    }
}

impl<E> ListQuery<E> {
    /// Everything, in storage order, one full page
    pub fn new() -> Self {
        Self {
            predicate: None,
            order: Vec::new(),
            skip: 0,
            top: None,
        }
    }

    /// Add a predicate; all predicates must hold
    pub fn filter(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self
    where
        E: 'static,
    {
        let combined: Predicate<E> = match self.predicate.take() {
            Some(existing) => Arc::new(move |row: &E| existing(row) && predicate(row)),
            None => Arc::new(predicate),
        };
        self.predicate = Some(combined);
        self
    }

    /// Add a sort key after the existing ones
    pub fn order_by(mut self, comparator: impl Fn(&E, &E) -> Ordering + Send + Sync + 'static) -> Self {
        self.order.push(Arc::new(comparator));
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn top(mut self, top: usize) -> Self {
        self.top = Some(top);
        self
    }

    /// Rows matching the predicate, no ordering or paging
    fn filtered(&self, query: Query<E>) -> Query<E> {
        match &self.predicate {
            Some(predicate) => query.filter_by(Arc::clone(predicate)),
            None => query,
        }
    }

    /// Filter, order, then cut the page of at most `max_page_size` rows
    fn paged(&self, query: Query<E>, max_page_size: usize) -> Query<E> {
        let mut query = self.filtered(query);
        let mut keys = self.order.iter();
        if let Some(first) = keys.next() {
            query = query.order_by_comparator(Arc::clone(first));
            for key in keys {
                query = query.then_by_comparator(Arc::clone(key));
            }
        }
        let page_size = self.top.map_or(max_page_size, |top| top.min(max_page_size));
        query.skip(self.skip).take(page_size)
    }
}

impl<E: Entity> ListQuery<E> {
    /// Parse `$filter`, `$orderby`, `$skip` and `$top`
    pub fn from_params(params: &ListParams) -> Result<Self, QueryError> {
        let mut query = Self::new();
        if let Some(filter) = params.filter.as_deref().filter(|f| !f.trim().is_empty()) {
            query = query.parse_filter(filter)?;
        }
        if let Some(orderby) = params.orderby.as_deref() {
            query = query.parse_order(orderby)?;
        }
        query.skip = params.skip.unwrap_or(0);
        query.top = params.top;
        Ok(query)
    }

    fn parse_filter(mut self, filter: &str) -> Result<Self, QueryError> {
        let value: Value =
            serde_json::from_str(filter).map_err(|e| QueryError::MalformedFilter(e.to_string()))?;
        let Value::Object(conditions) = value else {
            return Err(QueryError::FilterNotObject);
        };

        for (key, operand) in conditions {
            let (field, op) = Operator::split(&key);
            let operand = FieldValue::from_json(&operand).ok_or_else(|| {
                QueryError::UnsupportedOperand {
                    field: field.to_string(),
                }
            })?;
            let field = field.to_string();
            self = self.filter(move |row: &E| {
                let ordering = row
                    .field_value(&field)
                    .and_then(|value| value.compare(&operand));
                op.matches(ordering)
            });
        }
        Ok(self)
    }

    fn parse_order(mut self, orderby: &str) -> Result<Self, QueryError> {
        for key in orderby.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            let mut parts = key.split_whitespace();
            let field = parts.next().unwrap_or_default().to_string();
            let descending = match parts.next().map(str::to_ascii_lowercase).as_deref() {
                None | Some("asc") => false,
                Some("desc") => true,
                Some(other) => {
                    return Err(QueryError::InvalidSortDirection {
                        field,
                        direction: other.to_string(),
                    });
                }
            };
            self = self.order_by(move |a: &E, b: &E| {
                let ordering = compare_fields(a.field_value(&field), b.field_value(&field));
                if descending { ordering.reverse() } else { ordering }
            });
        }
        Ok(self)
    }
}

/// Missing fields sort first; incompatible values compare equal
fn compare_fields(a: Option<FieldValue>, b: Option<FieldValue>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.compare(&b).unwrap_or(Ordering::Equal),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Builds list and history requests under a page-size ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQueryBuilder {
    max_page_size: usize,
}

impl ListQueryBuilder {
    pub fn new(max_page_size: usize) -> Self {
        Self {
            max_page_size: max_page_size.max(1),
        }
    }

    /// Builder using the configured ceiling for entity `E`
    pub fn for_entity<E: Entity>(config: &ScaffoldConfig) -> Self {
        Self::new(config.max_page_size_for(E::resource_name()))
    }

    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    /// Build a list request; the count transform is attached when `count` is set
    pub fn build<E, D>(
        &self,
        query: &ListQuery<E>,
        select: impl Fn(&E) -> D + Send + Sync + 'static,
        count: bool,
    ) -> GetListRequest<D, E>
    where
        E: 'static,
        D: 'static,
    {
        let select: Arc<dyn Fn(&E) -> D + Send + Sync> = Arc::new(select);
        let max_page_size = self.max_page_size;

        let page_query = query.clone();
        let page_select = Arc::clone(&select);
        let request = GetListRequest::new(move |source: Query<E>| {
            let select = Arc::clone(&page_select);
            page_query
                .paged(source, max_page_size)
                .select(move |row: &E| select(row))
        });
        if !count {
            return request;
        }

        let count_query = query.clone();
        request.with_total_count(move |source: Query<E>| {
            let select = Arc::clone(&select);
            count_query.filtered(source).select(move |row: &E| select(row))
        })
    }

    /// Build a history request over `window`
    pub fn build_history<E, D>(
        &self,
        query: &ListQuery<E>,
        select: impl Fn(&E) -> D + Send + Sync + 'static,
        count: bool,
        window: TemporalWindow,
    ) -> GetHistoryRequest<D, E>
    where
        E: 'static,
        D: 'static,
    {
        GetHistoryRequest::new(self.build(query, select, count), window)
    }

    /// Parse `params` and build the list request it describes
    pub fn from_params<E, D>(
        &self,
        params: &ListParams,
        select: impl Fn(&E) -> D + Send + Sync + 'static,
    ) -> Result<GetListRequest<D, E>, QueryError>
    where
        E: Entity,
        D: 'static,
    {
        let query = ListQuery::from_params(params)?;
        Ok(self.build(&query, select, params.count))
    }
}

//! Composable entity queries
//!
//! A [`Query`] is a lazily evaluated description of a read: a source
//! selector (current rows, or history rows overlapping a [`TemporalWindow`])
//! followed by an ordered list of stages. Stages run in the order they were
//! added, so `filter` after `take` narrows the page rather than the source.
//!
//! # Example
//! ```rust,ignore
//! let query = Query::<Order>::new()
//!     .filter(|o| o.total > 100)
//!     .order_by(|a, b| a.created_at.cmp(&b.created_at))
//!     .skip(20)
//!     .take(10);
//! let rows = store.fetch(&query).await?;
//! ```

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Row predicate
pub type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Row comparator used for ordering
pub type Comparator<E> = Arc<dyn Fn(&E, &E) -> Ordering + Send + Sync>;

/// Half-open system-time window `[valid_from, valid_to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalWindow {
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
}

impl TemporalWindow {
    pub fn new(valid_from: DateTime<Utc>, valid_to: DateTime<Utc>) -> Self {
        Self {
            valid_from,
            valid_to,
        }
    }

    /// Whether a row valid during `[row_from, row_to)` overlaps this window
    pub fn overlaps(&self, row_from: DateTime<Utc>, row_to: DateTime<Utc>) -> bool {
        row_from < self.valid_to && row_to > self.valid_from
    }
}

enum Stage<E> {
    Filter(Predicate<E>),
    Sort(Vec<Comparator<E>>),
    Skip(usize),
    Take(usize),
}

impl<E> Clone for Stage<E> {
    fn clone(&self) -> Self {
        match self {
            Stage::Filter(p) => Stage::Filter(Arc::clone(p)),
            Stage::Sort(c) => Stage::Sort(c.clone()),
            Stage::Skip(n) => Stage::Skip(*n),
            Stage::Take(n) => Stage::Take(*n),
        }
    }
}

/// Lazily evaluated query over entities of type `E`
pub struct Query<E> {
    window: Option<TemporalWindow>,
    stages: Vec<Stage<E>>,
}

impl<E> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self {
            window: self.window,
            stages: self.stages.clone(),
        }
    }
}

impl<E> Default for Query<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages: Vec<String> = self
            .stages
            .iter()
            .map(|stage| match stage {
                Stage::Filter(_) => "filter".to_string(),
                Stage::Sort(c) => format!("sort({})", c.len()),
                Stage::Skip(n) => format!("skip({n})"),
                Stage::Take(n) => format!("take({n})"),
            })
            .collect();
        f.debug_struct("Query")
            .field("window", &self.window)
            .field("stages", &stages)
            .finish()
    }
}

impl<E> Query<E> {
    /// Query over all current rows
    pub fn new() -> Self {
        Self {
            window: None,
            stages: Vec::new(),
        }
    }

    /// Read history rows overlapping `window` instead of current rows
    pub fn during(mut self, window: TemporalWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn window(&self) -> Option<&TemporalWindow> {
        self.window.as_ref()
    }

    pub fn filter(self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.filter_by(Arc::new(predicate))
    }

    pub fn filter_by(mut self, predicate: Predicate<E>) -> Self {
        self.stages.push(Stage::Filter(predicate));
        self
    }

    /// Start a new ordering, replacing the effect of any earlier sort
    pub fn order_by(self, comparator: impl Fn(&E, &E) -> Ordering + Send + Sync + 'static) -> Self {
        self.order_by_comparator(Arc::new(comparator))
    }

    pub fn order_by_comparator(mut self, comparator: Comparator<E>) -> Self {
        self.stages.push(Stage::Sort(vec![comparator]));
        self
    }

    /// Add a tie-breaker to the most recent ordering, or start one
    pub fn then_by(self, comparator: impl Fn(&E, &E) -> Ordering + Send + Sync + 'static) -> Self {
        self.then_by_comparator(Arc::new(comparator))
    }

    pub fn then_by_comparator(mut self, comparator: Comparator<E>) -> Self {
        match self.stages.last_mut() {
            Some(Stage::Sort(comparators)) => comparators.push(comparator),
            _ => self.stages.push(Stage::Sort(vec![comparator])),
        }
        self
    }

    pub fn skip(mut self, count: usize) -> Self {
        self.stages.push(Stage::Skip(count));
        self
    }

    pub fn take(mut self, count: usize) -> Self {
        self.stages.push(Stage::Take(count));
        self
    }

    /// Map matching rows through `map` when executed
    pub fn select<D>(self, map: impl Fn(&E) -> D + Send + Sync + 'static) -> Projection<E, D> {
        Projection {
            query: self,
            map: Arc::new(map),
        }
    }

    /// Run all stages over an already selected source.
    ///
    /// Stores call this after resolving the source rows (current or history).
    pub fn evaluate(&self, rows: Vec<E>) -> Vec<E> {
        self.stages.iter().fold(rows, |mut rows, stage| match stage {
            Stage::Filter(predicate) => {
                rows.retain(|row| predicate(row));
                rows
            }
            Stage::Sort(comparators) => {
                rows.sort_by(|a, b| {
                    comparators
                        .iter()
                        .map(|cmp| cmp(a, b))
                        .find(|ordering| ordering.is_ne())
                        .unwrap_or(Ordering::Equal)
                });
                rows
            }
            Stage::Skip(count) => rows.into_iter().skip(*count).collect(),
            Stage::Take(count) => {
                rows.truncate(*count);
                rows
            }
        })
    }
}

/// A query whose results are mapped into another type
pub struct Projection<E, D> {
    query: Query<E>,
    map: Arc<dyn Fn(&E) -> D + Send + Sync>,
}

impl<E, D> Clone for Projection<E, D> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            map: Arc::clone(&self.map),
        }
    }
}

impl<E, D> fmt::Debug for Projection<E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projection")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

impl<E, D> Projection<E, D> {
    pub fn query(&self) -> &Query<E> {
        &self.query
    }

    pub fn into_query(self) -> Query<E> {
        self.query
    }

    pub fn map_rows(&self, rows: &[E]) -> Vec<D> {
        rows.iter().map(|row| (self.map)(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_filter_then_sort_then_page() {
        let query = Query::<i32>::new()
            .filter(|n| n % 2 == 0)
            .order_by(|a, b| b.cmp(a))
            .skip(1)
            .take(2);
        assert_eq!(query.evaluate((1..=10).collect()), vec![8, 6]);
    }

    #[test]
    fn test_stage_order_matters() {
        let page_then_filter = Query::<i32>::new().take(3).filter(|n| *n > 1);
        assert_eq!(page_then_filter.evaluate(vec![1, 2, 3, 4, 5]), vec![2, 3]);

        let filter_then_page = Query::<i32>::new().filter(|n| *n > 1).take(3);
        assert_eq!(filter_then_page.evaluate(vec![1, 2, 3, 4, 5]), vec![2, 3, 4]);
    }

    #[test]
    fn test_then_by_breaks_ties() {
        let query = Query::<(i32, &'static str)>::new()
            .order_by(|a, b| a.0.cmp(&b.0))
            .then_by(|a, b| b.1.cmp(&a.1));
        let rows = vec![(2, "a"), (1, "a"), (1, "b"), (2, "c")];
        assert_eq!(
            query.evaluate(rows),
            vec![(1, "b"), (1, "a"), (2, "c"), (2, "a")]
        );
    }

    #[test]
    fn test_select_maps_rows() {
        let projection = Query::<i32>::new().filter(|n| *n > 2).select(|n| n.to_string());
        let rows = projection.query().evaluate(vec![1, 2, 3, 4]);
        assert_eq!(projection.map_rows(&rows), vec!["3", "4"]);
    }

    #[test]
    fn test_window_overlap_is_half_open() {
        let start = Utc::now();
        let window = TemporalWindow::new(start, start + Duration::hours(1));

        assert!(window.overlaps(start - Duration::hours(1), start + Duration::minutes(1)));
        assert!(!window.overlaps(start - Duration::hours(1), start));
        assert!(!window.overlaps(start + Duration::hours(1), start + Duration::hours(2)));
    }
}

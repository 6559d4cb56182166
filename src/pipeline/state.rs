//! Process-wide pipeline state
//!
//! One [`PipelineState`] is created at startup and shared by every service
//! instance. It replaces hidden statics so tests can use a fresh one each.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Caches shared by all pipelines of a process
#[derive(Debug, Default)]
pub struct PipelineState {
    schema_ready: AtomicBool,
    unguarded: Mutex<HashSet<String>>,
    missing_handler_warnings: AtomicUsize,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Whether a previous check found no pending migrations
    pub fn schema_ready(&self) -> bool {
        self.schema_ready.load(Ordering::Acquire)
    }

    pub fn mark_schema_ready(&self) {
        self.schema_ready.store(true, Ordering::Release);
    }

    /// Record that `combination` runs without handlers.
    ///
    /// Returns `true` only the first time a combination is recorded, so the
    /// caller logs the warning exactly once.
    pub fn note_missing_handlers(&self, combination: &str) -> bool {
        let first = self
            .unguarded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(combination.to_string());
        if first {
            self.missing_handler_warnings.fetch_add(1, Ordering::Relaxed);
        }
        first
    }

    /// Number of "no handler configured" warnings emitted so far
    pub fn missing_handler_warnings(&self) -> usize {
        self.missing_handler_warnings.load(Ordering::Relaxed)
    }
}

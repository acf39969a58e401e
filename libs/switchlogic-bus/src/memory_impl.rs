//! In-memory signal bus
//!
//! Uses DashMap for concurrent path lookup; each path is backed by a
//! `Subject` that replays its latest value to new subscribers.

use crate::observable::{Observable, Subject};
use crate::traits::SignalSource;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

/// In-memory signal bus keyed by dotted path
pub struct MemoryBus {
    subjects: DashMap<String, Arc<Subject<Value>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self {
            subjects: DashMap::new(),
        }
    }

    fn subject(&self, path: &str) -> Arc<Subject<Value>> {
        // Clone out of the map so no shard lock is held while callbacks run
        Arc::clone(
            self.subjects
                .entry(path.to_string())
                .or_insert_with(|| Arc::new(Subject::new()))
                .value(),
        )
    }

    /// Publish a value at `path`, returning the number of subscribers notified
    pub fn publish(&self, path: &str, value: Value) -> usize {
        tracing::trace!("publish {} = {}", path, value);
        self.subject(path).publish(value)
    }

    /// Latest value published at `path`
    pub fn latest(&self, path: &str) -> Option<Value> {
        self.subjects.get(path).and_then(|s| s.latest())
    }

    /// Drop every path (existing subscriptions keep their detached subjects)
    pub fn clear(&self) {
        self.subjects.clear();
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            path_count: self.subjects.len(),
            subscriber_count: self
                .subjects
                .iter()
                .map(|entry| entry.value().subscriber_count())
                .sum(),
        }
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalSource for MemoryBus {
    fn stream(&self, path: &str) -> Observable<Value> {
        self.subject(path).observable()
    }
}

/// Bus statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    pub path_count: usize,
    pub subscriber_count: usize,
}

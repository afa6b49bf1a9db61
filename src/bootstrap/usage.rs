// Copyright 2024 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Usage aggregation for deprecated resource paths.
//!
//! The aggregator is written by every request-handling path concurrently and
//! drained by a single periodic flusher into a persistent counter store.
//! Contention stays on the individual counter bucket; there is no global
//! lock across request handling.

use super::BackgroundTask;
use crate::admission::errors::TaskError;
use crate::admission::Attributes;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Counts saturate here instead of wrapping. Matches the widest value the
/// persistent store can hold.
pub const COUNT_CAP: u64 = i64::MAX as u64;

/// Default flush cadence, independent of request handling.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// SinkError represents a failed delivery to the persistent counter store.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SinkError(pub String);

/// UsageKey identifies one counter: which resource was called, by whom, with
/// which verb.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UsageKey {
    pub resource: String,
    pub user: String,
    pub verb: String,
}

impl UsageKey {
    pub fn new(resource: &str, user: &str, verb: &str) -> Self {
        Self {
            resource: resource.to_string(),
            user: user.to_string(),
            verb: verb.to_string(),
        }
    }
}

/// UsageRecord is one flushed counter row: the since-last-flush delta plus
/// the cumulative total for the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub key: UsageKey,
    pub node: String,
    pub delta: u64,
    pub total: u64,
    pub last_seen: SystemTime,
}

/// UsageSink receives periodic batched upserts from the flusher.
///
/// Persistence must upsert by key so repeated delivery of the same
/// key/window never double-counts.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn upsert(&self, records: &[UsageRecord]) -> Result<(), SinkError>;
}

struct CounterEntry {
    /// Count since the last flush. Reset by the flusher.
    window: AtomicU64,
    /// Cumulative count for the life of the process. Never reset.
    total: AtomicU64,
    last_seen: RwLock<SystemTime>,
}

impl CounterEntry {
    fn new() -> Self {
        Self {
            window: AtomicU64::new(0),
            total: AtomicU64::new(0),
            last_seen: RwLock::new(SystemTime::now()),
        }
    }
}

/// Increment a counter without wrapping: the value caps at [`COUNT_CAP`].
fn saturating_add(counter: &AtomicU64, delta: u64) -> u64 {
    let mut current = counter.load(Ordering::Relaxed);
    loop {
        if current >= COUNT_CAP {
            return COUNT_CAP;
        }
        let next = current.saturating_add(delta).min(COUNT_CAP);
        match counter.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => current = observed,
        }
    }
}

/// UsageAggregator is the concurrent counter store keyed by
/// (resource, caller, verb).
pub struct UsageAggregator {
    counters: DashMap<UsageKey, CounterEntry>,
    node: String,
}

impl UsageAggregator {
    /// Create an aggregator reporting under the given node name.
    pub fn new(node: &str) -> Self {
        Self {
            counters: DashMap::new(),
            node: node.to_string(),
        }
    }

    /// The node name stamped onto flushed records.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Record one call for the key. Safe under arbitrarily many concurrent
    /// callers; no increment is ever dropped.
    pub fn record(&self, key: UsageKey) {
        let entry = self
            .counters
            .entry(key)
            .or_insert_with(CounterEntry::new);
        saturating_add(&entry.window, 1);
        saturating_add(&entry.total, 1);
        *entry
            .last_seen
            .write()
            .expect("usage counter lock poisoned") = SystemTime::now();
    }

    /// Record one call described by request attributes.
    pub fn record_request(&self, attributes: &dyn Attributes) {
        self.record(UsageKey::new(
            &attributes.get_resource().canonical(),
            &attributes.get_user().username,
            attributes.get_operation().verb(),
        ));
    }

    /// Cumulative count for the key.
    pub fn total(&self, key: &UsageKey) -> u64 {
        self.counters
            .get(key)
            .map(|entry| entry.total.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Number of distinct keys ever recorded. Identities survive flushes.
    pub fn tracked_keys(&self) -> usize {
        self.counters.len()
    }

    /// Drain the since-last-flush deltas. Counter identities stay in the
    /// store; only the window resets.
    pub(crate) fn drain_window(&self) -> Vec<UsageRecord> {
        let mut records = Vec::new();
        for entry in self.counters.iter() {
            let delta = entry.window.swap(0, Ordering::AcqRel);
            if delta == 0 {
                continue;
            }
            records.push(UsageRecord {
                key: entry.key().clone(),
                node: self.node.clone(),
                delta,
                total: entry.total.load(Ordering::Acquire),
                last_seen: *entry
                    .last_seen
                    .read()
                    .expect("usage counter lock poisoned"),
            });
        }
        records
    }

    /// Return an undelivered window delta to its counter.
    pub(crate) fn restore_window(&self, key: &UsageKey, delta: u64) {
        if let Some(entry) = self.counters.get(key) {
            saturating_add(&entry.window, delta);
        }
    }
}

/// UsageFlusher periodically drains the aggregator into the sink.
///
/// Runs as an orchestrator-registered background task on its own cadence. A
/// failed delivery returns the drained deltas to their counters for the next
/// window rather than dropping them.
pub struct UsageFlusher {
    aggregator: Arc<UsageAggregator>,
    sink: Arc<dyn UsageSink>,
    interval: Duration,
}

impl UsageFlusher {
    /// Create a flusher with the default cadence.
    pub fn new(aggregator: Arc<UsageAggregator>, sink: Arc<dyn UsageSink>) -> Self {
        Self {
            aggregator,
            sink,
            interval: DEFAULT_FLUSH_INTERVAL,
        }
    }

    /// Override the flush cadence.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    async fn flush(&self) {
        let records = self.aggregator.drain_window();
        if records.is_empty() {
            return;
        }
        match self.sink.upsert(&records).await {
            Ok(()) => {
                debug!(records = records.len(), "usage counts flushed");
            }
            Err(err) => {
                warn!(
                    error = %err,
                    records = records.len(),
                    "usage flush failed; deltas retained for next window"
                );
                for record in &records {
                    self.aggregator.restore_window(&record.key, record.delta);
                }
            }
        }
    }
}

#[async_trait]
impl BackgroundTask for UsageFlusher {
    async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), TaskError> {
        loop {
            let shutting_down = tokio::select! {
                _ = tokio::time::sleep(self.interval) => false,
                changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
            };
            // One final flush runs on the way out.
            self.flush().await;
            if shutting_down {
                return Ok(());
            }
        }
    }
}

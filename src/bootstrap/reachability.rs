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

//! Reachability gates for dependent services.
//!
//! A reachability gate polls a lightweight connectivity probe until the
//! dependent service answers, then latches reachable and stops polling. The
//! readiness surface consumes the boolean; lack of reachability degrades
//! readiness and is never fatal to the process.

use super::BackgroundTask;
use crate::admission::errors::TaskError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tracing::{debug, info};

/// Default probe interval. Kept at low single-digit seconds so the gate
/// answers readiness soon after the dependent service comes up.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// ReachabilityProbe is one lightweight connectivity attempt against a
/// dependent service.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Returns true if the service answered.
    async fn check(&self) -> bool;
}

/// ReachabilityStatus is the shared observation state of one gate: a single
/// probe writer, many readiness readers.
///
/// "Never observed" (no last-checked timestamp) must be treated by readers
/// as not-ready, never as an error.
#[derive(Debug, Default)]
pub struct ReachabilityStatus {
    reachable: AtomicBool,
    last_checked: RwLock<Option<SystemTime>>,
}

impl ReachabilityStatus {
    /// Returns true once the service has been observed reachable. One-shot
    /// latch: never flips back to false.
    pub fn reachable(&self) -> bool {
        self.reachable.load(Ordering::Acquire)
    }

    /// When the probe last ran, if it ever has.
    pub fn last_checked(&self) -> Option<SystemTime> {
        *self
            .last_checked
            .read()
            .expect("reachability status lock poisoned")
    }

    pub(crate) fn record(&self, success: bool) {
        // The latch only ever moves false -> true.
        if success {
            self.reachable.store(true, Ordering::Release);
        }
        *self
            .last_checked
            .write()
            .expect("reachability status lock poisoned") = Some(SystemTime::now());
    }
}

/// ReachabilityGate is a background task polling one dependent service.
pub struct ReachabilityGate {
    service: String,
    probe: Arc<dyn ReachabilityProbe>,
    status: Arc<ReachabilityStatus>,
    interval: Duration,
}

impl ReachabilityGate {
    /// Create a gate for the named dependent service.
    pub fn new(service: &str, probe: Arc<dyn ReachabilityProbe>) -> Self {
        Self {
            service: service.to_string(),
            probe,
            status: Arc::new(ReachabilityStatus::default()),
            interval: DEFAULT_PROBE_INTERVAL,
        }
    }

    /// Override the poll interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// The status handle consumed by the readiness surface.
    pub fn status(&self) -> Arc<ReachabilityStatus> {
        Arc::clone(&self.status)
    }

    /// The conventional task name for this gate.
    pub fn task_name(&self) -> String {
        format!("{}-reachable", self.service)
    }
}

#[async_trait]
impl BackgroundTask for ReachabilityGate {
    async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), TaskError> {
        loop {
            if self.probe.check().await {
                self.status.record(true);
                info!(service = %self.service, "dependent service reachable");
                return Ok(());
            }
            self.status.record(false);
            debug!(service = %self.service, "dependent service not yet reachable");

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

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

//! Per-resource synchronization loops.
//!
//! Each shared resource cache is refreshed by one loop listing the backing
//! store on an independent resync cadence. A failed list is
//! degraded-but-recoverable: the previous snapshot keeps serving and the loop
//! retries at the next cadence tick.

use super::cache::{ResourceCache, ResourceKind};
use crate::admission::errors::TaskError;
use crate::bootstrap::BackgroundTask;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Default resync cadence for every resource loop.
pub const DEFAULT_RESYNC_PERIOD: Duration = Duration::from_secs(600);

/// SyncError represents a failed list against the backing store.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SyncError(pub String);

/// Result of listing a resource snapshot from the backing store.
pub type ListResult<T> = Result<HashMap<String, T>, SyncError>;

/// ResourceClient lists whole snapshots of one resource from the backing
/// store. Implemented by the host's storage layer; this crate only owns the
/// loop around it.
#[async_trait]
pub trait ResourceClient<T>: Send + Sync {
    async fn list(&self) -> ListResult<T>;
}

/// SyncLoop keeps one resource cache refreshed.
pub struct SyncLoop<T> {
    kind: ResourceKind,
    client: Arc<dyn ResourceClient<T>>,
    cache: Arc<ResourceCache<T>>,
    resync: Duration,
}

impl<T> SyncLoop<T> {
    /// Create a loop for the given resource with the default cadence.
    pub fn new(
        kind: ResourceKind,
        client: Arc<dyn ResourceClient<T>>,
        cache: Arc<ResourceCache<T>>,
    ) -> Self {
        Self {
            kind,
            client,
            cache,
            resync: DEFAULT_RESYNC_PERIOD,
        }
    }

    /// Override the resync cadence.
    pub fn with_resync(mut self, resync: Duration) -> Self {
        self.resync = resync;
        self
    }

    /// The conventional task name for this loop.
    pub fn task_name(&self) -> String {
        format!("{}-sync", self.kind.name())
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> BackgroundTask for SyncLoop<T> {
    async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), TaskError> {
        loop {
            match self.client.list().await {
                Ok(items) => {
                    let entries = items.len();
                    self.cache.replace(items);
                    debug!(resource = %self.kind, entries, "resource sync complete");
                }
                Err(err) => {
                    // Recoverable: dependents keep the previous snapshot.
                    warn!(
                        resource = %self.kind,
                        error = %err,
                        "resource sync degraded"
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.resync) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initializer::cache::{NamespaceInfo, NamespacePhase};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ResourceClient<NamespaceInfo> for StaticClient {
        async fn list(&self) -> ListResult<NamespaceInfo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut items = HashMap::new();
            items.insert(
                "default".to_string(),
                NamespaceInfo {
                    phase: NamespacePhase::Active,
                    node_selector: None,
                },
            );
            Ok(items)
        }
    }

    struct BrokenClient;

    #[async_trait]
    impl ResourceClient<NamespaceInfo> for BrokenClient {
        async fn list(&self) -> ListResult<NamespaceInfo> {
            Err(SyncError("backing store unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_sync_loop_populates_cache() {
        let cache = Arc::new(ResourceCache::new());
        let client = Arc::new(StaticClient {
            calls: AtomicUsize::new(0),
        });
        let sync_loop = SyncLoop::new(ResourceKind::Namespace, client, Arc::clone(&cache));

        // Shutdown already fired: the loop does one list pass and returns.
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        sync_loop.run(rx).await.unwrap();

        assert!(cache.has_synced());
        assert_eq!(cache.names(), vec!["default"]);
    }

    #[tokio::test]
    async fn test_sync_loop_failed_initial_sync_is_not_fatal() {
        let cache: Arc<ResourceCache<NamespaceInfo>> = Arc::new(ResourceCache::new());
        let sync_loop = SyncLoop::new(
            ResourceKind::Namespace,
            Arc::new(BrokenClient),
            Arc::clone(&cache),
        );

        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        // The run itself succeeds; the cache simply stays unsynced.
        sync_loop.run(rx).await.unwrap();

        assert!(!cache.has_synced());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_sync_loop_resyncs_on_cadence() {
        let cache = Arc::new(ResourceCache::new());
        let client = Arc::new(StaticClient {
            calls: AtomicUsize::new(0),
        });
        let sync_loop = SyncLoop::new(
            ResourceKind::Namespace,
            Arc::clone(&client) as Arc<dyn ResourceClient<NamespaceInfo>>,
            Arc::clone(&cache),
        )
        .with_resync(Duration::from_millis(1));

        let (tx, rx) = watch::channel(false);
        let join = tokio::spawn(async move { sync_loop.run(rx).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        join.await.unwrap().unwrap();

        assert!(client.calls.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_task_name() {
        let cache: Arc<ResourceCache<NamespaceInfo>> = Arc::new(ResourceCache::new());
        let sync_loop = SyncLoop::new(ResourceKind::Namespace, Arc::new(BrokenClient), cache);
        assert_eq!(sync_loop.task_name(), "namespaces-sync");
    }
}

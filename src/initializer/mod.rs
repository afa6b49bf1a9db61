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

//! Dependency initialization for extensions.
//!
//! Builds the shared context resources extensions require, wires one sync
//! loop per resource into the bootstrap orchestrator, and injects the
//! resources into each extension before it processes its first request.
//! Initialization gates extension activation, never server startup: a slow
//! backend leaves a cache empty, not the server blocked.

pub mod cache;
pub mod sync;

use crate::admission::errors::ConfigResult;
use crate::admission::Extension;
use crate::bootstrap::BootstrapOrchestrator;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use cache::{
    InfrastructureInfo, NamespaceInfo, NamespacePhase, QuotaInfo, ResourceCache, ResourceKind,
    SecurityPolicyInfo, SharedResources, UserGroupInfo,
};
pub use sync::{ListResult, ResourceClient, SyncError, SyncLoop, DEFAULT_RESYNC_PERIOD};

/// ResourceClients bundles one backing-store client per shared resource.
pub struct ResourceClients {
    pub namespaces: Arc<dyn ResourceClient<NamespaceInfo>>,
    pub security_policies: Arc<dyn ResourceClient<SecurityPolicyInfo>>,
    pub quotas: Arc<dyn ResourceClient<QuotaInfo>>,
    pub user_groups: Arc<dyn ResourceClient<UserGroupInfo>>,
    pub infrastructure: Arc<dyn ResourceClient<InfrastructureInfo>>,
}

/// ClientBuilder constructs the per-resource clients from the host's
/// loopback configuration. Any single failure is fatal to startup.
pub trait ClientBuilder: Send + Sync {
    fn namespace_client(&self) -> ConfigResult<Arc<dyn ResourceClient<NamespaceInfo>>>;
    fn security_policy_client(&self) -> ConfigResult<Arc<dyn ResourceClient<SecurityPolicyInfo>>>;
    fn quota_client(&self) -> ConfigResult<Arc<dyn ResourceClient<QuotaInfo>>>;
    fn user_group_client(&self) -> ConfigResult<Arc<dyn ResourceClient<UserGroupInfo>>>;
    fn infrastructure_client(&self) -> ConfigResult<Arc<dyn ResourceClient<InfrastructureInfo>>>;
}

impl std::fmt::Debug for ResourceClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceClients").finish_non_exhaustive()
    }
}

impl ResourceClients {
    /// Build every client. Client construction failure aborts configuration
    /// build; it is the one fatal path in this module.
    pub fn build(builder: &dyn ClientBuilder) -> ConfigResult<Self> {
        Ok(Self {
            namespaces: builder.namespace_client()?,
            security_policies: builder.security_policy_client()?,
            quotas: builder.quota_client()?,
            user_groups: builder.user_group_client()?,
            infrastructure: builder.infrastructure_client()?,
        })
    }
}

/// DependencyInitializer owns the shared resources and their sync wiring.
pub struct DependencyInitializer {
    resources: SharedResources,
    clients: ResourceClients,
    resync: Duration,
}

impl DependencyInitializer {
    /// Create an initializer around freshly built clients.
    pub fn new(clients: ResourceClients) -> Self {
        Self {
            resources: SharedResources::new(),
            clients,
            resync: DEFAULT_RESYNC_PERIOD,
        }
    }

    /// Override the resync cadence applied to every sync loop.
    pub fn with_resync_period(mut self, resync: Duration) -> Self {
        self.resync = resync;
        self
    }

    /// The shared resources handed to extensions.
    pub fn resources(&self) -> &SharedResources {
        &self.resources
    }

    /// Register one sync loop per resource with the orchestrator. The loops
    /// run concurrently with the main startup path; nothing here waits for
    /// an initial sync.
    pub fn register_sync_tasks(&self, orchestrator: &mut BootstrapOrchestrator) -> ConfigResult<()> {
        let loops: [(String, Arc<dyn crate::bootstrap::BackgroundTask>); 5] = [
            named(
                SyncLoop::new(
                    ResourceKind::Namespace,
                    Arc::clone(&self.clients.namespaces),
                    Arc::clone(&self.resources.namespaces),
                )
                .with_resync(self.resync),
            ),
            named(
                SyncLoop::new(
                    ResourceKind::SecurityPolicy,
                    Arc::clone(&self.clients.security_policies),
                    Arc::clone(&self.resources.security_policies),
                )
                .with_resync(self.resync),
            ),
            named(
                SyncLoop::new(
                    ResourceKind::Quota,
                    Arc::clone(&self.clients.quotas),
                    Arc::clone(&self.resources.quotas),
                )
                .with_resync(self.resync),
            ),
            named(
                SyncLoop::new(
                    ResourceKind::UserGroup,
                    Arc::clone(&self.clients.user_groups),
                    Arc::clone(&self.resources.user_groups),
                )
                .with_resync(self.resync),
            ),
            named(
                SyncLoop::new(
                    ResourceKind::ClusterInfrastructure,
                    Arc::clone(&self.clients.infrastructure),
                    Arc::clone(&self.resources.infrastructure),
                )
                .with_resync(self.resync),
            ),
        ];

        for (name, task) in loops {
            orchestrator.register(&name, task)?;
        }
        Ok(())
    }

    /// Inject the shared resources into each extension, in chain order. An
    /// extension whose required resources have not finished their initial
    /// sync starts with partial data and converges as the sync completes.
    pub fn initialize_extensions(&self, extensions: &[Arc<dyn Extension>]) {
        for extension in extensions {
            for kind in extension.required_resources() {
                if !self.resources.has_synced(*kind) {
                    warn!(
                        extension = extension.name(),
                        resource = %kind,
                        "initial sync incomplete; extension starts with partial data"
                    );
                }
            }
            extension.initialize(&self.resources);
            info!(extension = extension.name(), "extension initialized");
        }
    }
}

fn named<T: Clone + Send + Sync + 'static>(
    sync_loop: SyncLoop<T>,
) -> (String, Arc<dyn crate::bootstrap::BackgroundTask>) {
    (sync_loop.task_name(), Arc::new(sync_loop))
}

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

//! End-to-end flow: registry and chain composition at config-build time,
//! dependency initialization, then bootstrap, readiness, usage flush, and
//! shutdown.

use apiserver_enablement::admission::{ConfigResult, InsertionGroup};
use apiserver_enablement::bootstrap::usage::{SinkError, UsageKey, UsageRecord, UsageSink};
use apiserver_enablement::initializer::{
    ClientBuilder, DependencyInitializer, InfrastructureInfo, ListResult, NamespaceInfo,
    NamespacePhase, QuotaInfo, ResourceClient, ResourceClients, ResourceKind, SecurityPolicyInfo,
    SharedResources, UserGroupInfo,
};
use apiserver_enablement::{
    BootstrapOrchestrator, Capability, Extension, ExtensionEnablement, Handler, Operation,
    ReachabilityGate, ReachabilityProbe, Registry, TaskState, UsageAggregator, UsageFlusher,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const GRACE: Duration = Duration::from_secs(5);

/// Route task lifecycle logs through the test harness, filtered by
/// `RUST_LOG`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct NamespaceBoundExtension {
    handler: Handler,
    initialized: AtomicBool,
}

impl NamespaceBoundExtension {
    fn new() -> Self {
        Self {
            handler: Handler::new_create_update(),
            initialized: AtomicBool::new(false),
        }
    }
}

impl Extension for NamespaceBoundExtension {
    fn name(&self) -> &str {
        "quota.k8s.io/ClusterResourceQuota"
    }

    fn capabilities(&self) -> &[Capability] {
        &[Capability::InitializesState]
    }

    fn handles(&self, operation: Operation) -> bool {
        self.handler.handles(operation)
    }

    fn required_resources(&self) -> &[ResourceKind] {
        &[ResourceKind::Namespace, ResourceKind::Quota]
    }

    fn initialize(&self, resources: &SharedResources) {
        let _ = resources.namespaces.get("default");
        self.initialized.store(true, Ordering::SeqCst);
    }

    fn is_ready(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

fn quota_extension_factory(
    _config: Option<&mut dyn Read>,
) -> ConfigResult<Arc<dyn Extension>> {
    Ok(Arc::new(NamespaceBoundExtension::new()))
}

struct StaticClient;

#[async_trait]
impl ResourceClient<NamespaceInfo> for StaticClient {
    async fn list(&self) -> ListResult<NamespaceInfo> {
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

struct EmptyClient;

#[async_trait]
impl<T: Clone + Send + Sync + 'static> ResourceClient<T> for EmptyClient {
    async fn list(&self) -> ListResult<T> {
        Ok(HashMap::new())
    }
}

struct StaticClientBuilder;

impl ClientBuilder for StaticClientBuilder {
    fn namespace_client(&self) -> ConfigResult<Arc<dyn ResourceClient<NamespaceInfo>>> {
        Ok(Arc::new(StaticClient))
    }

    fn security_policy_client(
        &self,
    ) -> ConfigResult<Arc<dyn ResourceClient<SecurityPolicyInfo>>> {
        Ok(Arc::new(EmptyClient))
    }

    fn quota_client(&self) -> ConfigResult<Arc<dyn ResourceClient<QuotaInfo>>> {
        Ok(Arc::new(EmptyClient))
    }

    fn user_group_client(&self) -> ConfigResult<Arc<dyn ResourceClient<UserGroupInfo>>> {
        Ok(Arc::new(EmptyClient))
    }

    fn infrastructure_client(
        &self,
    ) -> ConfigResult<Arc<dyn ResourceClient<InfrastructureInfo>>> {
        Ok(Arc::new(EmptyClient))
    }
}

struct CountingProbe {
    calls: AtomicUsize,
}

#[async_trait]
impl ReachabilityProbe for CountingProbe {
    async fn check(&self) -> bool {
        // Unreachable once, then answers.
        self.calls.fetch_add(1, Ordering::SeqCst) >= 1
    }
}

#[derive(Default)]
struct RecordingSink {
    batches: Mutex<Vec<Vec<UsageRecord>>>,
}

#[async_trait]
impl UsageSink for RecordingSink {
    async fn upsert(&self, records: &[UsageRecord]) -> Result<(), SinkError> {
        self.batches.lock().unwrap().push(records.to_vec());
        Ok(())
    }
}

#[tokio::test]
async fn test_full_bootstrap_flow() {
    init_tracing();

    // Configuration build: compose the chain and resolve enablement.
    let registry = Registry::new();
    registry
        .register("quota.k8s.io/ClusterResourceQuota", quota_extension_factory)
        .unwrap();

    let mut enablement = ExtensionEnablement::new(registry);
    enablement
        .set_base_chain(&[
            "NamespaceLifecycle",
            "MutatingAdmissionWebhook",
            "ResourceQuota",
        ])
        .add_insertion_group(InsertionGroup::after(
            "ResourceQuota",
            &["quota.k8s.io/ClusterResourceQuota"],
        ))
        .set_base_default_off(&["quota.k8s.io/ClusterResourceQuota", "AlwaysPullImages"])
        .force_on(&["quota.k8s.io/ClusterResourceQuota"])
        .skip_at_run_level_one(&["quota.k8s.io/ClusterResourceQuota"]);

    let config = enablement.build().unwrap();
    assert_eq!(
        config.ordered_chain().last().map(String::as_str),
        Some("quota.k8s.io/ClusterResourceQuota")
    );
    assert!(!config
        .default_off()
        .contains("quota.k8s.io/ClusterResourceQuota"));

    // Instantiate only the distribution extension; the upstream names are
    // not registered here and stay with the host.
    let extension = enablement
        .registry()
        .new_from_registry("quota.k8s.io/ClusterResourceQuota", None)
        .unwrap();
    assert!(!extension.is_ready());

    // Dependency initialization.
    let initializer = DependencyInitializer::new(
        ResourceClients::build(&StaticClientBuilder).unwrap(),
    );

    let mut orchestrator = BootstrapOrchestrator::new();
    initializer.register_sync_tasks(&mut orchestrator).unwrap();

    // Reachability gate and usage flusher as orchestrated tasks.
    let gate = ReachabilityGate::new(
        "secondary-apiserver",
        Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
        }),
    )
    .with_interval(Duration::from_millis(1));
    let status = gate.status();
    orchestrator
        .register(&gate.task_name(), Arc::new(gate))
        .unwrap();

    let aggregator = Arc::new(UsageAggregator::new("node-a"));
    let sink = Arc::new(RecordingSink::default());
    let flusher = UsageFlusher::new(Arc::clone(&aggregator), sink.clone())
        .with_interval(Duration::from_millis(5));
    orchestrator
        .register("deprecated-api-usage-flush", Arc::new(flusher))
        .unwrap();

    // Go signal: everything starts without blocking the main path. The
    // long-lived tasks all reach Running; the gate may already have latched
    // and stopped.
    let mut handles = orchestrator.start().unwrap();
    for handle in &mut handles {
        if handle.name().ends_with("-reachable") {
            continue;
        }
        assert!(handle.await_state(TaskState::Running, GRACE).await);
    }

    // The gate latches after its first failed probe.
    let gate_handle = handles
        .iter_mut()
        .find(|h| h.name() == "secondary-apiserver-reachable")
        .unwrap();
    assert!(gate_handle.await_state(TaskState::Stopped, GRACE).await);
    assert!(status.reachable());

    // Request paths feed the aggregator while tasks run.
    let key = UsageKey::new("ingresses.v1beta1.extensions", "baker", "list");
    aggregator.record(key.clone());

    // Extension activation is gated on initialization, not on startup.
    let extensions: Vec<Arc<dyn Extension>> = vec![extension.clone()];
    initializer.initialize_extensions(&extensions);
    assert!(extension.is_ready());

    // Shutdown: every task leaves Running within the grace period.
    tokio::time::sleep(Duration::from_millis(50)).await;
    orchestrator.shutdown();
    for handle in &mut handles {
        assert!(
            handle.await_state(TaskState::Stopped, GRACE).await,
            "task {} still running after shutdown",
            handle.name()
        );
    }

    // The flusher delivered the recorded key at least once, exactly once in
    // aggregate for the single increment.
    let batches = sink.batches.lock().unwrap();
    let delivered: u64 = batches
        .iter()
        .flatten()
        .filter(|r| r.key == key)
        .map(|r| r.delta)
        .sum();
    assert_eq!(delivered, 1);
    assert_eq!(aggregator.total(&key), 1);
}

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

//! Shared resource caches handed to extensions.
//!
//! Each cache is refreshed from the backing store by its own sync loop and
//! exposes a synced latch that flips after the first successful list.
//! Dependents must tolerate an initially-empty cache and converge as the
//! sync completes.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// ResourceKind names a shared context resource an extension may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Namespaces and their lifecycle phase.
    Namespace,
    /// Security policy constraints.
    SecurityPolicy,
    /// Cluster-scoped quota definitions.
    Quota,
    /// User group membership.
    UserGroup,
    /// Cluster infrastructure topology.
    ClusterInfrastructure,
}

impl ResourceKind {
    /// All resource kinds, in a fixed order.
    pub const ALL: &'static [ResourceKind] = &[
        ResourceKind::Namespace,
        ResourceKind::SecurityPolicy,
        ResourceKind::Quota,
        ResourceKind::UserGroup,
        ResourceKind::ClusterInfrastructure,
    ];

    /// Stable lowercase name, used in task names and log fields.
    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::Namespace => "namespaces",
            ResourceKind::SecurityPolicy => "securitypolicies",
            ResourceKind::Quota => "quotas",
            ResourceKind::UserGroup => "usergroups",
            ResourceKind::ClusterInfrastructure => "infrastructures",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// NamespacePhase represents the lifecycle phase of a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespacePhase {
    Active,
    Terminating,
}

/// Cached namespace state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
    pub phase: NamespacePhase,
    pub node_selector: Option<String>,
}

/// Cached security policy constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicyInfo {
    pub priority: i32,
    pub allow_privileged: bool,
}

/// Cached cluster quota definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaInfo {
    pub hard_limits: HashMap<String, i64>,
}

/// Cached user group membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserGroupInfo {
    pub users: Vec<String>,
}

/// Cached cluster infrastructure topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfrastructureInfo {
    pub platform: String,
    pub control_plane_topology: String,
}

/// ResourceCache is a read-mostly snapshot cache keyed by object name.
///
/// One sync loop writes whole snapshots; many extension readers take
/// individual entries. The synced latch flips after the first successful
/// replace and never flips back.
#[derive(Debug)]
pub struct ResourceCache<T> {
    entries: RwLock<HashMap<String, T>>,
    synced: AtomicBool,
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            synced: AtomicBool::new(false),
        }
    }
}

impl<T: Clone> ResourceCache<T> {
    /// Create a new empty, unsynced cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of the named entry.
    pub fn get(&self, name: &str) -> Option<T> {
        self.entries
            .read()
            .expect("resource cache lock poisoned")
            .get(name)
            .cloned()
    }

    /// All entry names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .expect("resource cache lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .expect("resource cache lock poisoned")
            .len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true once the initial sync has completed.
    pub fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Replace the cache contents with a fresh snapshot and mark it synced.
    pub(crate) fn replace(&self, items: HashMap<String, T>) {
        *self
            .entries
            .write()
            .expect("resource cache lock poisoned") = items;
        self.synced.store(true, Ordering::Release);
    }
}

/// SharedResources bundles every context cache handed to extensions.
///
/// Caches are behind `Arc` so sync loops and extensions share the same
/// instance for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct SharedResources {
    pub namespaces: Arc<ResourceCache<NamespaceInfo>>,
    pub security_policies: Arc<ResourceCache<SecurityPolicyInfo>>,
    pub quotas: Arc<ResourceCache<QuotaInfo>>,
    pub user_groups: Arc<ResourceCache<UserGroupInfo>>,
    pub infrastructure: Arc<ResourceCache<InfrastructureInfo>>,
}

impl SharedResources {
    /// Create a fresh set of empty, unsynced caches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the named resource has completed its initial sync.
    pub fn has_synced(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::Namespace => self.namespaces.has_synced(),
            ResourceKind::SecurityPolicy => self.security_policies.has_synced(),
            ResourceKind::Quota => self.quotas.has_synced(),
            ResourceKind::UserGroup => self.user_groups.has_synced(),
            ResourceKind::ClusterInfrastructure => self.infrastructure.has_synced(),
        }
    }
}

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

//! Extension composition and bootstrap orchestration for a Kubernetes-style
//! API server, reimplemented in Rust.
//!
//! This crate provides the layer a distribution uses to graft its own
//! behavior onto a host API server:
//! - an extension registry, chain composer, and enablement resolver used
//!   once at configuration-build time
//! - a dependency initializer that syncs shared resource caches and injects
//!   them into extensions
//! - a bootstrap orchestrator that starts background tasks (sync loops,
//!   reachability gates, the usage flusher) on a single go signal and tears
//!   them down on a shared shutdown signal

pub mod admission;
pub mod bootstrap;
pub mod initializer;

// Re-export commonly used types
pub use admission::{
    compose, resolve, Anchor, Attributes, AttributesRecord, Capability, ConfigResult,
    ConfigurationError, Extension, ExtensionConfig, ExtensionEnablement, Handler, InsertionGroup,
    Operation, Registry, TaskError,
};
pub use bootstrap::{
    BackgroundTask, BootstrapOrchestrator, ReachabilityGate, ReachabilityProbe,
    ReachabilityStatus, TaskHandle, TaskState, UsageAggregator, UsageFlusher,
};
pub use initializer::{DependencyInitializer, ResourceKind, SharedResources};

/// Semantic version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

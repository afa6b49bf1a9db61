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

//! Enablement resolution and the configuration-build object.
//!
//! The host framework hands in its base default-off set; the distribution
//! overlay forces some of those extensions on. The effective default-off set
//! is what the host consults unless a user explicitly overrides activation
//! via external configuration.

use super::chain::{compose, InsertionGroup};
use super::errors::ConfigResult;
use super::interfaces::Extension;
use super::registry::Registry;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

/// Compute the effective default-off set.
///
/// Starts from `base_off` and removes every name in `force_on`; those
/// extensions become enabled regardless of the upstream default. `force_off`
/// is reserved for forward compatibility and is currently a no-op
/// pass-through; populating it logs a warning and nothing else.
///
/// Idempotent: resolving the output with empty overlays returns the output.
pub fn resolve(
    base_off: &BTreeSet<String>,
    force_on: &BTreeSet<String>,
    force_off: &BTreeSet<String>,
) -> BTreeSet<String> {
    if !force_off.is_empty() {
        warn!(
            count = force_off.len(),
            "force-off overlay is reserved and currently ignored"
        );
    }
    base_off.difference(force_on).cloned().collect()
}

/// ExtensionConfig is the immutable output of configuration build: the final
/// ordered chain, the effective default-off set, and the run-level skip sets
/// the host consults before activating certain extensions early.
#[derive(Debug, Clone)]
pub struct ExtensionConfig {
    ordered_chain: Vec<String>,
    default_off: BTreeSet<String>,
    skip_run_level_zero: BTreeSet<String>,
    skip_run_level_one: BTreeSet<String>,
}

impl ExtensionConfig {
    /// The final ordered chain of extension names.
    pub fn ordered_chain(&self) -> &[String] {
        &self.ordered_chain
    }

    /// The effective default-off set.
    pub fn default_off(&self) -> &BTreeSet<String> {
        &self.default_off
    }

    /// Extensions that cannot be applied until the host server itself starts.
    pub fn skip_run_level_zero(&self) -> &BTreeSet<String> {
        &self.skip_run_level_zero
    }

    /// Extensions that cannot be applied until the secondary API server starts.
    pub fn skip_run_level_one(&self) -> &BTreeSet<String> {
        &self.skip_run_level_one
    }

    /// The ordered chain filtered down to extensions enabled by default.
    pub fn enabled_chain(&self) -> Vec<String> {
        self.ordered_chain
            .iter()
            .filter(|name| !self.default_off.contains(*name))
            .cloned()
            .collect()
    }
}

/// ExtensionEnablement owns the registry, the base chain, the insertion
/// groups, and the overlay sets, and produces an [`ExtensionConfig`] once at
/// configuration-build time.
///
/// This is deliberately explicit state with a single construction and
/// handoff, not a package-level mutable global.
pub struct ExtensionEnablement {
    registry: Registry,
    base_chain: Vec<String>,
    insertion_groups: Vec<InsertionGroup>,
    base_default_off: BTreeSet<String>,
    force_on: BTreeSet<String>,
    force_off: BTreeSet<String>,
    skip_run_level_zero: BTreeSet<String>,
    skip_run_level_one: BTreeSet<String>,
}

impl ExtensionEnablement {
    /// Create a new enablement builder owning the given registry.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            base_chain: Vec::new(),
            insertion_groups: Vec::new(),
            base_default_off: BTreeSet::new(),
            force_on: BTreeSet::new(),
            force_off: BTreeSet::new(),
            skip_run_level_zero: BTreeSet::new(),
            skip_run_level_one: BTreeSet::new(),
        }
    }

    /// Access the owned registry, e.g. to register distribution extensions.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Set the host's base ordered chain.
    pub fn set_base_chain(&mut self, chain: &[&str]) -> &mut Self {
        self.base_chain = chain.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Append an insertion group. Groups sharing an anchor compose in the
    /// order they are added, first added closest to the anchor.
    pub fn add_insertion_group(&mut self, group: InsertionGroup) -> &mut Self {
        self.insertion_groups.push(group);
        self
    }

    /// Set the host's base default-off set.
    pub fn set_base_default_off(&mut self, names: &[&str]) -> &mut Self {
        self.base_default_off = names.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Force the named extensions on regardless of the upstream default.
    pub fn force_on(&mut self, names: &[&str]) -> &mut Self {
        self.force_on.extend(names.iter().map(|s| s.to_string()));
        self
    }

    /// Reserved: force the named extensions off. Currently a no-op overlay.
    pub fn force_off(&mut self, names: &[&str]) -> &mut Self {
        self.force_off.extend(names.iter().map(|s| s.to_string()));
        self
    }

    /// Mark extensions that must not be applied before the host server starts.
    pub fn skip_at_run_level_zero(&mut self, names: &[&str]) -> &mut Self {
        self.skip_run_level_zero
            .extend(names.iter().map(|s| s.to_string()));
        self
    }

    /// Mark extensions that must not be applied before the secondary API
    /// server starts.
    pub fn skip_at_run_level_one(&mut self, names: &[&str]) -> &mut Self {
        self.skip_run_level_one
            .extend(names.iter().map(|s| s.to_string()));
        self
    }

    /// Build the final extension configuration. Fails on unresolved anchors
    /// or duplicate names in the composed chain.
    pub fn build(&self) -> ConfigResult<ExtensionConfig> {
        let ordered_chain = compose(&self.base_chain, &self.insertion_groups)?;
        let default_off = resolve(&self.base_default_off, &self.force_on, &self.force_off);
        Ok(ExtensionConfig {
            ordered_chain,
            default_off,
            skip_run_level_zero: self.skip_run_level_zero.clone(),
            skip_run_level_one: self.skip_run_level_one.clone(),
        })
    }

    /// Instantiate every default-enabled extension from the registry, in
    /// chain order. Chain entries missing from the registry fail the build.
    pub fn instantiate_enabled(
        &self,
        config: &ExtensionConfig,
    ) -> ConfigResult<Vec<Arc<dyn Extension>>> {
        config
            .enabled_chain()
            .iter()
            .map(|name| self.registry.new_from_registry(name, None))
            .collect()
    }
}

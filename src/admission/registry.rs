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

//! Extension registry.

use super::errors::{ConfigResult, ConfigurationError};
use super::interfaces::Extension;
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, RwLock};

/// Factory is a function that creates an extension instance from optional
/// configuration.
pub type Factory = fn(config: Option<&mut dyn Read>) -> ConfigResult<Arc<dyn Extension>>;

/// Registry is a mapping from extension name to extension factory.
///
/// It is append-only at startup: names are registered exactly once and never
/// removed. The registry is explicit state owned by the configuration-build
/// object rather than a process-wide global, so initialization order stays
/// deterministic and testable.
#[derive(Default)]
pub struct Registry {
    factories: RwLock<HashMap<String, Factory>>,
}

impl Registry {
    /// Create a new empty extension registry.
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new extension with the given name and factory.
    /// Registering a name twice is a build-time error.
    pub fn register(&self, name: &str, factory: Factory) -> ConfigResult<()> {
        let mut factories = self.factories.write().expect("registry lock poisoned");
        if factories.contains_key(name) {
            return Err(ConfigurationError::DuplicateRegistration(name.to_string()));
        }
        factories.insert(name.to_string(), factory);
        Ok(())
    }

    /// Get a factory for the given extension name.
    pub fn get_factory(&self, name: &str) -> Option<Factory> {
        let factories = self.factories.read().expect("registry lock poisoned");
        factories.get(name).copied()
    }

    /// Get all registered extension names, sorted for determinism.
    pub fn registered_names(&self) -> Vec<String> {
        let factories = self.factories.read().expect("registry lock poisoned");
        let mut names: Vec<String> = factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if an extension is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        let factories = self.factories.read().expect("registry lock poisoned");
        factories.contains_key(name)
    }

    /// Create a new instance of the named extension.
    pub fn new_from_registry(
        &self,
        name: &str,
        config: Option<&mut dyn Read>,
    ) -> ConfigResult<Arc<dyn Extension>> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| ConfigurationError::UnknownExtension(name.to_string()))?;
        factory(config)
    }
}

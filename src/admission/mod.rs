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

//! Extension interfaces, registry, chain composition, and enablement.
//!
//! This module provides the configuration-build half of the crate: the types
//! and pure functions used once, single-threaded, while the host server
//! assembles its extension pipeline.

pub mod attributes;
pub mod chain;
pub mod enablement;
pub mod errors;
mod handler;
mod interfaces;
mod registry;

pub use attributes::{Attributes, AttributesRecord, GroupVersionResource, UserInfo};
pub use chain::{compose, Anchor, InsertionGroup};
pub use enablement::{resolve, ExtensionConfig, ExtensionEnablement};
pub use errors::{ConfigResult, ConfigurationError, TaskError};
pub use handler::Handler;
pub use interfaces::{Capability, Extension, Operation};
pub use registry::{Factory, Registry};

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

//! Core extension interfaces and types.

use crate::initializer::{ResourceKind, SharedResources};
use std::fmt;

/// Operation is the type of resource operation being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create indicates a resource creation operation.
    Create,
    /// Update indicates a resource update operation.
    Update,
    /// Delete indicates a resource deletion operation.
    Delete,
    /// Connect indicates a resource connect operation (e.g., pod exec).
    Connect,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "CREATE"),
            Operation::Update => write!(f, "UPDATE"),
            Operation::Delete => write!(f, "DELETE"),
            Operation::Connect => write!(f, "CONNECT"),
        }
    }
}

impl Operation {
    /// Parse an operation from a string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CREATE" => Some(Operation::Create),
            "UPDATE" => Some(Operation::Update),
            "DELETE" => Some(Operation::Delete),
            "CONNECT" => Some(Operation::Connect),
            _ => None,
        }
    }

    /// The lowercase verb form used for usage counter keys.
    pub fn verb(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Connect => "connect",
        }
    }
}

/// Capability declares what kind of behavior an extension contributes to the
/// request-processing chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The extension seeds or mutates admission state before decisions are made.
    InitializesState,
    /// The extension observes request attributes without mutating anything.
    ObservesRequests,
}

/// Extension is the abstract, pluggable interface for units composed into the
/// host server's request-processing chain.
///
/// Extensions are constructed once at server-build time and live for the
/// process lifetime. An extension that needs shared resources declares them
/// via [`Extension::required_resources`] and receives them through
/// [`Extension::initialize`] before it is asked to process its first request.
pub trait Extension: Send + Sync {
    /// The unique name of this extension.
    fn name(&self) -> &str;

    /// The capability set this extension declares.
    fn capabilities(&self) -> &[Capability];

    /// Returns true if this extension handles the given operation.
    fn handles(&self, operation: Operation) -> bool;

    /// Named shared resources this extension must be handed before activation.
    fn required_resources(&self) -> &[ResourceKind] {
        &[]
    }

    /// Called exactly once with the shared resources before the extension
    /// serves its first request. Resource caches may still be empty at this
    /// point; extensions must tolerate partial data and converge as the
    /// caches sync.
    fn initialize(&self, _resources: &SharedResources) {}

    /// Returns true once the extension is ready to process requests.
    /// Extensions gated on initialization report false until initialized.
    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display() {
        assert_eq!(format!("{}", Operation::Create), "CREATE");
        assert_eq!(format!("{}", Operation::Update), "UPDATE");
        assert_eq!(format!("{}", Operation::Delete), "DELETE");
        assert_eq!(format!("{}", Operation::Connect), "CONNECT");
    }

    #[test]
    fn test_operation_from_str() {
        assert_eq!(Operation::from_str("CREATE"), Some(Operation::Create));
        assert_eq!(Operation::from_str("create"), Some(Operation::Create));
        assert_eq!(Operation::from_str("DELETE"), Some(Operation::Delete));
        assert_eq!(Operation::from_str("UNKNOWN"), None);
    }

    #[test]
    fn test_operation_verb() {
        assert_eq!(Operation::Create.verb(), "create");
        assert_eq!(Operation::Connect.verb(), "connect");
    }
}

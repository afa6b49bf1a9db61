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

//! Error types for extension configuration and bootstrap.

use thiserror::Error;

/// Result type for configuration-build operations.
pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// ConfigurationError represents errors raised while assembling the extension
/// chain and bootstrap state. Every variant is fatal at build time.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// An insertion group references an anchor that does not occur exactly
    /// once in the base chain.
    #[error("anchor \"{anchor}\" occurs {occurrences} time(s) in the base chain, expected exactly once")]
    AnchorNotFound { anchor: String, occurrences: usize },

    /// The composed chain would contain the same extension name twice.
    #[error("extension \"{0}\" appears more than once in the composed chain")]
    DuplicateExtension(String),

    /// An extension factory was registered under a name that is already taken.
    #[error("extension \"{0}\" is already registered")]
    DuplicateRegistration(String),

    /// A background task was registered under a name that is already taken.
    #[error("background task \"{0}\" is already registered")]
    DuplicateTask(String),

    /// The bootstrap orchestrator's go signal was fired more than once.
    #[error("bootstrap orchestrator already started")]
    AlreadyStarted,

    /// A chain entry names an extension missing from the registry.
    #[error("unknown extension: {0}")]
    UnknownExtension(String),

    /// A shared resource client could not be constructed.
    #[error("failed to construct client for \"{resource}\": {message}")]
    ClientConstruction { resource: String, message: String },
}

impl ConfigurationError {
    /// Create a ClientConstruction error for the named resource.
    pub fn client_construction(resource: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigurationError::ClientConstruction {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

/// TaskError represents a terminal failure of a background task. The task is
/// marked Failed and logged; the process continues and the task is never
/// retried by the orchestrator.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TaskError(pub String);

impl TaskError {
    /// Create a new TaskError with the given message.
    pub fn new(msg: impl Into<String>) -> Self {
        TaskError(msg.into())
    }
}

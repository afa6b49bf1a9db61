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

//! Chain composition.
//!
//! Merges the host's base ordered extension chain with named insertion groups
//! to produce one deterministic final ordering. This mirrors how a
//! distribution splices its own admission plugins into the upstream chain,
//! e.g. before the mutating webhook plugin and after the resource quota
//! plugin.

use super::errors::{ConfigResult, ConfigurationError};
use std::collections::HashSet;

/// Anchor is a named position in the base chain used as a splice point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// Splice immediately before the named base-chain entry.
    Before(String),
    /// Splice immediately after the named base-chain entry.
    After(String),
}

impl Anchor {
    /// The base-chain entry this anchor refers to.
    pub fn target(&self) -> &str {
        match self {
            Anchor::Before(name) | Anchor::After(name) => name,
        }
    }
}

/// InsertionGroup is an ordered sequence of extension names to splice at a
/// named anchor.
#[derive(Debug, Clone)]
pub struct InsertionGroup {
    pub anchor: Anchor,
    pub extensions: Vec<String>,
}

impl InsertionGroup {
    /// Create a group spliced immediately before the given anchor.
    pub fn before(anchor: &str, extensions: &[&str]) -> Self {
        Self {
            anchor: Anchor::Before(anchor.to_string()),
            extensions: extensions.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Create a group spliced immediately after the given anchor.
    pub fn after(anchor: &str, extensions: &[&str]) -> Self {
        Self {
            anchor: Anchor::After(anchor.to_string()),
            extensions: extensions.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Compose the base ordered chain with the supplied insertion groups.
///
/// The relative order of the base chain is preserved except where a group
/// interposes at its anchor. Each group keeps its internal ordering. When two
/// groups share an anchor, the first-supplied group ends up closest to the
/// anchor. The output contains every base name plus every inserted name
/// exactly once.
///
/// Pure and deterministic: identical inputs always yield an identical
/// ordering, so server restarts produce an identical pipeline.
pub fn compose<S: AsRef<str>>(base: &[S], groups: &[InsertionGroup]) -> ConfigResult<Vec<String>> {
    // Every anchor must occur in the base chain exactly once.
    for group in groups {
        let target = group.anchor.target();
        let occurrences = base.iter().filter(|name| name.as_ref() == target).count();
        if occurrences != 1 {
            return Err(ConfigurationError::AnchorNotFound {
                anchor: target.to_string(),
                occurrences,
            });
        }
    }

    let inserted: usize = groups.iter().map(|g| g.extensions.len()).sum();
    let mut chain: Vec<String> = Vec::with_capacity(base.len() + inserted);

    for name in base {
        let name = name.as_ref();

        // First-supplied group closest to the anchor: later groups are
        // prepended in front of earlier ones.
        let mut before: Vec<&str> = Vec::new();
        for group in groups {
            if let Anchor::Before(target) = &group.anchor {
                if target == name {
                    before.splice(0..0, group.extensions.iter().map(String::as_str));
                }
            }
        }
        chain.extend(before.into_iter().map(String::from));

        chain.push(name.to_string());

        for group in groups {
            if let Anchor::After(target) = &group.anchor {
                if target == name {
                    chain.extend(group.extensions.iter().cloned());
                }
            }
        }
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(chain.len());
    for name in &chain {
        if !seen.insert(name.as_str()) {
            return Err(ConfigurationError::DuplicateExtension(name.clone()));
        }
    }

    Ok(chain)
}

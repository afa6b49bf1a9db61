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

//! Request attributes observed by extensions and the usage aggregator.

use super::interfaces::Operation;

/// GroupVersionResource identifies a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    pub fn new(group: &str, version: &str, resource: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_string(),
        }
    }

    /// Canonical string form, `resource.version.group` (group omitted for the
    /// core group), matching the identity used by the usage counter store.
    pub fn canonical(&self) -> String {
        if self.group.is_empty() {
            format!("{}.{}", self.resource, self.version)
        } else {
            format!("{}.{}.{}", self.resource, self.version, self.group)
        }
    }
}

/// UserInfo identifies the caller of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UserInfo {
    pub username: String,
    pub groups: Vec<String>,
}

impl UserInfo {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            groups: Vec::new(),
        }
    }
}

/// Attributes is an interface used by extensions to get information about a
/// request without owning any of its processing.
pub trait Attributes {
    /// Returns the name of the object as presented in the request.
    fn get_name(&self) -> &str;

    /// Returns the namespace associated with the request (if any).
    fn get_namespace(&self) -> &str;

    /// Returns the resource being requested.
    fn get_resource(&self) -> &GroupVersionResource;

    /// Returns the name of the subresource being requested.
    fn get_subresource(&self) -> &str;

    /// Returns the operation being performed.
    fn get_operation(&self) -> Operation;

    /// Returns the identity of the caller.
    fn get_user(&self) -> &UserInfo;

    /// Check if this request is a dry run.
    fn is_dry_run(&self) -> bool;
}

/// AttributesRecord is a concrete implementation of Attributes.
pub struct AttributesRecord {
    pub name: String,
    pub namespace: String,
    pub resource: GroupVersionResource,
    pub subresource: String,
    pub operation: Operation,
    pub user: UserInfo,
    pub dry_run: bool,
}

impl AttributesRecord {
    /// Create a new AttributesRecord.
    pub fn new(
        name: &str,
        namespace: &str,
        resource: GroupVersionResource,
        operation: Operation,
        user: UserInfo,
    ) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            resource,
            subresource: String::new(),
            operation,
            user,
            dry_run: false,
        }
    }
}

impl Attributes for AttributesRecord {
    fn get_name(&self) -> &str {
        &self.name
    }

    fn get_namespace(&self) -> &str {
        &self.namespace
    }

    fn get_resource(&self) -> &GroupVersionResource {
        &self.resource
    }

    fn get_subresource(&self) -> &str {
        &self.subresource
    }

    fn get_operation(&self) -> Operation {
        self.operation
    }

    fn get_user(&self) -> &UserInfo {
        &self.user
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_record() {
        let attrs = AttributesRecord::new(
            "test-pod",
            "default",
            GroupVersionResource::new("", "v1", "pods"),
            Operation::Create,
            UserInfo::new("system:admin"),
        );
        assert_eq!(attrs.get_name(), "test-pod");
        assert_eq!(attrs.get_namespace(), "default");
        assert_eq!(attrs.get_resource().resource, "pods");
        assert_eq!(attrs.get_operation(), Operation::Create);
        assert_eq!(attrs.get_user().username, "system:admin");
        assert!(!attrs.is_dry_run());
    }

    #[test]
    fn test_canonical_resource() {
        let core = GroupVersionResource::new("", "v1", "pods");
        assert_eq!(core.canonical(), "pods.v1");

        let grouped = GroupVersionResource::new("apps", "v1", "deployments");
        assert_eq!(grouped.canonical(), "deployments.v1.apps");
    }
}

use serde::{Deserialize, Serialize};

use crate::{ConditionSet, ResourceIdentity};

/// Desired state declared by the user: the REST endpoint to invoke.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct O2imsSpec {
    #[serde(default)]
    pub url: String,
}

impl O2imsSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Store-neutral view of one O2ims object.
///
/// The controller only ever writes `conditions`; everything else is owned
/// by whoever manages the backing store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct O2imsObject {
    pub identity: ResourceIdentity,
    pub spec: O2imsSpec,
    #[serde(default)]
    pub conditions: ConditionSet,
    #[serde(default)]
    pub deletion_requested: bool,
    /// Opaque version for optimistic concurrency on status writes.
    #[serde(default)]
    pub resource_version: String,
    #[serde(default)]
    pub generation: i64,
}

impl O2imsObject {
    pub fn new(identity: ResourceIdentity, spec: O2imsSpec) -> Self {
        Self {
            identity,
            spec,
            conditions: ConditionSet::new(),
            deletion_requested: false,
            resource_version: String::new(),
            generation: 1,
        }
    }
}

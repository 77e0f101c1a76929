use kube::{CustomResource, Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    Condition, ConditionSet, DEFAULT_NAMESPACE, O2imsObject, O2imsSpec,
    ResourceIdentity,
};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "ovran.example.com",
    version = "v1alpha1",
    kind = "O2ims",
    plural = "o2ims",
    namespaced,
    status = "O2imsStatus",
    printcolumn = r#"{"name":"Url","type":"string","jsonPath":".spec.url"}"#
)]
pub struct O2imsResourceSpec {
    /// REST endpoint to call on every reconciliation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct O2imsStatus {
    /// Status conditions of the O2ims instance (Available/Degraded)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl O2ims {
    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::new(
            self.namespace()
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            self.name_any(),
        )
    }

    pub fn to_object(&self) -> O2imsObject {
        let conditions = self
            .status
            .as_ref()
            .map(|s| ConditionSet::from(s.conditions.clone()))
            .unwrap_or_default();
        O2imsObject {
            identity: self.identity(),
            spec: O2imsSpec::new(self.spec.url.clone()),
            conditions,
            deletion_requested: self.meta().deletion_timestamp.is_some(),
            resource_version: self.resource_version().unwrap_or_default(),
            generation: self.meta().generation.unwrap_or_default(),
        }
    }
}

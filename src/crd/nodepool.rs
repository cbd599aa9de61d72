//! # NodePool
//!
//! Partial view of the OpenYurt `NodePool` resource. The controller never writes
//! node pools; the admission webhook only lists their names.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    kind = "NodePool",
    group = "apps.openyurt.io",
    version = "v1alpha1",
    shortname = "np"
)]
#[serde(rename_all = "camelCase")]
pub struct NodePoolSpec {
    /// Edge or Cloud
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub pool_type: Option<String>,
}

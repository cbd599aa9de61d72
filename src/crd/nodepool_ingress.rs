//! # NodePoolIngress
//!
//! Namespaced singleton declaring the pools that receive an ingress controller.
//! Created at startup by the bootstrap task when missing.

use super::{replicas_or_default, DesiredState, IngressFleet, ObservedState};
use kube::api::ObjectMeta;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// NodePoolIngress Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: apps.openyurt.io/v1alpha1
/// kind: NodePoolIngress
/// metadata:
///   name: nodepool-ingress
///   namespace: kube-system
/// spec:
///   ingress_controller_replicas_per_pool: 1
///   pools:
///     - hangzhou
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    kind = "NodePoolIngress",
    group = "apps.openyurt.io",
    version = "v1alpha1",
    namespaced,
    shortname = "npi",
    status = "NodePoolIngressStatus",
    printcolumn = r#"{"name":"Replicas-Per-Pool", "type":"integer", "jsonPath":".status.ingress_controller_replicas_per_pool"}"#,
    printcolumn = r#"{"name":"ReadyPoolNum", "type":"integer", "jsonPath":".status.readyPoolNum"}"#
)]
pub struct NodePoolIngressSpec {
    #[serde(
        rename = "ingress_controller_replicas_per_pool",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pools: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct NodePoolIngressStatus {
    #[serde(
        rename = "ingress_controller_replicas_per_pool",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pools: Option<Vec<String>>,
    #[serde(
        rename = "nginx_ingress_controller_version",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
    #[serde(rename = "readyPoolNum", default)]
    pub ready_pool_num: i32,
    #[serde(rename = "unreadyPoolNum", default)]
    pub unready_pool_num: i32,
}

impl IngressFleet for NodePoolIngress {
    const KIND: &'static str = "NodePoolIngress";

    fn desired(&self) -> DesiredState {
        DesiredState {
            replicas_per_pool: replicas_or_default(self.spec.replicas),
            pools: self.spec.pools.clone().unwrap_or_default(),
        }
    }

    fn observed(&self) -> ObservedState {
        let status = self.status.clone().unwrap_or_default();
        ObservedState {
            replicas_per_pool: status.replicas.unwrap_or(0),
            pools: status.pools.unwrap_or_default(),
            controller_version: status.version.unwrap_or_default(),
            ready_count: status.ready_pool_num,
            not_ready_count: status.unready_pool_num,
        }
    }

    fn status_patch(observed: &ObservedState) -> serde_json::Value {
        serde_json::json!({
            "status": {
                "ingress_controller_replicas_per_pool":
                    (observed.replicas_per_pool != 0).then_some(observed.replicas_per_pool),
                "pools": observed.pools,
                "nginx_ingress_controller_version": observed.controller_version,
                "readyPoolNum": observed.ready_count,
                "unreadyPoolNum": observed.not_ready_count,
            }
        })
    }

    fn singleton(name: &str, namespace: Option<&str>, replicas_per_pool: i32) -> Self {
        NodePoolIngress {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: namespace.map(str::to_string),
                ..ObjectMeta::default()
            },
            spec: NodePoolIngressSpec {
                replicas: Some(replicas_per_pool),
                pools: None,
            },
            status: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_pool_counters() {
        let status: NodePoolIngressStatus = serde_json::from_value(serde_json::json!({
            "pools": ["a"],
            "readyPoolNum": 1,
            "unreadyPoolNum": 2
        }))
        .unwrap();
        assert_eq!(status.ready_pool_num, 1);
        assert_eq!(status.unready_pool_num, 2);
        assert_eq!(status.replicas, None);
    }

    #[test]
    fn test_singleton_is_namespaced() {
        let npi = NodePoolIngress::singleton("nodepool-ingress", Some("kube-system"), 1);
        assert_eq!(npi.metadata.namespace.as_deref(), Some("kube-system"));
        assert_eq!(npi.spec.replicas, Some(1));
        assert_eq!(npi.spec.pools, None);
    }

    #[test]
    fn test_observed_reads_status() {
        let mut npi = NodePoolIngress::singleton("nodepool-ingress", Some("kube-system"), 1);
        npi.status = Some(NodePoolIngressStatus {
            replicas: Some(3),
            pools: Some(vec!["p1".to_string()]),
            version: Some("0.48.1".to_string()),
            ready_pool_num: 1,
            unready_pool_num: 0,
        });
        let observed = npi.observed();
        assert_eq!(observed.replicas_per_pool, 3);
        assert_eq!(observed.pools, vec!["p1".to_string()]);
        assert_eq!(observed.ready_count, 1);
    }
}

//! # YurtIngress
//!
//! Cluster-scoped singleton declaring the pools that receive an ingress controller.

use super::{replicas_or_default, DesiredState, IngressFleet, ObservedState};
use kube::api::ObjectMeta;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// YurtIngress Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: apps.openyurt.io/v1alpha1
/// kind: YurtIngress
/// metadata:
///   name: yurtingress-singleton
/// spec:
///   ingress_controller_replicas_per_pool: 2
///   pools:
///     - hangzhou
///     - beijing
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    kind = "YurtIngress",
    group = "apps.openyurt.io",
    version = "v1alpha1",
    shortname = "ying",
    status = "YurtIngressStatus",
    printcolumn = r#"{"name":"Replicas-Per-Pool", "type":"integer", "jsonPath":".status.ingress_controller_replicas_per_pool"}"#,
    printcolumn = r#"{"name":"ReadyNum", "type":"integer", "jsonPath":".status.readyNum"}"#,
    printcolumn = r#"{"name":"NotReadyNum", "type":"integer", "jsonPath":".status.unreadyNum"}"#
)]
pub struct YurtIngressSpec {
    /// Ingress controller replicas deployed into every pool (defaults to 1)
    #[serde(
        rename = "ingress_controller_replicas_per_pool",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub replicas: Option<i32>,
    /// Pools that should receive an ingress controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pools: Option<Vec<String>>,
}

/// Status of the YurtIngress resource
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct YurtIngressStatus {
    /// Replicas per pool last applied
    #[serde(
        rename = "ingress_controller_replicas_per_pool",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub replicas: Option<i32>,
    /// Pools last applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pools: Option<Vec<String>>,
    /// ingress-nginx version deployed into the pools
    #[serde(
        rename = "nginx_ingress_controller_version",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
    /// Pools whose ingress controller is ready
    #[serde(rename = "readyNum", default)]
    pub ready_num: i32,
    /// Pools whose ingress controller is not ready
    #[serde(rename = "unreadyNum", default)]
    pub unready_num: i32,
}

impl IngressFleet for YurtIngress {
    const KIND: &'static str = "YurtIngress";

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
            ready_count: status.ready_num,
            not_ready_count: status.unready_num,
        }
    }

    fn status_patch(observed: &ObservedState) -> serde_json::Value {
        serde_json::json!({
            "status": {
                "ingress_controller_replicas_per_pool":
                    (observed.replicas_per_pool != 0).then_some(observed.replicas_per_pool),
                "pools": observed.pools,
                "nginx_ingress_controller_version": observed.controller_version,
                "readyNum": observed.ready_count,
                "unreadyNum": observed.not_ready_count,
            }
        })
    }

    fn singleton(name: &str, _namespace: Option<&str>, replicas_per_pool: i32) -> Self {
        YurtIngress {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            spec: YurtIngressSpec {
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
    fn test_spec_uses_wire_keys() {
        let spec: YurtIngressSpec = serde_json::from_value(serde_json::json!({
            "ingress_controller_replicas_per_pool": 3,
            "pools": ["a", "b"]
        }))
        .unwrap();
        assert_eq!(spec.replicas, Some(3));
        assert_eq!(spec.pools, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_desired_defaults_replicas() {
        let ying = YurtIngress::new("yurtingress-singleton", YurtIngressSpec::default());
        let desired = ying.desired();
        assert_eq!(desired.replicas_per_pool, 1);
        assert!(desired.pools.is_empty());
    }

    #[test]
    fn test_status_patch_keys() {
        let patch = YurtIngress::status_patch(&ObservedState {
            replicas_per_pool: 2,
            pools: vec!["a".to_string()],
            controller_version: "0.48.1".to_string(),
            ready_count: 1,
            not_ready_count: 0,
        });
        let status = &patch["status"];
        assert_eq!(status["ingress_controller_replicas_per_pool"], 2);
        assert_eq!(status["pools"][0], "a");
        assert_eq!(status["nginx_ingress_controller_version"], "0.48.1");
        assert_eq!(status["readyNum"], 1);
        assert_eq!(status["unreadyNum"], 0);
    }

    #[test]
    fn test_status_patch_clears_replicas() {
        let patch = YurtIngress::status_patch(&ObservedState::default());
        assert!(patch["status"]["ingress_controller_replicas_per_pool"].is_null());
        assert_eq!(patch["status"]["pools"], serde_json::json!([]));
    }
}

//! # Custom Resource Definitions
//!
//! CRD types for the ingress singletons and the node pools they reference.
//!
//! - `YurtIngress`: cluster-scoped singleton
//! - `NodePoolIngress`: namespaced singleton
//! - `NodePool`: read-only, used by the admission webhook
//!
//! Both ingress kinds share the [`IngressFleet`] trait so one engine reconciles them.

mod nodepool;
mod nodepool_ingress;
mod yurt_ingress;

pub use nodepool::{NodePool, NodePoolSpec};
pub use nodepool_ingress::{NodePoolIngress, NodePoolIngressSpec, NodePoolIngressStatus};
pub use yurt_ingress::{YurtIngress, YurtIngressSpec, YurtIngressStatus};

use crate::constants::DEFAULT_INGRESS_CONTROLLER_REPLICAS_PER_POOL;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Operator-declared target configuration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DesiredState {
    pub replicas_per_pool: i32,
    pub pools: Vec<String>,
}

/// Last configuration this controller successfully applied
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObservedState {
    pub replicas_per_pool: i32,
    pub pools: Vec<String>,
    pub controller_version: String,
    pub ready_count: i32,
    pub not_ready_count: i32,
}

/// A top-level ingress singleton reconciled by the fleet engine
pub trait IngressFleet:
    Resource<DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Kind name used in logs and metrics
    const KIND: &'static str;

    fn desired(&self) -> DesiredState;

    fn observed(&self) -> ObservedState;

    /// Merge-patch body for the status subresource
    fn status_patch(observed: &ObservedState) -> serde_json::Value;

    /// Fresh singleton with default spec
    fn singleton(name: &str, namespace: Option<&str>, replicas_per_pool: i32) -> Self;
}

pub(crate) fn replicas_or_default(replicas: Option<i32>) -> i32 {
    replicas.unwrap_or(DEFAULT_INGRESS_CONTROLLER_REPLICAS_PER_POOL)
}

//! Shared harness for integration tests
//!
//! Builds a reconciler over an in-memory cluster with a recording sleeper so tests
//! can drive full reconcile passes without an API server.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use nodepool_ingress_controller::cluster::{FleetApi, MemoryCluster, ObjectClient, ObjectKey};
use nodepool_ingress_controller::config::{ControllerConfig, FleetSettings};
use nodepool_ingress_controller::constants::INGRESS_FINALIZER;
use nodepool_ingress_controller::controller::backoff::{RecordingSleeper, Sleeper};
use nodepool_ingress_controller::controller::reconciler::Reconciler;
use nodepool_ingress_controller::crd::{
    IngressFleet, NodePoolIngress, NodePoolIngressSpec, YurtIngress, YurtIngressSpec,
};
use nodepool_ingress_controller::manifest::Template;
use std::sync::Arc;

pub const YURT_NAME: &str = "yurtingress-singleton";
pub const NODEPOOL_NAME: &str = "nodepool-ingress";

pub struct Harness<R: IngressFleet> {
    pub cluster: Arc<MemoryCluster>,
    pub sleeper: Arc<RecordingSleeper>,
    pub reconciler: Reconciler<R>,
}

impl<R: IngressFleet> Harness<R> {
    pub fn new(settings: FleetSettings) -> Self {
        let cluster = Arc::new(MemoryCluster::new());
        let sleeper = Arc::new(RecordingSleeper::default());
        let reconciler = Reconciler::new(
            settings,
            Arc::clone(&cluster) as Arc<dyn ObjectClient>,
            Arc::clone(&cluster) as Arc<dyn FleetApi<R>>,
            Arc::clone(&sleeper) as Arc<dyn Sleeper>,
        )
        .expect("renderer builds");
        Self {
            cluster,
            sleeper,
            reconciler,
        }
    }

    /// Key of the object `template` renders to for `pool`
    pub fn key(&self, template: Template, pool: &str) -> ObjectKey {
        self.reconciler
            .lifecycle
            .object_key(template, pool)
            .expect("template renders")
    }

    pub fn namespace_of(&self, pool: &str) -> String {
        self.reconciler.lifecycle.pool_context(pool).namespace
    }

    pub fn singleton(&self) -> Option<R> {
        self.cluster.fleet::<R>(&self.reconciler.settings.singleton_name)
    }
}

pub fn yurt_harness() -> Harness<YurtIngress> {
    Harness::new(ControllerConfig::default().yurt_ingress_settings())
}

pub fn nodepool_harness() -> Harness<NodePoolIngress> {
    Harness::new(ControllerConfig::default().nodepool_ingress_settings())
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// `YurtIngress` singleton carrying our finalizer
pub fn yurt_ingress(pools: &[&str], replicas: Option<i32>) -> YurtIngress {
    let mut obj = YurtIngress::new(
        YURT_NAME,
        YurtIngressSpec {
            replicas,
            pools: Some(strings(pools)),
        },
    );
    obj.metadata.finalizers = Some(vec![INGRESS_FINALIZER.to_string()]);
    obj
}

/// `NodePoolIngress` singleton carrying our finalizer
pub fn nodepool_ingress(pools: &[&str], replicas: Option<i32>) -> NodePoolIngress {
    let mut obj = NodePoolIngress::new(
        NODEPOOL_NAME,
        NodePoolIngressSpec {
            replicas,
            pools: Some(strings(pools)),
        },
    );
    obj.metadata.namespace = Some("kube-system".to_string());
    obj.metadata.finalizers = Some(vec![INGRESS_FINALIZER.to_string()]);
    obj
}

/// Replace the spec pools and replicas of the stored `YurtIngress`, keeping its status
pub fn edit_yurt_spec(harness: &Harness<YurtIngress>, pools: &[&str], replicas: Option<i32>) {
    let mut obj = harness.singleton().expect("singleton exists");
    obj.spec.pools = Some(strings(pools));
    obj.spec.replicas = replicas;
    harness.cluster.seed_fleet(&obj);
}

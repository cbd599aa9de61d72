//! # NodePool Ingress Controller
//!
//! Kubernetes controller that deploys an ingress-nginx controller into every node pool
//! listed by the `YurtIngress` (cluster-scoped) or `NodePoolIngress` (namespaced)
//! singleton, scales them in place, and tears them down when pools are removed or the
//! singleton is deleted.
//!
//! ## Features
//!
//! - **Per-pool stacks**: namespace, RBAC, config map, service, controller deployment and
//!   admission webhook wiring rendered from embedded templates
//! - **Finalizer-gated teardown**: deleting a singleton removes every pool first
//! - **Admission webhook**: rejects misnamed singletons and unknown pools
//! - **Prometheus metrics** and health probes

use anyhow::Result;
use nodepool_ingress_controller::runtime::{initialization, watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialization::initialize().await?;
    watch_loop::run_watch_loop(init).await
}

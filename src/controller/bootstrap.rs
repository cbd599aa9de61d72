//! # Singleton Bootstrap
//!
//! Creates the ingress singleton at startup when it does not exist yet. Runs as a
//! detached background task next to the watch loop; it never blocks reconciliation
//! and ends quietly on success, on `AlreadyExists`, or once its attempts run out.

use crate::cluster::{ClusterError, FleetApi};
use crate::controller::backoff::{RetryPolicy, Sleeper};
use crate::crd::IngressFleet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created,
    AlreadyExists,
    GaveUp,
}

/// Create the singleton `name` with default spec, retrying under `policy`
pub async fn ensure_singleton<R: IngressFleet>(
    fleet: &dyn FleetApi<R>,
    name: &str,
    namespace: Option<&str>,
    replicas_per_pool: i32,
    policy: RetryPolicy,
    sleeper: &dyn Sleeper,
) -> BootstrapOutcome {
    let obj = R::singleton(name, namespace, replicas_per_pool);
    let result = policy
        .run(
            sleeper,
            |e: &ClusterError| !e.is_already_exists(),
            |attempt| {
                if attempt > 1 {
                    info!(
                        resource.kind = R::KIND,
                        resource.name = name,
                        attempt,
                        "retrying singleton creation"
                    );
                }
                fleet.create(&obj)
            },
        )
        .await;

    match result {
        Ok(_) => {
            info!(resource.kind = R::KIND, resource.name = name, "created ingress singleton");
            BootstrapOutcome::Created
        }
        Err(e) if e.is_already_exists() => {
            info!(
                resource.kind = R::KIND,
                resource.name = name,
                "ingress singleton already exists"
            );
            BootstrapOutcome::AlreadyExists
        }
        Err(e) => {
            warn!(
                resource.kind = R::KIND,
                resource.name = name,
                error = %e,
                attempts = policy.max_attempts,
                "giving up on creating ingress singleton"
            );
            BootstrapOutcome::GaveUp
        }
    }
}

/// Spawn [`ensure_singleton`] on the tokio runtime
pub fn spawn<R: IngressFleet>(
    fleet: Arc<dyn FleetApi<R>>,
    name: String,
    namespace: Option<String>,
    replicas_per_pool: i32,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
) -> JoinHandle<BootstrapOutcome> {
    tokio::spawn(async move {
        ensure_singleton(
            fleet.as_ref(),
            &name,
            namespace.as_deref(),
            replicas_per_pool,
            policy,
            sleeper.as_ref(),
        )
        .await
    })
}

//! # Status Reconciler
//!
//! Records the configuration a reconcile pass applied into the singleton's status,
//! retrying the write under a [`RetryPolicy`]. Lifecycle actions already taken are
//! never rolled back when the write fails.

use crate::cluster::{ClusterError, FleetApi};
use crate::controller::backoff::{RetryPolicy, Sleeper};
use crate::crd::{DesiredState, IngressFleet, ObservedState};
use crate::observability::metrics;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("status update of {kind}/{name} failed after {attempts} attempt(s): {source}")]
    Exhausted {
        kind: &'static str,
        name: String,
        attempts: u32,
        #[source]
        source: ClusterError,
    },
}

/// Observed state after applying `desired`
#[must_use]
pub fn applied(
    desired: &DesiredState,
    controller_version: &str,
    ready: i32,
    not_ready: i32,
) -> ObservedState {
    ObservedState {
        replicas_per_pool: desired.replicas_per_pool,
        pools: desired.pools.clone(),
        controller_version: controller_version.to_string(),
        ready_count: ready,
        not_ready_count: not_ready,
    }
}

/// Observed state after every pool has been torn down
#[must_use]
pub fn cleared(controller_version: &str) -> ObservedState {
    ObservedState {
        controller_version: controller_version.to_string(),
        ..ObservedState::default()
    }
}

pub struct StatusReconciler<R: IngressFleet> {
    fleet: Arc<dyn FleetApi<R>>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl<R: IngressFleet> fmt::Debug for StatusReconciler<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusReconciler")
            .field("kind", &R::KIND)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<R: IngressFleet> StatusReconciler<R> {
    pub fn new(
        fleet: Arc<dyn FleetApi<R>>,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            fleet,
            policy,
            sleeper,
        }
    }

    /// Write `observed` into the status of the singleton `name`.
    ///
    /// A vanished singleton is not retried.
    ///
    /// # Errors
    ///
    /// [`StatusError::Exhausted`] carrying the error of the last attempt.
    pub async fn persist(&self, name: &str, observed: &ObservedState) -> Result<R, StatusError> {
        let patch = R::status_patch(observed);
        let fleet = &self.fleet;
        let patch_ref = &patch;
        let mut attempts = 0;
        let attempts_ref = &mut attempts;

        let result = self
            .policy
            .run(
                self.sleeper.as_ref(),
                |e: &ClusterError| !e.is_not_found(),
                move |attempt| {
                    *attempts_ref = attempt;
                    if attempt > 1 {
                        warn!(
                            resource.kind = R::KIND,
                            resource.name = name,
                            attempt,
                            "retrying status update"
                        );
                        metrics::increment_status_update_retries();
                    }
                    fleet.patch_status(name, patch_ref)
                },
            )
            .await;

        match result {
            Ok(updated) => {
                info!(
                    resource.kind = R::KIND,
                    resource.name = name,
                    pools = ?observed.pools,
                    replicas = observed.replicas_per_pool,
                    ready = observed.ready_count,
                    not_ready = observed.not_ready_count,
                    "status updated"
                );
                Ok(updated)
            }
            Err(source) => Err(StatusError::Exhausted {
                kind: R::KIND,
                name: name.to_string(),
                attempts,
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applied_copies_desired() {
        let desired = DesiredState {
            replicas_per_pool: 3,
            pools: vec!["a".to_string(), "b".to_string()],
        };
        let observed = applied(&desired, "0.48.1", 1, 1);
        assert_eq!(observed.replicas_per_pool, 3);
        assert_eq!(observed.pools, desired.pools);
        assert_eq!(observed.controller_version, "0.48.1");
        assert_eq!((observed.ready_count, observed.not_ready_count), (1, 1));
    }

    #[test]
    fn test_cleared_keeps_only_version() {
        let observed = cleared("0.48.1");
        assert_eq!(observed.replicas_per_pool, 0);
        assert!(observed.pools.is_empty());
        assert_eq!(observed.controller_version, "0.48.1");
    }
}

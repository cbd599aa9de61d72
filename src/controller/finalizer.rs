//! # Deletion State Machine
//!
//! Finalizer-gated teardown of an ingress singleton.
//!
//! ```text
//! Active ──(user deletes)──▶ Terminating ──(pools drained, finalizer removed)──▶ Finalized
//! ```
//!
//! Teardown is retried a bounded number of times. Whatever is still failing after
//! that is logged as leaked and the finalizer is removed anyway, so a broken pool
//! can never pin the singleton forever.

use crate::cluster::{ClusterError, FleetApi};
use crate::controller::lifecycle::{LifecycleError, LifecycleOrchestrator};
use crate::crd::IngressFleet;
use kube::ResourceExt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No deletion timestamp
    Active,
    /// Deletion requested, our finalizer still present
    Terminating,
    /// Deletion requested, our finalizer already gone
    Finalized,
}

#[must_use]
pub fn phase<R: IngressFleet>(obj: &R, finalizer: &str) -> Phase {
    if obj.meta().deletion_timestamp.is_none() {
        Phase::Active
    } else if has_finalizer(obj, finalizer) {
        Phase::Terminating
    } else {
        Phase::Finalized
    }
}

#[must_use]
pub fn has_finalizer<R: IngressFleet>(obj: &R, finalizer: &str) -> bool {
    obj.finalizers().iter().any(|f| f == finalizer)
}

/// Append `finalizer` to the singleton's finalizer list.
///
/// # Errors
///
/// Propagates the metadata patch failure.
pub async fn add_finalizer<R: IngressFleet>(
    fleet: &dyn FleetApi<R>,
    obj: &R,
    finalizer: &str,
) -> Result<R, ClusterError> {
    let mut finalizers = obj.finalizers().to_vec();
    finalizers.push(finalizer.to_string());
    let updated = fleet.set_finalizers(&obj.name_any(), finalizers).await?;
    info!(resource.kind = R::KIND, resource.name = %obj.name_any(), "finalizer added");
    Ok(updated)
}

/// Drop `finalizer` from the singleton's finalizer list, keeping any others.
///
/// # Errors
///
/// Propagates the metadata patch failure.
pub async fn remove_finalizer<R: IngressFleet>(
    fleet: &dyn FleetApi<R>,
    obj: &R,
    finalizer: &str,
) -> Result<R, ClusterError> {
    let finalizers: Vec<String> = obj
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != finalizer)
        .cloned()
        .collect();
    let updated = fleet.set_finalizers(&obj.name_any(), finalizers).await?;
    info!(resource.kind = R::KIND, resource.name = %obj.name_any(), "finalizer removed");
    Ok(updated)
}

/// Pools that may still own objects: declared ones first, then applied-only ones
#[must_use]
pub fn pools_to_drain(desired: &[String], observed: &[String]) -> Vec<String> {
    let mut pools = desired.to_vec();
    for pool in observed {
        if !pools.contains(pool) {
            pools.push(pool.clone());
        }
    }
    pools
}

/// Delete every pool stack and then the shared ClusterRoles, repeating up to
/// `attempts` times while anything fails. Returns the errors of the last attempt.
pub async fn drain(
    lifecycle: &LifecycleOrchestrator,
    pools: &[String],
    attempts: u32,
) -> Vec<LifecycleError> {
    let attempts = attempts.max(1);
    let mut errors = Vec::new();
    for attempt in 1..=attempts {
        errors.clear();
        for pool in pools {
            if let Err(e) = lifecycle.delete_pool(pool).await {
                errors.push(e);
            }
        }
        if let Err(e) = lifecycle.delete_shared().await {
            errors.push(e);
        }
        if errors.is_empty() {
            break;
        }
        warn!(
            attempt,
            attempts,
            failures = errors.len(),
            "teardown incomplete"
        );
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{YurtIngress, YurtIngressSpec};

    fn ying(finalizers: &[&str], deleting: bool) -> YurtIngress {
        let mut obj = YurtIngress::new("yurtingress-singleton", YurtIngressSpec::default());
        obj.metadata.finalizers = Some(finalizers.iter().map(|s| (*s).to_string()).collect());
        if deleting {
            obj.metadata.deletion_timestamp =
                Some(serde_json::from_value(serde_json::json!("2026-01-01T00:00:00Z")).unwrap());
        }
        obj
    }

    #[test]
    fn test_phase() {
        let fin = "ingress.operator.openyurt.io";
        assert_eq!(phase(&ying(&[], false), fin), Phase::Active);
        assert_eq!(phase(&ying(&[fin], false), fin), Phase::Active);
        assert_eq!(phase(&ying(&[fin], true), fin), Phase::Terminating);
        assert_eq!(phase(&ying(&["other"], true), fin), Phase::Finalized);
    }

    #[test]
    fn test_pools_to_drain_unions_in_order() {
        let desired = vec!["a".to_string(), "b".to_string()];
        let observed = vec!["c".to_string(), "a".to_string()];
        assert_eq!(pools_to_drain(&desired, &observed), vec!["a", "b", "c"]);
    }
}

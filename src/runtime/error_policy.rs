//! # Error Policy
//!
//! Requeue scheduling for failed reconcile passes.
//!
//! Backoff is Fibonacci in seconds, tracked per singleton in the reconciler's
//! `backoff_states` and reset by the next successful pass.

use crate::controller::reconciler::{BackoffState, Reconciler, ReconcilerError};
use crate::crd::IngressFleet;
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Fallback when the backoff table is unavailable
const DEFAULT_REQUEUE_SECS: u64 = 60;

/// Handle reconciliation errors with Fibonacci backoff
pub fn handle_reconciliation_error<R: IngressFleet>(
    obj: Arc<R>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler<R>>,
) -> Action {
    let name = obj.name_any();
    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.kind = R::KIND,
        resource.name = name.as_str(),
    );
    let _error_guard = error_span.enter();

    error!(error = %error, "reconciliation failed");
    metrics::increment_reconciliation_errors(R::KIND);

    let (backoff_seconds, error_count) = next_requeue(&ctx, &name);
    let backoff = i64::try_from(backoff_seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or_default();
    let next_trigger_time = chrono::Utc::now() + backoff;
    info!(
        backoff_seconds,
        error_count,
        next_retry = %next_trigger_time.to_rfc3339(),
        "requeueing with backoff"
    );

    metrics::increment_requeues_total("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// Advance the backoff of `name`, returning the delay and the consecutive error count
pub fn next_requeue<R: IngressFleet>(ctx: &Reconciler<R>, name: &str) -> (u64, u32) {
    match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(ctx.backoff_key(name)).or_insert_with(|| {
                BackoffState::new(ctx.settings.backoff_min_secs, ctx.settings.backoff_max_secs)
            });
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff_states: {}, using default backoff", e);
            (DEFAULT_REQUEUE_SECS, 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MemoryCluster;
    use crate::config::ControllerConfig;
    use crate::controller::backoff::RecordingSleeper;
    use crate::crd::YurtIngress;

    fn reconciler() -> Reconciler<YurtIngress> {
        let cluster = Arc::new(MemoryCluster::new());
        Reconciler::new(
            ControllerConfig::default().yurt_ingress_settings(),
            Arc::clone(&cluster) as Arc<dyn crate::cluster::ObjectClient>,
            cluster,
            Arc::new(RecordingSleeper::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_requeue_backoff_grows_per_resource() {
        let ctx = reconciler();
        let delays: Vec<u64> = (0..5)
            .map(|_| next_requeue(&ctx, "yurtingress-singleton").0)
            .collect();
        assert_eq!(delays, vec![5, 5, 10, 15, 25]);
        assert_eq!(next_requeue(&ctx, "other").0, 5);
    }

    #[test]
    fn test_requeue_counts_errors() {
        let ctx = reconciler();
        next_requeue(&ctx, "yurtingress-singleton");
        let (_, count) = next_requeue(&ctx, "yurtingress-singleton");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_reset_restarts_backoff() {
        let ctx = reconciler();
        next_requeue(&ctx, "yurtingress-singleton");
        next_requeue(&ctx, "yurtingress-singleton");
        next_requeue(&ctx, "yurtingress-singleton");
        ctx.backoff_states
            .lock()
            .unwrap()
            .get_mut(&ctx.backoff_key("yurtingress-singleton"))
            .unwrap()
            .reset();
        assert_eq!(next_requeue(&ctx, "yurtingress-singleton"), (5, 1));
    }
}

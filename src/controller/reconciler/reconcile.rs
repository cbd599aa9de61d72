//! # Reconciliation Logic
//!
//! One pass of the convergence algorithm for an ingress singleton.
//!
//! 1. Ignore any object but the configured singleton
//! 2. Re-read it; a missing object is a no-op
//! 3. Add the finalizer if absent and return
//! 4. Deleting: drain every pool, clear status, remove the finalizer
//! 5. Otherwise diff pools, create/delete/scale, retry work left by a failed pass,
//!    then persist status, even when some of that work failed
//!
//! Errors are returned to the error policy, which owns requeue backoff.

use crate::controller::diff::diff;
use crate::controller::finalizer::{self, Phase};
use crate::controller::lifecycle::LifecycleError;
use crate::controller::reconciler::types::{PassOutcome, PendingWork, Reconciler, ReconcilerError};
use crate::controller::status;
use crate::crd::IngressFleet;
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

/// Entry point wired into `kube_runtime::Controller`
///
/// # Errors
///
/// Any unrecovered error of the pass; the error policy schedules the retry.
pub async fn reconcile<R: IngressFleet>(
    obj: Arc<R>,
    ctx: Arc<Reconciler<R>>,
) -> Result<Action, ReconcilerError> {
    let name = obj.name_any();
    if !ctx.is_singleton(&name, obj.namespace().as_deref()) {
        debug!(resource.kind = R::KIND, resource.name = %name, "ignoring non-singleton object");
        return Ok(Action::await_change());
    }

    let start = Instant::now();
    metrics::increment_reconciliations(R::KIND);
    let outcome = reconcile_pass(&ctx, &name).await;
    metrics::observe_reconciliation_duration(R::KIND, start.elapsed().as_secs_f64());

    let outcome = outcome?;
    debug!(resource.kind = R::KIND, resource.name = %name, ?outcome, "pass finished");

    if let Ok(mut states) = ctx.backoff_states.lock() {
        if let Some(state) = states.get_mut(&ctx.backoff_key(&name)) {
            state.reset();
        }
    }
    Ok(Action::await_change())
}

/// Run one pass against the singleton `name`
///
/// # Errors
///
/// Fetch and finalizer failures, lifecycle failures of an active singleton, and
/// exhausted status writes.
pub async fn reconcile_pass<R: IngressFleet>(
    ctx: &Reconciler<R>,
    name: &str,
) -> Result<PassOutcome, ReconcilerError> {
    let span = tracing::info_span!("reconcile", resource.kind = R::KIND, resource.name = name);
    pass(ctx, name).instrument(span).await
}

async fn pass<R: IngressFleet>(
    ctx: &Reconciler<R>,
    name: &str,
) -> Result<PassOutcome, ReconcilerError> {
    if name != ctx.settings.singleton_name {
        return Ok(PassOutcome::Ignored);
    }

    let obj = match ctx.fleet.get(name).await {
        Ok(obj) => obj,
        Err(e) if e.is_not_found() => {
            debug!("singleton not found, nothing to do");
            return Ok(PassOutcome::Missing);
        }
        Err(source) => {
            return Err(ReconcilerError::Fetch {
                kind: R::KIND,
                name: name.to_string(),
                source,
            })
        }
    };

    let finalizer_error = |source| ReconcilerError::Finalizer {
        kind: R::KIND,
        name: name.to_string(),
        source,
    };

    match finalizer::phase(&obj, &ctx.settings.finalizer) {
        Phase::Finalized => Ok(PassOutcome::AlreadyFinalized),
        Phase::Terminating => finalize(ctx, &obj).await,
        Phase::Active if !finalizer::has_finalizer(&obj, &ctx.settings.finalizer) => {
            finalizer::add_finalizer(ctx.fleet.as_ref(), &obj, &ctx.settings.finalizer)
                .await
                .map_err(finalizer_error)?;
            Ok(PassOutcome::FinalizerAdded)
        }
        Phase::Active => converge(ctx, &obj).await,
    }
}

async fn converge<R: IngressFleet>(
    ctx: &Reconciler<R>,
    obj: &R,
) -> Result<PassOutcome, ReconcilerError> {
    let name = obj.name_any();
    let desired = obj.desired();
    let observed = obj.observed();
    let pools = diff(&desired.pools, &observed.pools);
    let replicas_changed = desired.replicas_per_pool != observed.replicas_per_pool;
    let replicas = desired.replicas_per_pool;
    let pending = ctx.take_pending();

    let mut errors: Vec<LifecycleError> = Vec::new();
    let mut failed = PendingWork::default();
    let mut needs_update = false;

    let first_pools = !pools.added.is_empty() && observed.pools.is_empty();
    if !desired.pools.is_empty() && (first_pools || pending.shared_create) {
        needs_update = true;
        if let Err(e) = ctx.lifecycle.create_shared().await {
            failed.shared_create = true;
            errors.push(e);
        }
    }

    for pool in &pools.added {
        needs_update = true;
        if let Err(e) = ctx.lifecycle.create_pool(pool, replicas).await {
            failed.create.insert(pool.clone());
            errors.push(e);
        }
    }

    // Unfinished creates of pools still in the spec
    let retried: Vec<&String> = pools
        .unchanged
        .iter()
        .filter(|pool| pending.create.contains(*pool))
        .collect();
    for pool in &retried {
        needs_update = true;
        info!(pool = %pool, "retrying incomplete pool create");
        let result = match ctx.lifecycle.create_pool(pool, replicas).await {
            Ok(()) => ctx.lifecycle.scale_pool(pool, replicas).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            failed.create.insert((*pool).clone());
            errors.push(e);
        }
    }

    // Unfinished deletes of pools no longer in the spec
    let stale = pending
        .delete
        .iter()
        .filter(|pool| !desired.pools.contains(*pool) && !pools.removed.contains(*pool));
    for pool in pools.removed.iter().chain(stale) {
        needs_update = true;
        if let Err(e) = ctx.lifecycle.delete_pool(pool).await {
            failed.delete.insert(pool.clone());
            errors.push(e);
        }
    }

    let last_pools = !pools.removed.is_empty() || pending.shared_delete;
    if desired.pools.is_empty() && last_pools {
        needs_update = true;
        if let Err(e) = ctx.lifecycle.delete_shared().await {
            failed.shared_delete = true;
            errors.push(e);
        }
    }

    let scaled = replicas_changed && !pools.unchanged.is_empty();
    if scaled {
        needs_update = true;
        for pool in pools.unchanged.iter().filter(|pool| !retried.contains(pool)) {
            if let Err(e) = ctx.lifecycle.scale_pool(pool, replicas).await {
                failed.create.insert(pool.clone());
                errors.push(e);
            }
        }
    }

    metrics::set_managed_pools(R::KIND, desired.pools.len());

    if !needs_update {
        debug!("pools already converged");
        return Ok(PassOutcome::Converged {
            status_updated: false,
        });
    }

    let mut ready = 0;
    for pool in &desired.pools {
        if ctx.lifecycle.pool_ready(pool).await {
            ready += 1;
        }
    }
    let not_ready = i32::try_from(desired.pools.len()).unwrap_or(i32::MAX) - ready;
    let applied = status::applied(&desired, &ctx.settings.controller_version, ready, not_ready);
    let persisted = ctx.status.persist(&name, &applied).await;

    if !failed.is_empty() {
        debug!(pending = ?failed, "keeping failed work for the next pass");
    }
    ctx.store_pending(failed);

    if !errors.is_empty() {
        if let Err(e) = persisted {
            warn!(error = %e, "status not recorded for incomplete pass");
        }
        error!(
            failures = errors.len(),
            added = ?pools.added,
            removed = ?pools.removed,
            "pass incomplete, failed work retried on requeue"
        );
        return Err(ReconcilerError::Pools(errors));
    }
    persisted?;

    info!(
        added = ?pools.added,
        removed = ?pools.removed,
        scaled,
        "pools converged"
    );
    Ok(PassOutcome::Converged {
        status_updated: true,
    })
}

async fn finalize<R: IngressFleet>(
    ctx: &Reconciler<R>,
    obj: &R,
) -> Result<PassOutcome, ReconcilerError> {
    let name = obj.name_any();
    let desired = obj.desired();
    let observed = obj.observed();
    let mut pools = finalizer::pools_to_drain(&desired.pools, &observed.pools);
    for pool in ctx.take_pending().delete {
        if !pools.contains(&pool) {
            pools.push(pool);
        }
    }
    info!(pools = ?pools, "singleton deleting, tearing down pools");

    let attempts = ctx.settings.finalizer_cleanup_attempts;
    let leaks = finalizer::drain(&ctx.lifecycle, &pools, attempts).await;
    if !leaks.is_empty() {
        for leak in &leaks {
            error!(error = %leak, "teardown failure left behind");
        }
        warn!(
            leaked = leaks.len(),
            attempts = ctx.settings.finalizer_cleanup_attempts,
            "removing finalizer with teardown incomplete"
        );
        metrics::increment_finalizer_cleanup_leaks(R::KIND, leaks.len());
    }

    if let Err(e) = ctx
        .status
        .persist(&name, &status::cleared(&ctx.settings.controller_version))
        .await
    {
        warn!(error = %e, "could not clear status of deleting singleton");
    }
    metrics::set_managed_pools(R::KIND, 0);

    finalizer::remove_finalizer(ctx.fleet.as_ref(), obj, &ctx.settings.finalizer)
        .await
        .map_err(|source| ReconcilerError::Finalizer {
            kind: R::KIND,
            name: name.clone(),
            source,
        })?;

    Ok(PassOutcome::Finalized { leaked: leaks.len() })
}

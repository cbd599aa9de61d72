//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `nodepool_ingress_reconciliations_total` - Reconcile passes by kind
//! - `nodepool_ingress_reconciliation_errors_total` - Failed reconcile passes by kind
//! - `nodepool_ingress_reconciliation_duration_seconds` - Duration of reconcile passes
//! - `nodepool_ingress_managed_pools` - Pools currently declared by each singleton
//! - `nodepool_ingress_pool_operations_total` - Pool create/delete/scale operations by result
//! - `nodepool_ingress_status_update_retries_total` - Status writes that had to be retried
//! - `nodepool_ingress_finalizer_cleanup_leaks_total` - Teardown failures left by a finalizer
//! - `nodepool_ingress_admission_verdicts_total` - Webhook verdicts by kind and outcome
//! - `nodepool_ingress_requeues_total` - Requeues by reason

use anyhow::Result;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("nodepool_ingress_reconciliations_total", "Total number of reconciliations"),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "nodepool_ingress_reconciliation_errors_total",
            "Total number of reconciliation errors",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "nodepool_ingress_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static MANAGED_POOLS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "nodepool_ingress_managed_pools",
            "Current number of node pools declared by the singleton",
        ),
        &["kind"],
    )
    .expect("Failed to create MANAGED_POOLS metric - this should never happen")
});

static POOL_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "nodepool_ingress_pool_operations_total",
            "Total number of pool lifecycle operations",
        ),
        &["operation", "result"],
    )
    .expect("Failed to create POOL_OPERATIONS_TOTAL metric - this should never happen")
});

static STATUS_UPDATE_RETRIES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "nodepool_ingress_status_update_retries_total",
        "Total number of retried status updates",
    )
    .expect("Failed to create STATUS_UPDATE_RETRIES_TOTAL metric - this should never happen")
});

static FINALIZER_CLEANUP_LEAKS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "nodepool_ingress_finalizer_cleanup_leaks_total",
            "Total number of teardown failures left behind when a finalizer was removed",
        ),
        &["kind"],
    )
    .expect("Failed to create FINALIZER_CLEANUP_LEAKS_TOTAL metric - this should never happen")
});

static ADMISSION_VERDICTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "nodepool_ingress_admission_verdicts_total",
            "Total number of admission verdicts",
        ),
        &["kind", "verdict"],
    )
    .expect("Failed to create ADMISSION_VERDICTS_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("nodepool_ingress_requeues_total", "Total number of requeues"),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

/// Register every metric with the shared registry. Call once at startup.
///
/// # Errors
///
/// Fails if a metric is already registered.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(MANAGED_POOLS.clone()))?;
    REGISTRY.register(Box::new(POOL_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STATUS_UPDATE_RETRIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FINALIZER_CLEANUP_LEAKS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ADMISSION_VERDICTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_errors(kind: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_reconciliation_duration(kind: &str, duration: f64) {
    RECONCILIATION_DURATION.with_label_values(&[kind]).observe(duration);
}

pub fn set_managed_pools(kind: &str, count: usize) {
    MANAGED_POOLS
        .with_label_values(&[kind])
        .set(i64::try_from(count).unwrap_or(i64::MAX));
}

pub fn record_pool_operation(operation: &str, result: &str) {
    POOL_OPERATIONS_TOTAL.with_label_values(&[operation, result]).inc();
}

pub fn increment_status_update_retries() {
    STATUS_UPDATE_RETRIES_TOTAL.inc();
}

pub fn increment_finalizer_cleanup_leaks(kind: &str, count: usize) {
    FINALIZER_CLEANUP_LEAKS_TOTAL
        .with_label_values(&[kind])
        .inc_by(u64::try_from(count).unwrap_or(u64::MAX));
}

pub fn record_admission_verdict(kind: &str, allowed: bool) {
    let verdict = if allowed { "allowed" } else { "denied" };
    ADMISSION_VERDICTS_TOTAL.with_label_values(&[kind, verdict]).inc();
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

//! # Types
//!
//! Context and error types shared by the reconcile pass and the error policy.

use crate::cluster::{ClusterError, FleetApi, ObjectClient};
use crate::config::FleetSettings;
use crate::controller::backoff::{FibonacciBackoff, Sleeper};
use crate::controller::lifecycle::{LifecycleError, LifecycleOrchestrator};
use crate::controller::status::{StatusError, StatusReconciler};
use crate::crd::IngressFleet;
use crate::manifest::{ManifestError, ManifestRenderer};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("failed to read {kind}/{name}: {source}")]
    Fetch {
        kind: &'static str,
        name: String,
        #[source]
        source: ClusterError,
    },
    #[error("failed to update finalizers of {kind}/{name}: {source}")]
    Finalizer {
        kind: &'static str,
        name: String,
        #[source]
        source: ClusterError,
    },
    #[error("{} pool operation(s) failed: {}", .0.len(), join(.0))]
    Pools(Vec<LifecycleError>),
    #[error(transparent)]
    Status(#[from] StatusError),
}

fn join(errors: &[LifecycleError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// What a single reconcile pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Not the configured singleton
    Ignored,
    /// The singleton no longer exists
    Missing,
    /// Finalizer added; the next pass does the work
    FinalizerAdded,
    /// Converged; `status_updated` is false when nothing changed
    Converged { status_updated: bool },
    /// Pools drained and finalizer removed; `leaked` counts teardown failures left behind
    Finalized { leaked: usize },
    /// Deleting, but our finalizer is already gone
    AlreadyFinalized,
}

/// Backoff state for a specific resource
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_seconds, max_seconds),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Lifecycle work that failed in an earlier pass and is retried by the next one
///
/// Status records the desired pools even after a partial failure, so the pool
/// diff never revisits these. Held in memory only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingWork {
    pub create: BTreeSet<String>,
    pub delete: BTreeSet<String>,
    pub shared_create: bool,
    pub shared_delete: bool,
}

impl PendingWork {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.delete.is_empty()
            && !self.shared_create
            && !self.shared_delete
    }
}

/// Reconcile context for one singleton kind
pub struct Reconciler<R: IngressFleet> {
    pub settings: FleetSettings,
    pub fleet: Arc<dyn FleetApi<R>>,
    pub lifecycle: LifecycleOrchestrator,
    pub status: StatusReconciler<R>,
    // Keyed by namespace/name, owned by the error policy
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
    pub pending: Mutex<PendingWork>,
}

impl<R: IngressFleet> std::fmt::Debug for Reconciler<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("kind", &R::KIND)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<R: IngressFleet> Reconciler<R> {
    /// # Errors
    ///
    /// Fails only if the manifest renderer cannot be built.
    pub fn new(
        settings: FleetSettings,
        objects: Arc<dyn ObjectClient>,
        fleet: Arc<dyn FleetApi<R>>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, ManifestError> {
        let lifecycle = LifecycleOrchestrator::new(
            objects,
            ManifestRenderer::new()?,
            settings.pool_namespace_prefix.clone(),
            settings.controller_version.clone(),
            settings.scale_policy(),
            Arc::clone(&sleeper),
        );
        let status = StatusReconciler::new(Arc::clone(&fleet), settings.status_policy(), sleeper);
        Ok(Self {
            settings,
            fleet,
            lifecycle,
            status,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            pending: Mutex::new(PendingWork::default()),
        })
    }

    /// Whether `name`/`namespace` identify the configured singleton
    #[must_use]
    pub fn is_singleton(&self, name: &str, namespace: Option<&str>) -> bool {
        let namespace_matches =
            self.settings.namespace.is_none() || self.settings.namespace.as_deref() == namespace;
        name == self.settings.singleton_name && namespace_matches
    }

    /// Work left over from the previous pass, leaving nothing behind
    pub fn take_pending(&self) -> PendingWork {
        match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => {
                warn!(resource.kind = R::KIND, "pending work lock poisoned, starting fresh");
                PendingWork::default()
            }
        }
    }

    pub(crate) fn store_pending(&self, work: PendingWork) {
        if let Ok(mut pending) = self.pending.lock() {
            *pending = work;
        }
    }

    pub(crate) fn backoff_key(&self, name: &str) -> String {
        format!(
            "{}/{}",
            self.settings.namespace.as_deref().unwrap_or("cluster"),
            name
        )
    }
}

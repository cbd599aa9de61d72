//! # Reconciler
//!
//! Composition root of the convergence engine. One [`Reconciler`] serves one
//! ingress singleton kind; `YurtIngress` and `NodePoolIngress` each get their own.

pub mod reconcile;
pub mod types;

pub use reconcile::{reconcile, reconcile_pass};
pub use types::{BackoffState, PassOutcome, PendingWork, Reconciler, ReconcilerError};

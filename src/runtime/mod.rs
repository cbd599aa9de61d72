//! # Runtime
//!
//! Process wiring around the reconcile engine.
//!
//! - `initialization`: startup sequence and dependency construction
//! - `watch_loop`: the `kube_runtime` controllers
//! - `error_policy`: requeue backoff after failed passes

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

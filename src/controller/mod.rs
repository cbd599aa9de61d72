//! # Controller
//!
//! Core controller modules for the NodePool Ingress Controller.
//!
//! - `backoff`: retry policies, Fibonacci requeue backoff, injectable sleeper
//! - `bootstrap`: startup creation of the ingress singleton
//! - `diff`: desired vs applied pool sets
//! - `finalizer`: deletion state machine
//! - `lifecycle`: per-pool create/delete/scale plans
//! - `reconciler`: the reconcile pass
//! - `server`: HTTP server for metrics and health checks
//! - `status`: status persistence

pub mod backoff;
pub mod bootstrap;
pub mod diff;
pub mod finalizer;
pub mod lifecycle;
pub mod reconciler;
pub mod server;
pub mod status;

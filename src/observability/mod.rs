//! # Observability
//!
//! Prometheus metrics and tracing subscriber setup.

pub mod logging;
pub mod metrics;

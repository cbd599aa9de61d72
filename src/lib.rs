//! NodePool Ingress Controller Library
//!
//! Keeps one ingress-nginx stack per node pool in sync with the `YurtIngress` and
//! `NodePoolIngress` singletons.
//!
//! - `crd`: custom resource types and the [`crd::IngressFleet`] trait
//! - `manifest`: template rendering into typed objects
//! - `cluster`: object store access (live and in-memory)
//! - `controller`: diffing, pool lifecycle, status, finalizer, reconcile pass
//! - `webhook`: admission validation
//! - `runtime`: process wiring

pub mod cluster;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod manifest;
pub mod observability;
pub mod runtime;
pub mod webhook;

//! # Configuration
//!
//! Environment-driven settings for the controller process.

pub mod controller;

pub use controller::{ControllerConfig, FleetSettings};

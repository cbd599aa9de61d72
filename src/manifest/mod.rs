//! # Manifest Renderer
//!
//! Turns the static YAML templates of a pool's ingress stack into typed objects.
//!
//! ## Flow
//!
//! 1. [`Template`] selects one of the YAML files compiled into the binary
//! 2. [`ManifestRenderer::render`] substitutes `{{.key}}` placeholders from a [`PoolContext`]
//! 3. [`ManifestRenderer::parse`] reads the `kind` and decodes into [`ManifestObject`]
//!
//! Unknown placeholders and unknown kinds are errors, never silently passed through.

mod object;
mod render;
mod template;

pub use object::ManifestObject;
pub use render::{ManifestRenderer, PoolContext, Substitutions};
pub use template::Template;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("template {template} references unknown placeholder {key}")]
    MissingSubstitution { template: &'static str, key: String },
    #[error("unsupported manifest kind: {0}")]
    UnsupportedKind(String),
    #[error("manifest has no kind field")]
    MissingKind,
    #[error("template {template} rendered a {actual} where a {expected} was expected")]
    KindMismatch {
        template: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("failed to decode manifest: {0}")]
    Decode(#[from] serde_yaml::Error),
    #[error("invalid placeholder pattern: {0}")]
    Pattern(#[from] regex::Error),
}

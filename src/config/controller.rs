//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables, and the per-kind
//! [`FleetSettings`] the composition root derives from them.

use crate::constants::{
    DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS, DEFAULT_BOOTSTRAP_ATTEMPTS,
    DEFAULT_BOOTSTRAP_DELAY_SECS, DEFAULT_CONFLICT_RETRY_ATTEMPTS,
    DEFAULT_FINALIZER_CLEANUP_ATTEMPTS, DEFAULT_METRICS_PORT, DEFAULT_NODEPOOL_INGRESS_NAMESPACE,
    DEFAULT_POOL_NAMESPACE_PREFIX, DEFAULT_STATUS_UPDATE_RETRIES, DEFAULT_WEBHOOK_PORT,
    INGRESS_FINALIZER, NGINX_INGRESS_CONTROLLER_VERSION, NODEPOOL_INGRESS_SINGLETON_NAME,
    YURT_INGRESS_SINGLETON_NAME,
};
use crate::controller::backoff::RetryPolicy;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have defaults and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Port of the metrics and health probe server
    pub metrics_port: u16,
    /// Port of the admission webhook server
    pub webhook_port: u16,
    pub enable_webhook: bool,
    /// Pool namespaces are named `<prefix>-<pool>`
    pub pool_namespace_prefix: String,
    /// Namespace holding the `NodePoolIngress` singleton
    pub nodepool_ingress_namespace: String,
    /// Create the `NodePoolIngress` singleton at startup when missing
    pub create_singleton_pool_ingress: bool,
    /// Retries after the first failed status write
    pub status_update_retries: u32,
    pub bootstrap_attempts: u32,
    pub bootstrap_delay_secs: u64,
    /// Teardown passes before a deleting singleton loses its finalizer regardless
    pub finalizer_cleanup_attempts: u32,
    /// Attempts when a deployment update races with another writer
    pub conflict_retry_attempts: u32,
    /// Requeue backoff bounds after a failed reconcile (seconds)
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = Env { lookup: &lookup };
        Self {
            metrics_port: env.or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            webhook_port: env.or_default("WEBHOOK_PORT", DEFAULT_WEBHOOK_PORT),
            enable_webhook: env.or_default_bool("ENABLE_WEBHOOK", true),
            pool_namespace_prefix: env
                .or_default_str("POOL_NAMESPACE_PREFIX", DEFAULT_POOL_NAMESPACE_PREFIX),
            nodepool_ingress_namespace: env.or_default_str(
                "NODEPOOL_INGRESS_NAMESPACE",
                DEFAULT_NODEPOOL_INGRESS_NAMESPACE,
            ),
            create_singleton_pool_ingress: env
                .or_default_bool("CREATE_SINGLETON_POOL_INGRESS", true),
            status_update_retries: env
                .or_default("STATUS_UPDATE_RETRIES", DEFAULT_STATUS_UPDATE_RETRIES),
            bootstrap_attempts: env.or_default("BOOTSTRAP_ATTEMPTS", DEFAULT_BOOTSTRAP_ATTEMPTS),
            bootstrap_delay_secs: env
                .or_default("BOOTSTRAP_DELAY_SECS", DEFAULT_BOOTSTRAP_DELAY_SECS),
            finalizer_cleanup_attempts: env.or_default(
                "FINALIZER_CLEANUP_ATTEMPTS",
                DEFAULT_FINALIZER_CLEANUP_ATTEMPTS,
            ),
            conflict_retry_attempts: env
                .or_default("CONFLICT_RETRY_ATTEMPTS", DEFAULT_CONFLICT_RETRY_ATTEMPTS),
            backoff_min_secs: env.or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: env.or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            log_format: env.or_default_str("LOG_FORMAT", "json"),
        }
    }

    /// Retry policy of the startup singleton creation
    #[must_use]
    pub fn bootstrap_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.bootstrap_attempts, Duration::from_secs(self.bootstrap_delay_secs))
    }

    #[must_use]
    pub fn yurt_ingress_settings(&self) -> FleetSettings {
        FleetSettings {
            singleton_name: YURT_INGRESS_SINGLETON_NAME.to_string(),
            namespace: None,
            ..self.base_settings()
        }
    }

    #[must_use]
    pub fn nodepool_ingress_settings(&self) -> FleetSettings {
        FleetSettings {
            singleton_name: NODEPOOL_INGRESS_SINGLETON_NAME.to_string(),
            namespace: Some(self.nodepool_ingress_namespace.clone()),
            ..self.base_settings()
        }
    }

    fn base_settings(&self) -> FleetSettings {
        FleetSettings {
            singleton_name: String::new(),
            namespace: None,
            pool_namespace_prefix: self.pool_namespace_prefix.clone(),
            finalizer: INGRESS_FINALIZER.to_string(),
            controller_version: NGINX_INGRESS_CONTROLLER_VERSION.to_string(),
            status_update_retries: self.status_update_retries,
            conflict_retry_attempts: self.conflict_retry_attempts,
            finalizer_cleanup_attempts: self.finalizer_cleanup_attempts,
            backoff_min_secs: self.backoff_min_secs,
            backoff_max_secs: self.backoff_max_secs,
        }
    }
}

/// Everything the reconcile engine needs to know about one singleton kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetSettings {
    /// The only object name this engine reconciles
    pub singleton_name: String,
    /// Namespace of the singleton; `None` for cluster-scoped kinds
    pub namespace: Option<String>,
    pub pool_namespace_prefix: String,
    pub finalizer: String,
    pub controller_version: String,
    pub status_update_retries: u32,
    pub conflict_retry_attempts: u32,
    pub finalizer_cleanup_attempts: u32,
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
}

impl FleetSettings {
    /// Status writes retry immediately; the first write is not a retry
    #[must_use]
    pub fn status_policy(&self) -> RetryPolicy {
        RetryPolicy::immediate(self.status_update_retries.saturating_add(1))
    }

    /// Deployment scaling retries conflicts immediately
    #[must_use]
    pub fn scale_policy(&self) -> RetryPolicy {
        RetryPolicy::immediate(self.conflict_retry_attempts)
    }
}

struct Env<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Env<'_> {
    /// Read a value or return default value
    fn or_default<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        (self.lookup)(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Read a value as boolean or return default
    fn or_default_bool(&self, key: &str, default: bool) -> bool {
        (self.lookup)(key)
            .map(|v| {
                let v_lower = v.to_lowercase();
                v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
            })
            .unwrap_or(default)
    }

    /// Read a value as string or return default
    fn or_default_str(&self, key: &str, default: &str) -> String {
        (self.lookup)(key)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    }
}

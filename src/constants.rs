//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group of the ingress custom resources
pub const API_GROUP: &str = "apps.openyurt.io";

/// Name of the cluster-scoped `YurtIngress` singleton
pub const YURT_INGRESS_SINGLETON_NAME: &str = "yurtingress-singleton";

/// Name of the namespaced `NodePoolIngress` singleton
pub const NODEPOOL_INGRESS_SINGLETON_NAME: &str = "nodepool-ingress";

/// Default namespace of the `NodePoolIngress` singleton
pub const DEFAULT_NODEPOOL_INGRESS_NAMESPACE: &str = "kube-system";

/// Finalizer that defers deletion of an ingress singleton until its pools are torn down
pub const INGRESS_FINALIZER: &str = "ingress.operator.openyurt.io";

/// Version of the ingress-nginx controller rendered into every pool
pub const NGINX_INGRESS_CONTROLLER_VERSION: &str = "0.48.1";

/// Default ingress-controller replicas per pool when the spec omits it
pub const DEFAULT_INGRESS_CONTROLLER_REPLICAS_PER_POOL: i32 = 1;

/// Replicas of the per-pool admission webhook deployment
pub const WEBHOOK_DEPLOYMENT_REPLICAS: i32 = 1;

/// Prefix of every per-pool namespace (`<prefix>-<pool>`)
pub const DEFAULT_POOL_NAMESPACE_PREFIX: &str = "nodepool";

/// Prefix of the per-pool controller ClusterRoleBinding (`<prefix>-<namespace>`)
pub const CLUSTER_ROLE_BINDING_PREFIX: &str = "clusterrole-binding";

/// Prefix of the per-pool webhook ClusterRoleBinding (`<prefix>-<namespace>`)
pub const WEBHOOK_CLUSTER_ROLE_BINDING_PREFIX: &str = "webhook-clusterrole-binding";

/// Prefix of the per-pool ValidatingWebhookConfiguration (`<prefix>-<namespace>`)
pub const WEBHOOK_CONFIGURATION_PREFIX: &str = "webhook-admission";

/// Field manager used for status and metadata patches
pub const FIELD_MANAGER: &str = "nodepool-ingress-controller";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP port of the validating admission webhook
pub const DEFAULT_WEBHOOK_PORT: u16 = 9443;

/// Retries after a failed status write before surfacing the error
pub const DEFAULT_STATUS_UPDATE_RETRIES: u32 = 5;

/// Attempts made when creating the singleton at startup
pub const DEFAULT_BOOTSTRAP_ATTEMPTS: u32 = 5;

/// Delay between singleton creation attempts (seconds)
pub const DEFAULT_BOOTSTRAP_DELAY_SECS: u64 = 2;

/// Cleanup passes run before a terminating singleton loses its finalizer
pub const DEFAULT_FINALIZER_CLEANUP_ATTEMPTS: u32 = 3;

/// Attempts made when an update races with another writer
pub const DEFAULT_CONFLICT_RETRY_ATTEMPTS: u32 = 5;

/// Minimum requeue backoff after a failed reconcile (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Maximum requeue backoff after a failed reconcile (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// How long startup waits for the probe server to bind (seconds)
pub const SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Poll interval while waiting for the probe server (milliseconds)
pub const SERVER_POLL_INTERVAL_MS: u64 = 50;

//! # Cluster Object Client
//!
//! Abstract access to the cluster object store.
//!
//! - [`ObjectClient`]: create/update/delete/get/list for the objects of a pool stack
//! - [`FleetApi`]: reads and writes of the top-level ingress singleton
//!
//! [`kube_client`] implements both against a live API server, [`memory`] implements both
//! in process with an operation log for tests.

pub mod kube_client;
pub mod memory;

pub use kube_client::{KubeFleetApi, KubeObjectClient};
pub use memory::{MemoryCluster, Op, Verb};

use crate::crd::IngressFleet;
use crate::manifest::ManifestObject;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Concrete object kinds managed or consulted by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    Namespace,
    ServiceAccount,
    ConfigMap,
    ClusterRole,
    ClusterRoleBinding,
    Role,
    RoleBinding,
    Service,
    Deployment,
    Job,
    ValidatingWebhookConfiguration,
    NodePool,
}

impl ObjectKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Namespace => "namespace",
            ObjectKind::ServiceAccount => "serviceaccount",
            ObjectKind::ConfigMap => "configmap",
            ObjectKind::ClusterRole => "clusterrole",
            ObjectKind::ClusterRoleBinding => "clusterrolebinding",
            ObjectKind::Role => "role",
            ObjectKind::RoleBinding => "rolebinding",
            ObjectKind::Service => "service",
            ObjectKind::Deployment => "deployment",
            ObjectKind::Job => "job",
            ObjectKind::ValidatingWebhookConfiguration => "validatingwebhookconfiguration",
            ObjectKind::NodePool => "nodepool",
        }
    }

    /// Whether objects of this kind live inside a namespace
    #[must_use]
    pub fn is_namespaced(&self) -> bool {
        !matches!(
            self,
            ObjectKind::Namespace
                | ObjectKind::ClusterRole
                | ObjectKind::ClusterRoleBinding
                | ObjectKind::ValidatingWebhookConfiguration
                | ObjectKind::NodePool
        )
    }
}

/// Identity of a single object in the store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub kind: ObjectKind,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn namespaced(
        kind: ObjectKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn cluster(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: None,
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind.as_str(), ns, self.name),
            None => write!(f, "{}/{}", self.kind.as_str(), self.name),
        }
    }
}

/// Classified failure of a cluster call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClusterError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("conflict updating {0}")]
    Conflict(String),
    #[error("transient error: {0}")]
    Transient(String),
    #[error("{0}")]
    Other(String),
}

impl ClusterError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound(_))
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClusterError::AlreadyExists(_))
    }

    /// Conflicts and transient failures may succeed when simply retried
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClusterError::Conflict(_) | ClusterError::Transient(_))
    }
}

/// Object store operations used to converge a pool's resource stack
#[async_trait]
pub trait ObjectClient: Send + Sync {
    async fn create(&self, obj: &ManifestObject) -> Result<(), ClusterError>;

    /// Replace an existing object; the object must carry the version it was read at
    async fn update(&self, obj: &ManifestObject) -> Result<(), ClusterError>;

    async fn delete(&self, key: &ObjectKey) -> Result<(), ClusterError>;

    async fn get(&self, key: &ObjectKey) -> Result<ManifestObject, ClusterError>;

    /// Names of all objects of `kind`, optionally restricted to a namespace
    async fn list_names(
        &self,
        kind: ObjectKind,
        namespace: Option<&str>,
    ) -> Result<Vec<String>, ClusterError>;
}

/// Access to the top-level ingress singleton of kind `R`
#[async_trait]
pub trait FleetApi<R: IngressFleet>: Send + Sync {
    async fn get(&self, name: &str) -> Result<R, ClusterError>;

    async fn create(&self, obj: &R) -> Result<R, ClusterError>;

    /// Merge-patch the status subresource
    async fn patch_status(&self, name: &str, patch: &serde_json::Value) -> Result<R, ClusterError>;

    /// Replace the finalizer list in metadata
    async fn set_finalizers(&self, name: &str, finalizers: Vec<String>) -> Result<R, ClusterError>;
}

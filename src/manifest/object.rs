//! Typed result of parsing a rendered manifest.

use crate::cluster::{ObjectKey, ObjectKind};
use k8s_openapi::api::admissionregistration::v1::ValidatingWebhookConfiguration;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// One decoded Kubernetes object, tagged by kind
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestObject {
    Namespace(Namespace),
    ServiceAccount(ServiceAccount),
    ConfigMap(ConfigMap),
    ClusterRole(ClusterRole),
    ClusterRoleBinding(ClusterRoleBinding),
    Role(Role),
    RoleBinding(RoleBinding),
    Service(Service),
    Deployment(Deployment),
    Job(Job),
    ValidatingWebhookConfiguration(ValidatingWebhookConfiguration),
}

impl ManifestObject {
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        match self {
            ManifestObject::Namespace(_) => ObjectKind::Namespace,
            ManifestObject::ServiceAccount(_) => ObjectKind::ServiceAccount,
            ManifestObject::ConfigMap(_) => ObjectKind::ConfigMap,
            ManifestObject::ClusterRole(_) => ObjectKind::ClusterRole,
            ManifestObject::ClusterRoleBinding(_) => ObjectKind::ClusterRoleBinding,
            ManifestObject::Role(_) => ObjectKind::Role,
            ManifestObject::RoleBinding(_) => ObjectKind::RoleBinding,
            ManifestObject::Service(_) => ObjectKind::Service,
            ManifestObject::Deployment(_) => ObjectKind::Deployment,
            ManifestObject::Job(_) => ObjectKind::Job,
            ManifestObject::ValidatingWebhookConfiguration(_) => {
                ObjectKind::ValidatingWebhookConfiguration
            }
        }
    }

    #[must_use]
    pub fn meta(&self) -> &ObjectMeta {
        match self {
            ManifestObject::Namespace(o) => &o.metadata,
            ManifestObject::ServiceAccount(o) => &o.metadata,
            ManifestObject::ConfigMap(o) => &o.metadata,
            ManifestObject::ClusterRole(o) => &o.metadata,
            ManifestObject::ClusterRoleBinding(o) => &o.metadata,
            ManifestObject::Role(o) => &o.metadata,
            ManifestObject::RoleBinding(o) => &o.metadata,
            ManifestObject::Service(o) => &o.metadata,
            ManifestObject::Deployment(o) => &o.metadata,
            ManifestObject::Job(o) => &o.metadata,
            ManifestObject::ValidatingWebhookConfiguration(o) => &o.metadata,
        }
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            ManifestObject::Namespace(o) => &mut o.metadata,
            ManifestObject::ServiceAccount(o) => &mut o.metadata,
            ManifestObject::ConfigMap(o) => &mut o.metadata,
            ManifestObject::ClusterRole(o) => &mut o.metadata,
            ManifestObject::ClusterRoleBinding(o) => &mut o.metadata,
            ManifestObject::Role(o) => &mut o.metadata,
            ManifestObject::RoleBinding(o) => &mut o.metadata,
            ManifestObject::Service(o) => &mut o.metadata,
            ManifestObject::Deployment(o) => &mut o.metadata,
            ManifestObject::Job(o) => &mut o.metadata,
            ManifestObject::ValidatingWebhookConfiguration(o) => &mut o.metadata,
        }
    }

    /// Store identity; cluster-scoped kinds never carry a namespace
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        let kind = self.kind();
        let meta = self.meta();
        ObjectKey {
            kind,
            namespace: if kind.is_namespaced() {
                meta.namespace.clone()
            } else {
                None
            },
            name: meta.name.clone().unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn as_deployment(&self) -> Option<&Deployment> {
        match self {
            ManifestObject::Deployment(d) => Some(d),
            _ => None,
        }
    }

    /// Set `spec.replicas` on a deployment. Returns false for any other kind.
    pub fn set_replicas(&mut self, replicas: i32) -> bool {
        match self {
            ManifestObject::Deployment(d) => {
                d.spec.get_or_insert_with(Default::default).replicas = Some(replicas);
                true
            }
            _ => false,
        }
    }

    /// A deployment is ready once `readyReplicas` has caught up with `replicas`
    #[must_use]
    pub fn deployment_ready(&self) -> bool {
        let Some(deployment) = self.as_deployment() else {
            return false;
        };
        let wanted = deployment.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        let ready = deployment
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0);
        ready >= wanted
    }
}

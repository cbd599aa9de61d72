//! Embedded YAML templates, one per object of a pool stack.

use crate::cluster::ObjectKind;

/// A manifest template compiled into the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    PoolNamespace,
    ControllerClusterRole,
    AdmissionClusterRole,
    ControllerServiceAccount,
    ControllerConfigMap,
    ControllerClusterRoleBinding,
    ControllerRole,
    ControllerRoleBinding,
    ControllerService,
    ControllerDeployment,
    AdmissionServiceAccount,
    AdmissionClusterRoleBinding,
    AdmissionRole,
    AdmissionRoleBinding,
    AdmissionService,
    ValidatingWebhook,
    CertificateJob,
    WebhookPatchJob,
    AdmissionDeployment,
}

impl Template {
    pub const ALL: [Template; 19] = [
        Template::PoolNamespace,
        Template::ControllerClusterRole,
        Template::AdmissionClusterRole,
        Template::ControllerServiceAccount,
        Template::ControllerConfigMap,
        Template::ControllerClusterRoleBinding,
        Template::ControllerRole,
        Template::ControllerRoleBinding,
        Template::ControllerService,
        Template::ControllerDeployment,
        Template::AdmissionServiceAccount,
        Template::AdmissionClusterRoleBinding,
        Template::AdmissionRole,
        Template::AdmissionRoleBinding,
        Template::AdmissionService,
        Template::ValidatingWebhook,
        Template::CertificateJob,
        Template::WebhookPatchJob,
        Template::AdmissionDeployment,
    ];

    /// Stable identifier used in logs and errors
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Template::PoolNamespace => "namespace",
            Template::ControllerClusterRole => "controller-clusterrole",
            Template::AdmissionClusterRole => "admission-clusterrole",
            Template::ControllerServiceAccount => "controller-serviceaccount",
            Template::ControllerConfigMap => "controller-configmap",
            Template::ControllerClusterRoleBinding => "controller-clusterrolebinding",
            Template::ControllerRole => "controller-role",
            Template::ControllerRoleBinding => "controller-rolebinding",
            Template::ControllerService => "controller-service",
            Template::ControllerDeployment => "controller-deployment",
            Template::AdmissionServiceAccount => "admission-serviceaccount",
            Template::AdmissionClusterRoleBinding => "admission-clusterrolebinding",
            Template::AdmissionRole => "admission-role",
            Template::AdmissionRoleBinding => "admission-rolebinding",
            Template::AdmissionService => "admission-service",
            Template::ValidatingWebhook => "validating-webhook",
            Template::CertificateJob => "admission-create-job",
            Template::WebhookPatchJob => "admission-patch-job",
            Template::AdmissionDeployment => "admission-deployment",
        }
    }

    /// Kind of the object this template renders
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        match self {
            Template::PoolNamespace => ObjectKind::Namespace,
            Template::ControllerClusterRole | Template::AdmissionClusterRole => {
                ObjectKind::ClusterRole
            }
            Template::ControllerServiceAccount | Template::AdmissionServiceAccount => {
                ObjectKind::ServiceAccount
            }
            Template::ControllerConfigMap => ObjectKind::ConfigMap,
            Template::ControllerClusterRoleBinding | Template::AdmissionClusterRoleBinding => {
                ObjectKind::ClusterRoleBinding
            }
            Template::ControllerRole | Template::AdmissionRole => ObjectKind::Role,
            Template::ControllerRoleBinding | Template::AdmissionRoleBinding => {
                ObjectKind::RoleBinding
            }
            Template::ControllerService | Template::AdmissionService => ObjectKind::Service,
            Template::ControllerDeployment | Template::AdmissionDeployment => {
                ObjectKind::Deployment
            }
            Template::ValidatingWebhook => ObjectKind::ValidatingWebhookConfiguration,
            Template::CertificateJob | Template::WebhookPatchJob => ObjectKind::Job,
        }
    }

    #[must_use]
    pub fn source(&self) -> &'static str {
        match self {
            Template::PoolNamespace => include_str!("templates/namespace.yaml"),
            Template::ControllerClusterRole => {
                include_str!("templates/controller-clusterrole.yaml")
            }
            Template::AdmissionClusterRole => include_str!("templates/admission-clusterrole.yaml"),
            Template::ControllerServiceAccount => {
                include_str!("templates/controller-serviceaccount.yaml")
            }
            Template::ControllerConfigMap => include_str!("templates/controller-configmap.yaml"),
            Template::ControllerClusterRoleBinding => {
                include_str!("templates/controller-clusterrolebinding.yaml")
            }
            Template::ControllerRole => include_str!("templates/controller-role.yaml"),
            Template::ControllerRoleBinding => {
                include_str!("templates/controller-rolebinding.yaml")
            }
            Template::ControllerService => include_str!("templates/controller-service.yaml"),
            Template::ControllerDeployment => include_str!("templates/controller-deployment.yaml"),
            Template::AdmissionServiceAccount => {
                include_str!("templates/admission-serviceaccount.yaml")
            }
            Template::AdmissionClusterRoleBinding => {
                include_str!("templates/admission-clusterrolebinding.yaml")
            }
            Template::AdmissionRole => include_str!("templates/admission-role.yaml"),
            Template::AdmissionRoleBinding => include_str!("templates/admission-rolebinding.yaml"),
            Template::AdmissionService => include_str!("templates/admission-service.yaml"),
            Template::ValidatingWebhook => include_str!("templates/validating-webhook.yaml"),
            Template::CertificateJob => include_str!("templates/admission-create-job.yaml"),
            Template::WebhookPatchJob => include_str!("templates/admission-patch-job.yaml"),
            Template::AdmissionDeployment => include_str!("templates/admission-deployment.yaml"),
        }
    }
}

//! Placeholder substitution and kind-directed decoding.

use super::{ManifestError, ManifestObject, Template};
use crate::constants::{
    CLUSTER_ROLE_BINDING_PREFIX, WEBHOOK_CLUSTER_ROLE_BINDING_PREFIX, WEBHOOK_CONFIGURATION_PREFIX,
};
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

pub type Substitutions = BTreeMap<String, String>;

/// Naming context of one pool's ingress stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolContext {
    pub pool: String,
    pub namespace: String,
    pub controller_version: String,
}

impl PoolContext {
    pub fn new(pool: &str, namespace_prefix: &str, controller_version: &str) -> Self {
        Self {
            pool: pool.to_string(),
            namespace: format!("{namespace_prefix}-{pool}"),
            controller_version: controller_version.to_string(),
        }
    }

    #[must_use]
    pub fn webhook_name(&self) -> String {
        format!("{WEBHOOK_CONFIGURATION_PREFIX}-{}", self.namespace)
    }

    #[must_use]
    pub fn cluster_role_binding_name(&self) -> String {
        format!("{CLUSTER_ROLE_BINDING_PREFIX}-{}", self.namespace)
    }

    #[must_use]
    pub fn webhook_cluster_role_binding_name(&self) -> String {
        format!("{WEBHOOK_CLUSTER_ROLE_BINDING_PREFIX}-{}", self.namespace)
    }

    #[must_use]
    pub fn substitutions(&self) -> Substitutions {
        let mut subs = Substitutions::new();
        subs.insert("pool_name".to_string(), self.pool.clone());
        subs.insert("namespace".to_string(), self.namespace.clone());
        subs.insert("webhook_name".to_string(), self.webhook_name());
        subs.insert("controller_version".to_string(), self.controller_version.clone());
        subs
    }
}

/// Renders embedded templates into typed objects
#[derive(Debug, Clone)]
pub struct ManifestRenderer {
    placeholder: Regex,
}

impl ManifestRenderer {
    /// # Errors
    ///
    /// Returns an error if the placeholder pattern fails to compile.
    pub fn new() -> Result<Self, ManifestError> {
        Ok(Self {
            placeholder: Regex::new(r"\{\{\s*\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")?,
        })
    }

    /// Replace every `{{.key}}` in the template with its substitution.
    ///
    /// # Errors
    ///
    /// [`ManifestError::MissingSubstitution`] names the first placeholder without a value.
    pub fn render(
        &self,
        template: Template,
        subs: &Substitutions,
    ) -> Result<String, ManifestError> {
        let mut missing: Option<String> = None;
        let rendered = self
            .placeholder
            .replace_all(template.source(), |caps: &Captures<'_>| {
                let key = &caps[1];
                match subs.get(key) {
                    Some(value) => value.clone(),
                    None => {
                        missing.get_or_insert_with(|| key.to_string());
                        String::new()
                    }
                }
            })
            .into_owned();

        match missing {
            Some(key) => Err(ManifestError::MissingSubstitution {
                template: template.name(),
                key,
            }),
            None => Ok(rendered),
        }
    }

    /// Decode rendered YAML into the variant named by its `kind`.
    ///
    /// # Errors
    ///
    /// Fails on malformed YAML, a missing `kind`, or a kind outside [`ManifestObject`].
    pub fn parse(&self, text: &str) -> Result<ManifestObject, ManifestError> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        let kind = value
            .get("kind")
            .and_then(serde_yaml::Value::as_str)
            .ok_or(ManifestError::MissingKind)?
            .to_string();

        let obj = match kind.as_str() {
            "Namespace" => ManifestObject::Namespace(decode(value)?),
            "ServiceAccount" => ManifestObject::ServiceAccount(decode(value)?),
            "ConfigMap" => ManifestObject::ConfigMap(decode(value)?),
            "ClusterRole" => ManifestObject::ClusterRole(decode(value)?),
            "ClusterRoleBinding" => ManifestObject::ClusterRoleBinding(decode(value)?),
            "Role" => ManifestObject::Role(decode(value)?),
            "RoleBinding" => ManifestObject::RoleBinding(decode(value)?),
            "Service" => ManifestObject::Service(decode(value)?),
            "Deployment" => ManifestObject::Deployment(decode(value)?),
            "Job" => ManifestObject::Job(decode(value)?),
            "ValidatingWebhookConfiguration" => {
                ManifestObject::ValidatingWebhookConfiguration(decode(value)?)
            }
            _ => return Err(ManifestError::UnsupportedKind(kind)),
        };
        Ok(obj)
    }

    /// Render and parse a template for one pool, checking the decoded kind.
    ///
    /// # Errors
    ///
    /// Propagates render and parse failures.
    pub fn render_object(
        &self,
        template: Template,
        ctx: &PoolContext,
    ) -> Result<ManifestObject, ManifestError> {
        let text = self.render(template, &ctx.substitutions())?;
        let obj = self.parse(&text)?;
        if obj.kind() != template.kind() {
            return Err(ManifestError::KindMismatch {
                template: template.name(),
                expected: template.kind().as_str(),
                actual: obj.kind().as_str(),
            });
        }
        Ok(obj)
    }
}

fn decode<T: DeserializeOwned>(value: serde_yaml::Value) -> Result<T, ManifestError> {
    Ok(serde_yaml::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ObjectKind;
    use crate::constants::NGINX_INGRESS_CONTROLLER_VERSION;

    fn ctx() -> PoolContext {
        PoolContext::new("hangzhou", "nodepool", NGINX_INGRESS_CONTROLLER_VERSION)
    }

    #[test]
    fn test_pool_naming() {
        let ctx = ctx();
        assert_eq!(ctx.namespace, "nodepool-hangzhou");
        assert_eq!(ctx.webhook_name(), "webhook-admission-nodepool-hangzhou");
        assert_eq!(ctx.cluster_role_binding_name(), "clusterrole-binding-nodepool-hangzhou");
        assert_eq!(
            ctx.webhook_cluster_role_binding_name(),
            "webhook-clusterrole-binding-nodepool-hangzhou"
        );
    }

    #[test]
    fn test_render_reports_missing_placeholder() {
        let renderer = ManifestRenderer::new().unwrap();
        let mut subs = ctx().substitutions();
        subs.remove("pool_name");
        let err = renderer.render(Template::ControllerDeployment, &subs).unwrap_err();
        match err {
            ManifestError::MissingSubstitution { template, key } => {
                assert_eq!(template, "controller-deployment");
                assert_eq!(key, "pool_name");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_every_template_renders_and_parses() {
        let renderer = ManifestRenderer::new().unwrap();
        let ctx = ctx();
        for template in Template::ALL {
            let obj = renderer
                .render_object(template, &ctx)
                .unwrap_or_else(|e| panic!("{} failed: {e}", template.name()));
            assert_eq!(obj.kind(), template.kind());
            assert!(!obj.key().name.is_empty(), "{} has no name", template.name());
            if obj.kind().is_namespaced() {
                assert_eq!(obj.key().namespace.as_deref(), Some("nodepool-hangzhou"));
            }
        }
    }

    #[test]
    fn test_pool_specific_names() {
        let renderer = ManifestRenderer::new().unwrap();
        let ctx = ctx();
        let crb = renderer
            .render_object(Template::ControllerClusterRoleBinding, &ctx)
            .unwrap();
        assert_eq!(crb.key().name, ctx.cluster_role_binding_name());

        let vwc = renderer.render_object(Template::ValidatingWebhook, &ctx).unwrap();
        assert_eq!(vwc.kind(), ObjectKind::ValidatingWebhookConfiguration);
        assert_eq!(vwc.key().name, "webhook-admission-nodepool-hangzhou");
    }

    #[test]
    fn test_deployment_embeds_election_id() {
        let renderer = ManifestRenderer::new().unwrap();
        let text = renderer
            .render(Template::ControllerDeployment, &ctx().substitutions())
            .unwrap();
        assert!(text.contains("--election-id=ingress-controller-leader-edge-hangzhou"));
        assert!(text.contains("controller:v0.48.1"));

        let text = renderer
            .render(Template::AdmissionDeployment, &ctx().substitutions())
            .unwrap();
        assert!(text.contains("--election-id=ingress-controller-leader-cloud-hangzhou"));
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        let renderer = ManifestRenderer::new().unwrap();
        let err = renderer
            .parse("apiVersion: v1\nkind: Secret\nmetadata:\n  name: x\n")
            .unwrap_err();
        assert!(matches!(err, ManifestError::UnsupportedKind(k) if k == "Secret"));
    }

    #[test]
    fn test_parse_requires_kind() {
        let renderer = ManifestRenderer::new().unwrap();
        let err = renderer.parse("apiVersion: v1\nmetadata:\n  name: x\n").unwrap_err();
        assert!(matches!(err, ManifestError::MissingKind));
    }
}

//! # Validator
//!
//! Admission rules for an ingress singleton:
//!
//! - the object must carry the singleton name
//! - every declared pool must match an existing `NodePool`
//!
//! Delete requests validate the old object; `Connect` is always allowed.

use super::WebhookError;
use crate::cluster::{ObjectClient, ObjectKind};
use kube::api::DynamicObject;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

impl From<&kube::core::admission::Operation> for Operation {
    fn from(op: &kube::core::admission::Operation) -> Self {
        use kube::core::admission::Operation as Op;
        match op {
            Op::Create => Operation::Create,
            Op::Update => Operation::Update,
            Op::Delete => Operation::Delete,
            Op::Connect => Operation::Connect,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    pub reason: String,
}

impl Verdict {
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }

    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// The parts of an ingress singleton the rules look at
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdmittedObject {
    pub name: String,
    pub pools: Vec<String>,
}

#[derive(Deserialize, Default)]
struct SpecView {
    #[serde(default)]
    pools: Option<Vec<String>>,
}

impl AdmittedObject {
    /// Extract name and `spec.pools` from an untyped admission object
    ///
    /// # Errors
    ///
    /// [`WebhookError::Decode`] when `spec` is not shaped like an ingress spec.
    pub fn from_dynamic(obj: &DynamicObject) -> Result<Self, WebhookError> {
        let spec = match obj.data.get("spec") {
            Some(spec) if !spec.is_null() => serde_json::from_value::<SpecView>(spec.clone())?,
            _ => SpecView::default(),
        };
        Ok(Self {
            name: obj.metadata.name.clone().unwrap_or_default(),
            pools: spec.pools.unwrap_or_default(),
        })
    }
}

/// Validates admission requests for one singleton kind
pub struct Validator {
    objects: Arc<dyn ObjectClient>,
    kind: &'static str,
    singleton_name: String,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("kind", &self.kind)
            .field("singleton_name", &self.singleton_name)
            .finish_non_exhaustive()
    }
}

impl Validator {
    pub fn new(
        objects: Arc<dyn ObjectClient>,
        kind: &'static str,
        singleton_name: impl Into<String>,
    ) -> Self {
        Self {
            objects,
            kind,
            singleton_name: singleton_name.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub async fn validate(
        &self,
        operation: Operation,
        new: Option<&AdmittedObject>,
        old: Option<&AdmittedObject>,
    ) -> Verdict {
        let subject = match operation {
            Operation::Connect => return Verdict::allow(),
            Operation::Create | Operation::Update => new,
            Operation::Delete => old,
        };
        let Some(obj) = subject else {
            return Verdict::deny(format!(
                "{operation:?} request for {} carries no object",
                self.kind
            ));
        };

        if obj.name != self.singleton_name {
            let reason = format!(
                "please name {} with {} instead of {}",
                self.kind, self.singleton_name, obj.name
            );
            warn!(kind = self.kind, name = %obj.name, "rejecting non-singleton object");
            return Verdict::deny(reason);
        }

        self.validate_pools(&obj.pools).await
    }

    async fn validate_pools(&self, pools: &[String]) -> Verdict {
        if pools.is_empty() {
            return Verdict::allow();
        }

        let existing = match self.objects.list_names(ObjectKind::NodePool, None).await {
            Ok(names) => names,
            Err(e) => {
                warn!(kind = self.kind, error = %e, "failed to list node pools");
                return Verdict::deny(format!("failed to list node pools: {e}"));
            }
        };

        if let Some(missing) = pools.iter().find(|pool| !existing.contains(pool)) {
            warn!(kind = self.kind, pool = %missing, "rejecting unknown node pool");
            return Verdict::deny(format!("{missing} does not exist in the cluster"));
        }

        debug!(kind = self.kind, pools = ?pools, "all declared pools exist");
        Verdict::allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_dynamic_reads_pools() {
        let obj: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "apps.openyurt.io/v1alpha1",
            "kind": "YurtIngress",
            "metadata": {"name": "yurtingress-singleton"},
            "spec": {"ingress_controller_replicas_per_pool": 2, "pools": ["a", "b"]}
        }))
        .unwrap();
        let admitted = AdmittedObject::from_dynamic(&obj).unwrap();
        assert_eq!(admitted.name, "yurtingress-singleton");
        assert_eq!(admitted.pools, vec!["a", "b"]);
    }

    #[test]
    fn test_from_dynamic_without_spec() {
        let obj: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "apps.openyurt.io/v1alpha1",
            "kind": "YurtIngress",
            "metadata": {"name": "x"}
        }))
        .unwrap();
        assert!(AdmittedObject::from_dynamic(&obj).unwrap().pools.is_empty());
    }

    #[test]
    fn test_from_dynamic_rejects_bad_pools() {
        let obj: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "apps.openyurt.io/v1alpha1",
            "kind": "YurtIngress",
            "metadata": {"name": "x"},
            "spec": {"pools": "not-a-list"}
        }))
        .unwrap();
        assert!(AdmittedObject::from_dynamic(&obj).is_err());
    }
}

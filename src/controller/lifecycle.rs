//! # Pool Resource Lifecycle
//!
//! Creates, deletes and scales the ingress stack of a single node pool, plus the two
//! ClusterRoles shared by every pool.
//!
//! The order of every operation is an explicit plan ([`POOL_CREATE_PLAN`],
//! [`POOL_DELETE_PLAN`], [`SHARED_CREATE_PLAN`], [`SHARED_DELETE_PLAN`]).
//!
//! ## Failure handling
//!
//! - Namespace creation failing (other than `AlreadyExists`) aborts the pool
//! - Any other failed step is logged and collected; the remaining steps still run
//! - Creates tolerate `AlreadyExists`, deletes tolerate `NotFound`, so a later pass
//!   only redoes what is missing

use crate::cluster::{ClusterError, ObjectClient, ObjectKey};
use crate::constants::WEBHOOK_DEPLOYMENT_REPLICAS;
use crate::controller::backoff::{RetryPolicy, Sleeper};
use crate::manifest::{ManifestError, ManifestObject, ManifestRenderer, PoolContext, Template};
use crate::observability::metrics;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Creation order of a pool stack; the namespace always comes first
pub const POOL_CREATE_PLAN: [Template; 17] = [
    Template::PoolNamespace,
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

/// Teardown order of a pool stack; the namespace always comes last
pub const POOL_DELETE_PLAN: [Template; 17] = [
    Template::ControllerDeployment,
    Template::AdmissionDeployment,
    Template::WebhookPatchJob,
    Template::CertificateJob,
    Template::ValidatingWebhook,
    Template::AdmissionService,
    Template::AdmissionRoleBinding,
    Template::AdmissionRole,
    Template::AdmissionServiceAccount,
    Template::ControllerService,
    Template::ControllerRoleBinding,
    Template::ControllerRole,
    Template::ControllerConfigMap,
    Template::ControllerServiceAccount,
    Template::AdmissionClusterRoleBinding,
    Template::ControllerClusterRoleBinding,
    Template::PoolNamespace,
];

pub const SHARED_CREATE_PLAN: [Template; 2] =
    [Template::ControllerClusterRole, Template::AdmissionClusterRole];

pub const SHARED_DELETE_PLAN: [Template; 2] =
    [Template::AdmissionClusterRole, Template::ControllerClusterRole];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Delete,
    Scale,
}

impl Operation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Delete => "delete",
            Operation::Scale => "scale",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single step failed
#[derive(Debug, Error)]
pub enum StepError {
    #[error("render failed: {0}")]
    Render(#[from] ManifestError),
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

#[derive(Debug)]
pub struct StepFailure {
    pub template: Template,
    pub error: StepError,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.template.name(), self.error)
    }
}

fn summarize(failures: &[StepFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("namespace {namespace} for pool {pool} could not be created: {source}")]
    Namespace {
        pool: String,
        namespace: String,
        #[source]
        source: StepError,
    },
    #[error("{operation} of {target} incomplete: {}", summarize(.failures))]
    Incomplete {
        operation: Operation,
        target: String,
        failures: Vec<StepFailure>,
    },
    #[error("scaling pool {pool} to {replicas} replicas failed: {source}")]
    Scale {
        pool: String,
        replicas: i32,
        #[source]
        source: StepError,
    },
}

/// Drives the per-pool and shared object plans against an [`ObjectClient`]
pub struct LifecycleOrchestrator {
    objects: Arc<dyn ObjectClient>,
    renderer: ManifestRenderer,
    namespace_prefix: String,
    controller_version: String,
    scale_policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for LifecycleOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleOrchestrator")
            .field("namespace_prefix", &self.namespace_prefix)
            .field("controller_version", &self.controller_version)
            .field("scale_policy", &self.scale_policy)
            .finish_non_exhaustive()
    }
}

impl LifecycleOrchestrator {
    pub fn new(
        objects: Arc<dyn ObjectClient>,
        renderer: ManifestRenderer,
        namespace_prefix: impl Into<String>,
        controller_version: impl Into<String>,
        scale_policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            objects,
            renderer,
            namespace_prefix: namespace_prefix.into(),
            controller_version: controller_version.into(),
            scale_policy,
            sleeper,
        }
    }

    #[must_use]
    pub fn pool_context(&self, pool: &str) -> PoolContext {
        PoolContext::new(pool, &self.namespace_prefix, &self.controller_version)
    }

    /// Rendered object for one step, with the replica count a deployment should run
    fn render(
        &self,
        template: Template,
        ctx: &PoolContext,
        replicas: i32,
    ) -> Result<ManifestObject, StepError> {
        let mut obj = self.renderer.render_object(template, ctx)?;
        match template {
            Template::ControllerDeployment => {
                obj.set_replicas(replicas);
            }
            Template::AdmissionDeployment => {
                obj.set_replicas(WEBHOOK_DEPLOYMENT_REPLICAS);
            }
            _ => {}
        }
        Ok(obj)
    }

    async fn create_step(
        &self,
        template: Template,
        ctx: &PoolContext,
        replicas: i32,
    ) -> Result<(), StepError> {
        let obj = self.render(template, ctx, replicas)?;
        let key = obj.key();
        match self.objects.create(&obj).await {
            Ok(()) => {
                info!(pool = %ctx.pool, object = %key, "created");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                debug!(pool = %ctx.pool, object = %key, "already exists");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_step(&self, template: Template, ctx: &PoolContext) -> Result<(), StepError> {
        let key = self.render(template, ctx, 0)?.key();
        match self.objects.delete(&key).await {
            Ok(()) => {
                info!(pool = %ctx.pool, object = %key, "deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(pool = %ctx.pool, object = %key, "already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create the full stack of `pool` with `replicas` ingress-controller replicas.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Namespace`] when the namespace cannot be created (nothing else
    /// is attempted), otherwise [`LifecycleError::Incomplete`] listing every failed step.
    pub async fn create_pool(&self, pool: &str, replicas: i32) -> Result<(), LifecycleError> {
        let ctx = self.pool_context(pool);
        info!(pool = %pool, namespace = %ctx.namespace, replicas, "creating ingress stack");

        let mut failures = Vec::new();
        for template in POOL_CREATE_PLAN {
            match self.create_step(template, &ctx, replicas).await {
                Ok(()) => {}
                Err(source) if template == Template::PoolNamespace => {
                    error!(
                        pool = %pool,
                        namespace = %ctx.namespace,
                        error = %source,
                        "namespace creation failed"
                    );
                    metrics::record_pool_operation(Operation::Create.as_str(), "error");
                    return Err(LifecycleError::Namespace {
                        pool: pool.to_string(),
                        namespace: ctx.namespace,
                        source,
                    });
                }
                Err(error) => {
                    error!(
                        pool = %pool,
                        step = template.name(),
                        error = %error,
                        "create step failed"
                    );
                    failures.push(StepFailure { template, error });
                }
            }
        }
        finish(Operation::Create, format!("pool {pool}"), failures)
    }

    /// Tear down the full stack of `pool`, namespace last.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Incomplete`] listing every step that failed; all steps are attempted.
    pub async fn delete_pool(&self, pool: &str) -> Result<(), LifecycleError> {
        let ctx = self.pool_context(pool);
        info!(pool = %pool, namespace = %ctx.namespace, "deleting ingress stack");

        let mut failures = Vec::new();
        for template in POOL_DELETE_PLAN {
            if let Err(error) = self.delete_step(template, &ctx).await {
                error!(pool = %pool, step = template.name(), error = %error, "delete step failed");
                failures.push(StepFailure { template, error });
            }
        }
        finish(Operation::Delete, format!("pool {pool}"), failures)
    }

    /// Create the ClusterRoles shared by every pool.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Incomplete`] listing the roles that could not be created.
    pub async fn create_shared(&self) -> Result<(), LifecycleError> {
        let ctx = self.pool_context("");
        let mut failures = Vec::new();
        for template in SHARED_CREATE_PLAN {
            if let Err(error) = self.create_step(template, &ctx, 0).await {
                error!(step = template.name(), error = %error, "shared create step failed");
                failures.push(StepFailure { template, error });
            }
        }
        finish(Operation::Create, "shared cluster roles".to_string(), failures)
    }

    /// Delete the ClusterRoles shared by every pool.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Incomplete`] listing the roles that could not be deleted.
    pub async fn delete_shared(&self) -> Result<(), LifecycleError> {
        let ctx = self.pool_context("");
        let mut failures = Vec::new();
        for template in SHARED_DELETE_PLAN {
            if let Err(error) = self.delete_step(template, &ctx).await {
                error!(step = template.name(), error = %error, "shared delete step failed");
                failures.push(StepFailure { template, error });
            }
        }
        finish(Operation::Delete, "shared cluster roles".to_string(), failures)
    }

    /// Set the ingress-controller replica count of `pool`, touching nothing else.
    /// A missing deployment is recreated from its template.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Scale`] once conflicts and transient errors exhaust the retry policy.
    pub async fn scale_pool(&self, pool: &str, replicas: i32) -> Result<(), LifecycleError> {
        let ctx = self.pool_context(pool);
        let scale_error = |source: StepError| LifecycleError::Scale {
            pool: pool.to_string(),
            replicas,
            source,
        };
        let rendered = self
            .render(Template::ControllerDeployment, &ctx, replicas)
            .map_err(scale_error)?;
        let key = rendered.key();

        let objects = &self.objects;
        let key_ref = &key;
        let rendered_ref = &rendered;
        let result = self
            .scale_policy
            .run(self.sleeper.as_ref(), ClusterError::is_retryable, move |attempt| async move {
                if attempt > 1 {
                    warn!(object = %key_ref, attempt, "retrying scale");
                }
                match objects.get(key_ref).await {
                    Ok(mut live) => {
                        live.set_replicas(replicas);
                        objects.update(&live).await
                    }
                    Err(e) if e.is_not_found() => objects.create(rendered_ref).await,
                    Err(e) => Err(e),
                }
            })
            .await;

        match result {
            Ok(()) => {
                info!(pool = %pool, object = %key, replicas, "scaled ingress controller");
                metrics::record_pool_operation(Operation::Scale.as_str(), "success");
                Ok(())
            }
            Err(e) => {
                error!(pool = %pool, object = %key, error = %e, "scale failed");
                metrics::record_pool_operation(Operation::Scale.as_str(), "error");
                Err(scale_error(e.into()))
            }
        }
    }

    /// Whether the ingress-controller deployment of `pool` has all replicas ready.
    /// Lookup failures count as not ready.
    pub async fn pool_ready(&self, pool: &str) -> bool {
        let ctx = self.pool_context(pool);
        let key = match self.render(Template::ControllerDeployment, &ctx, 0) {
            Ok(obj) => obj.key(),
            Err(e) => {
                warn!(pool = %pool, error = %e, "cannot resolve ingress controller deployment");
                return false;
            }
        };
        match self.objects.get(&key).await {
            Ok(obj) => obj.deployment_ready(),
            Err(e) => {
                debug!(pool = %pool, object = %key, error = %e, "readiness lookup failed");
                false
            }
        }
    }

    /// Key of the object a template renders to for `pool`
    ///
    /// # Errors
    ///
    /// Propagates render failures.
    pub fn object_key(&self, template: Template, pool: &str) -> Result<ObjectKey, ManifestError> {
        Ok(self.renderer.render_object(template, &self.pool_context(pool))?.key())
    }
}

fn finish(
    operation: Operation,
    target: String,
    failures: Vec<StepFailure>,
) -> Result<(), LifecycleError> {
    if failures.is_empty() {
        metrics::record_pool_operation(operation.as_str(), "success");
        Ok(())
    } else {
        metrics::record_pool_operation(operation.as_str(), "error");
        Err(LifecycleError::Incomplete {
            operation,
            target,
            failures,
        })
    }
}

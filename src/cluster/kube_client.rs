//! # Kubernetes API Client
//!
//! [`ObjectClient`] and [`FleetApi`] backed by typed `kube::Api` handles.

use super::{ClusterError, FleetApi, ObjectClient, ObjectKey, ObjectKind};
use crate::constants::FIELD_MANAGER;
use crate::crd::{IngressFleet, NodePool};
use crate::manifest::ManifestObject;
use async_trait::async_trait;
use k8s_openapi::api::admissionregistration::v1::ValidatingWebhookConfiguration;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::fmt::Debug;

/// Map a kube error onto the controller's error taxonomy
pub fn classify(err: kube::Error, what: &str) -> ClusterError {
    match err {
        kube::Error::Api(api_err) => match api_err.code {
            404 => ClusterError::NotFound(what.to_string()),
            409 if api_err.reason == "AlreadyExists" => {
                ClusterError::AlreadyExists(what.to_string())
            }
            409 => ClusterError::Conflict(what.to_string()),
            429 | 500..=599 => ClusterError::Transient(format!("{what}: {}", api_err.message)),
            _ => ClusterError::Other(format!("{what}: {}", api_err.message)),
        },
        kube::Error::HyperError(e) => ClusterError::Transient(format!("{what}: {e}")),
        kube::Error::Service(e) => ClusterError::Transient(format!("{what}: {e}")),
        other => ClusterError::Other(format!("{what}: {other}")),
    }
}

/// Object client for the resources of a pool stack
#[derive(Clone)]
pub struct KubeObjectClient {
    client: Client,
}

impl std::fmt::Debug for KubeObjectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeObjectClient").finish_non_exhaustive()
    }
}

impl KubeObjectClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn cluster<K>(&self) -> Api<K>
    where
        K: Resource<DynamicType = ()>,
    {
        Api::all(self.client.clone())
    }

    fn namespaced<K>(&self, key: &ObjectKey) -> Result<Api<K>, ClusterError>
    where
        K: Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>,
    {
        match key.namespace.as_deref() {
            Some(ns) => Ok(Api::namespaced(self.client.clone(), ns)),
            None => Err(ClusterError::Other(format!("{key} has no namespace"))),
        }
    }

    fn scoped<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>,
    {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

async fn create_with<K>(api: Api<K>, obj: &K) -> kube::Result<()>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Debug,
{
    api.create(&PostParams::default(), obj).await.map(drop)
}

async fn replace_with<K>(api: Api<K>, obj: &K) -> kube::Result<()>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Debug,
{
    api.replace(&obj.name_any(), &PostParams::default(), obj)
        .await
        .map(drop)
}

async fn delete_with<K>(api: Api<K>, name: &str) -> kube::Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    api.delete(name, &DeleteParams::background()).await.map(drop)
}

async fn names_with<K>(api: Api<K>) -> kube::Result<Vec<String>>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let list = api.list(&ListParams::default()).await?;
    Ok(list.items.iter().map(ResourceExt::name_any).collect())
}

#[async_trait]
impl ObjectClient for KubeObjectClient {
    async fn create(&self, obj: &ManifestObject) -> Result<(), ClusterError> {
        let key = obj.key();
        let result = match obj {
            ManifestObject::Namespace(o) => create_with(self.cluster::<Namespace>(), o).await,
            ManifestObject::ClusterRole(o) => create_with(self.cluster::<ClusterRole>(), o).await,
            ManifestObject::ClusterRoleBinding(o) => {
                create_with(self.cluster::<ClusterRoleBinding>(), o).await
            }
            ManifestObject::ValidatingWebhookConfiguration(o) => {
                create_with(self.cluster::<ValidatingWebhookConfiguration>(), o).await
            }
            ManifestObject::ServiceAccount(o) => {
                create_with(self.namespaced::<ServiceAccount>(&key)?, o).await
            }
            ManifestObject::ConfigMap(o) => {
                create_with(self.namespaced::<ConfigMap>(&key)?, o).await
            }
            ManifestObject::Role(o) => create_with(self.namespaced::<Role>(&key)?, o).await,
            ManifestObject::RoleBinding(o) => {
                create_with(self.namespaced::<RoleBinding>(&key)?, o).await
            }
            ManifestObject::Service(o) => create_with(self.namespaced::<Service>(&key)?, o).await,
            ManifestObject::Deployment(o) => {
                create_with(self.namespaced::<Deployment>(&key)?, o).await
            }
            ManifestObject::Job(o) => create_with(self.namespaced::<Job>(&key)?, o).await,
        };
        result.map_err(|e| classify(e, &key.to_string()))
    }

    async fn update(&self, obj: &ManifestObject) -> Result<(), ClusterError> {
        let key = obj.key();
        let result = match obj {
            ManifestObject::Namespace(o) => replace_with(self.cluster::<Namespace>(), o).await,
            ManifestObject::ClusterRole(o) => replace_with(self.cluster::<ClusterRole>(), o).await,
            ManifestObject::ClusterRoleBinding(o) => {
                replace_with(self.cluster::<ClusterRoleBinding>(), o).await
            }
            ManifestObject::ValidatingWebhookConfiguration(o) => {
                replace_with(self.cluster::<ValidatingWebhookConfiguration>(), o).await
            }
            ManifestObject::ServiceAccount(o) => {
                replace_with(self.namespaced::<ServiceAccount>(&key)?, o).await
            }
            ManifestObject::ConfigMap(o) => {
                replace_with(self.namespaced::<ConfigMap>(&key)?, o).await
            }
            ManifestObject::Role(o) => replace_with(self.namespaced::<Role>(&key)?, o).await,
            ManifestObject::RoleBinding(o) => {
                replace_with(self.namespaced::<RoleBinding>(&key)?, o).await
            }
            ManifestObject::Service(o) => replace_with(self.namespaced::<Service>(&key)?, o).await,
            ManifestObject::Deployment(o) => {
                replace_with(self.namespaced::<Deployment>(&key)?, o).await
            }
            ManifestObject::Job(o) => replace_with(self.namespaced::<Job>(&key)?, o).await,
        };
        result.map_err(|e| classify(e, &key.to_string()))
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), ClusterError> {
        let name = key.name.as_str();
        let result = match key.kind {
            ObjectKind::Namespace => delete_with(self.cluster::<Namespace>(), name).await,
            ObjectKind::ClusterRole => delete_with(self.cluster::<ClusterRole>(), name).await,
            ObjectKind::ClusterRoleBinding => {
                delete_with(self.cluster::<ClusterRoleBinding>(), name).await
            }
            ObjectKind::ValidatingWebhookConfiguration => {
                delete_with(self.cluster::<ValidatingWebhookConfiguration>(), name).await
            }
            ObjectKind::NodePool => {
                return Err(ClusterError::Other(format!("{key} is read-only to this controller")))
            }
            ObjectKind::ServiceAccount => {
                delete_with(self.namespaced::<ServiceAccount>(key)?, name).await
            }
            ObjectKind::ConfigMap => delete_with(self.namespaced::<ConfigMap>(key)?, name).await,
            ObjectKind::Role => delete_with(self.namespaced::<Role>(key)?, name).await,
            ObjectKind::RoleBinding => {
                delete_with(self.namespaced::<RoleBinding>(key)?, name).await
            }
            ObjectKind::Service => delete_with(self.namespaced::<Service>(key)?, name).await,
            ObjectKind::Deployment => delete_with(self.namespaced::<Deployment>(key)?, name).await,
            ObjectKind::Job => delete_with(self.namespaced::<Job>(key)?, name).await,
        };
        result.map_err(|e| classify(e, &key.to_string()))
    }

    async fn get(&self, key: &ObjectKey) -> Result<ManifestObject, ClusterError> {
        let name = key.name.as_str();
        let what = key.to_string();
        let obj = match key.kind {
            ObjectKind::Namespace => self
                .cluster::<Namespace>()
                .get(name)
                .await
                .map(ManifestObject::Namespace),
            ObjectKind::ClusterRole => self
                .cluster::<ClusterRole>()
                .get(name)
                .await
                .map(ManifestObject::ClusterRole),
            ObjectKind::ClusterRoleBinding => self
                .cluster::<ClusterRoleBinding>()
                .get(name)
                .await
                .map(ManifestObject::ClusterRoleBinding),
            ObjectKind::ValidatingWebhookConfiguration => self
                .cluster::<ValidatingWebhookConfiguration>()
                .get(name)
                .await
                .map(ManifestObject::ValidatingWebhookConfiguration),
            ObjectKind::ServiceAccount => self
                .namespaced::<ServiceAccount>(key)?
                .get(name)
                .await
                .map(ManifestObject::ServiceAccount),
            ObjectKind::ConfigMap => self
                .namespaced::<ConfigMap>(key)?
                .get(name)
                .await
                .map(ManifestObject::ConfigMap),
            ObjectKind::Role => self
                .namespaced::<Role>(key)?
                .get(name)
                .await
                .map(ManifestObject::Role),
            ObjectKind::RoleBinding => self
                .namespaced::<RoleBinding>(key)?
                .get(name)
                .await
                .map(ManifestObject::RoleBinding),
            ObjectKind::Service => self
                .namespaced::<Service>(key)?
                .get(name)
                .await
                .map(ManifestObject::Service),
            ObjectKind::Deployment => self
                .namespaced::<Deployment>(key)?
                .get(name)
                .await
                .map(ManifestObject::Deployment),
            ObjectKind::Job => self
                .namespaced::<Job>(key)?
                .get(name)
                .await
                .map(ManifestObject::Job),
            ObjectKind::NodePool => {
                return Err(ClusterError::Other(format!(
                    "{what} cannot be read as a manifest object"
                )))
            }
        };
        obj.map_err(|e| classify(e, &what))
    }

    async fn list_names(
        &self,
        kind: ObjectKind,
        namespace: Option<&str>,
    ) -> Result<Vec<String>, ClusterError> {
        let result = match kind {
            ObjectKind::Namespace => names_with(self.cluster::<Namespace>()).await,
            ObjectKind::ClusterRole => names_with(self.cluster::<ClusterRole>()).await,
            ObjectKind::ClusterRoleBinding => {
                names_with(self.cluster::<ClusterRoleBinding>()).await
            }
            ObjectKind::ValidatingWebhookConfiguration => {
                names_with(self.cluster::<ValidatingWebhookConfiguration>()).await
            }
            ObjectKind::NodePool => names_with(self.cluster::<NodePool>()).await,
            ObjectKind::ServiceAccount => {
                names_with(self.scoped::<ServiceAccount>(namespace)).await
            }
            ObjectKind::ConfigMap => names_with(self.scoped::<ConfigMap>(namespace)).await,
            ObjectKind::Role => names_with(self.scoped::<Role>(namespace)).await,
            ObjectKind::RoleBinding => names_with(self.scoped::<RoleBinding>(namespace)).await,
            ObjectKind::Service => names_with(self.scoped::<Service>(namespace)).await,
            ObjectKind::Deployment => names_with(self.scoped::<Deployment>(namespace)).await,
            ObjectKind::Job => names_with(self.scoped::<Job>(namespace)).await,
        };
        result.map_err(|e| classify(e, kind.as_str()))
    }
}

/// Access to one ingress singleton kind through its typed API
pub struct KubeFleetApi<R: IngressFleet> {
    api: Api<R>,
}

impl<R: IngressFleet> std::fmt::Debug for KubeFleetApi<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeFleetApi").field("kind", &R::KIND).finish()
    }
}

impl<R: IngressFleet> KubeFleetApi<R> {
    pub fn new(api: Api<R>) -> Self {
        Self { api }
    }

    fn patch_params() -> PatchParams {
        PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PatchParams::default()
        }
    }
}

#[async_trait]
impl<R: IngressFleet> FleetApi<R> for KubeFleetApi<R> {
    async fn get(&self, name: &str) -> Result<R, ClusterError> {
        self.api
            .get(name)
            .await
            .map_err(|e| classify(e, &format!("{}/{name}", R::KIND)))
    }

    async fn create(&self, obj: &R) -> Result<R, ClusterError> {
        self.api
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| classify(e, &format!("{}/{}", R::KIND, obj.name_any())))
    }

    async fn patch_status(&self, name: &str, patch: &serde_json::Value) -> Result<R, ClusterError> {
        self.api
            .patch_status(name, &Self::patch_params(), &Patch::Merge(patch))
            .await
            .map_err(|e| classify(e, &format!("{}/{name} status", R::KIND)))
    }

    async fn set_finalizers(&self, name: &str, finalizers: Vec<String>) -> Result<R, ClusterError> {
        let patch = json!({ "metadata": { "finalizers": finalizers } });
        self.api
            .patch(name, &Self::patch_params(), &Patch::Merge(&patch))
            .await
            .map_err(|e| classify(e, &format!("{}/{name} finalizers", R::KIND)))
    }
}

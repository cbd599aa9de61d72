//! # In-Memory Cluster
//!
//! Process-local object store implementing [`ObjectClient`] and [`FleetApi`].
//!
//! Mirrors the API server behavior the controller depends on:
//!
//! - creating an existing object is `AlreadyExists`
//! - namespaced objects need their namespace to exist
//! - deleting a namespace removes everything inside it
//! - clearing the finalizers of a deleting singleton removes it
//!
//! Every call is appended to an operation log, and failures can be injected per
//! operation and kind.

use super::{ClusterError, FleetApi, ObjectClient, ObjectKey, ObjectKind};
use crate::crd::IngressFleet;
use crate::manifest::ManifestObject;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::DeploymentStatus;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Operation recorded by [`MemoryCluster`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Create(ObjectKey),
    Update(ObjectKey),
    Delete(ObjectKey),
    Get(ObjectKey),
    List(ObjectKind),
    FleetCreate(String),
    PatchStatus(String),
    SetFinalizers(String),
}

/// Operation class targeted by an injected failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    Update,
    Delete,
    Get,
    List,
    FleetGet,
    FleetCreate,
    PatchStatus,
    SetFinalizers,
}

#[derive(Debug)]
struct Failure {
    verb: Verb,
    kind: Option<ObjectKind>,
    name: Option<String>,
    error: ClusterError,
    remaining: usize,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<ObjectKey, ManifestObject>,
    node_pools: BTreeSet<String>,
    fleets: BTreeMap<(String, String), Value>,
    ops: Vec<Op>,
    failures: Vec<Failure>,
    resource_version: u64,
}

impl State {
    fn next_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }

    fn take_failure(
        &mut self,
        verb: Verb,
        kind: Option<ObjectKind>,
        name: &str,
    ) -> Option<ClusterError> {
        let failure = self.failures.iter_mut().find(|f| {
            f.verb == verb
                && f.remaining > 0
                && (f.kind.is_none() || f.kind == kind)
                && f.name.as_deref().is_none_or(|n| n == name)
        })?;
        failure.remaining -= 1;
        Some(failure.error.clone())
    }

    fn namespace_exists(&self, namespace: &str) -> bool {
        self.objects
            .contains_key(&ObjectKey::cluster(ObjectKind::Namespace, namespace))
    }
}

#[derive(Debug, Default)]
pub struct MemoryCluster {
    state: Mutex<State>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next `times` calls of `verb` (optionally only for `kind`)
    pub fn fail(&self, verb: Verb, kind: Option<ObjectKind>, error: ClusterError, times: usize) {
        self.lock().failures.push(Failure {
            verb,
            kind,
            name: None,
            error,
            remaining: times,
        });
    }

    /// Fail the next `times` calls of `verb` against the object named `name`
    pub fn fail_named(
        &self,
        verb: Verb,
        kind: ObjectKind,
        name: &str,
        error: ClusterError,
        times: usize,
    ) {
        self.lock().failures.push(Failure {
            verb,
            kind: Some(kind),
            name: Some(name.to_string()),
            error,
            remaining: times,
        });
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn add_node_pool(&self, name: &str) {
        self.lock().node_pools.insert(name.to_string());
    }

    /// Store an object directly, bypassing the log and existence checks
    pub fn seed(&self, obj: ManifestObject) {
        let mut state = self.lock();
        state.objects.insert(obj.key(), obj);
    }

    /// Store a singleton directly, bypassing the log
    pub fn seed_fleet<R: IngressFleet>(&self, obj: &R) {
        let mut state = self.lock();
        let name = obj.meta().name.clone().unwrap_or_default();
        if let Ok(value) = serde_json::to_value(obj) {
            state.fleets.insert((R::KIND.to_string(), name), value);
        }
    }

    pub fn fleet<R: IngressFleet>(&self, name: &str) -> Option<R> {
        let state = self.lock();
        state
            .fleets
            .get(&(R::KIND.to_string(), name.to_string()))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set a deletion timestamp, as the API server does when a finalized object is deleted
    pub fn mark_deleting<R: IngressFleet>(&self, name: &str) {
        let mut state = self.lock();
        if let Some(value) = state.fleets.get_mut(&(R::KIND.to_string(), name.to_string())) {
            value["metadata"]["deletionTimestamp"] =
                Value::String("2026-01-01T00:00:00Z".to_string());
        }
    }

    /// Report `ready` ready replicas on a deployment
    pub fn set_ready_replicas(&self, key: &ObjectKey, ready: i32) {
        let mut state = self.lock();
        if let Some(ManifestObject::Deployment(d)) = state.objects.get_mut(key) {
            d.status = Some(DeploymentStatus {
                ready_replicas: Some(ready),
                ..Default::default()
            });
        }
    }

    #[must_use]
    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.lock().objects.contains_key(key)
    }

    #[must_use]
    pub fn object(&self, key: &ObjectKey) -> Option<ManifestObject> {
        self.lock().objects.get(key).cloned()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<ObjectKey> {
        self.lock().objects.keys().cloned().collect()
    }

    /// Keys of every object inside `namespace`
    #[must_use]
    pub fn keys_in(&self, namespace: &str) -> Vec<ObjectKey> {
        self.lock()
            .objects
            .keys()
            .filter(|k| k.namespace.as_deref() == Some(namespace))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn ops(&self) -> Vec<Op> {
        self.lock().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.lock().ops.clear();
    }
}

#[async_trait]
impl ObjectClient for MemoryCluster {
    async fn create(&self, obj: &ManifestObject) -> Result<(), ClusterError> {
        let key = obj.key();
        let mut state = self.lock();
        state.ops.push(Op::Create(key.clone()));
        if let Some(err) = state.take_failure(Verb::Create, Some(key.kind), &key.name) {
            return Err(err);
        }
        if state.objects.contains_key(&key) {
            return Err(ClusterError::AlreadyExists(key.to_string()));
        }
        if let Some(ns) = key.namespace.as_deref() {
            if !state.namespace_exists(ns) {
                return Err(ClusterError::NotFound(format!("namespace/{ns}")));
            }
        }
        let mut stored = obj.clone();
        stored.meta_mut().resource_version = Some(state.next_version());
        state.objects.insert(key, stored);
        Ok(())
    }

    async fn update(&self, obj: &ManifestObject) -> Result<(), ClusterError> {
        let key = obj.key();
        let mut state = self.lock();
        state.ops.push(Op::Update(key.clone()));
        if let Some(err) = state.take_failure(Verb::Update, Some(key.kind), &key.name) {
            return Err(err);
        }
        let Some(current) = state.objects.get(&key) else {
            return Err(ClusterError::NotFound(key.to_string()));
        };
        let expected = obj.meta().resource_version.as_deref();
        if expected.is_some() && expected != current.meta().resource_version.as_deref() {
            return Err(ClusterError::Conflict(key.to_string()));
        }
        let mut stored = obj.clone();
        stored.meta_mut().resource_version = Some(state.next_version());
        state.objects.insert(key, stored);
        Ok(())
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), ClusterError> {
        let mut state = self.lock();
        state.ops.push(Op::Delete(key.clone()));
        if let Some(err) = state.take_failure(Verb::Delete, Some(key.kind), &key.name) {
            return Err(err);
        }
        if key.kind == ObjectKind::NodePool {
            return Err(ClusterError::Other(format!("{key} is read-only to this controller")));
        }
        if state.objects.remove(key).is_none() {
            return Err(ClusterError::NotFound(key.to_string()));
        }
        if key.kind == ObjectKind::Namespace {
            state
                .objects
                .retain(|k, _| k.namespace.as_deref() != Some(key.name.as_str()));
        }
        Ok(())
    }

    async fn get(&self, key: &ObjectKey) -> Result<ManifestObject, ClusterError> {
        let mut state = self.lock();
        state.ops.push(Op::Get(key.clone()));
        if let Some(err) = state.take_failure(Verb::Get, Some(key.kind), &key.name) {
            return Err(err);
        }
        state
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(key.to_string()))
    }

    async fn list_names(
        &self,
        kind: ObjectKind,
        namespace: Option<&str>,
    ) -> Result<Vec<String>, ClusterError> {
        let mut state = self.lock();
        state.ops.push(Op::List(kind));
        if let Some(err) = state.take_failure(Verb::List, Some(kind), "") {
            return Err(err);
        }
        if kind == ObjectKind::NodePool {
            return Ok(state.node_pools.iter().cloned().collect());
        }
        Ok(state
            .objects
            .keys()
            .filter(|k| {
                k.kind == kind && (namespace.is_none() || k.namespace.as_deref() == namespace)
            })
            .map(|k| k.name.clone())
            .collect())
    }
}

/// RFC 7386 JSON merge patch
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

fn decode<R: IngressFleet>(value: &Value) -> Result<R, ClusterError> {
    serde_json::from_value(value.clone()).map_err(|e| ClusterError::Other(e.to_string()))
}

#[async_trait]
impl<R: IngressFleet> FleetApi<R> for MemoryCluster {
    async fn get(&self, name: &str) -> Result<R, ClusterError> {
        let mut state = self.lock();
        if let Some(err) = state.take_failure(Verb::FleetGet, None, name) {
            return Err(err);
        }
        let value = state
            .fleets
            .get(&(R::KIND.to_string(), name.to_string()))
            .ok_or_else(|| ClusterError::NotFound(format!("{}/{name}", R::KIND)))?;
        decode(value)
    }

    async fn create(&self, obj: &R) -> Result<R, ClusterError> {
        let name = obj.meta().name.clone().unwrap_or_default();
        let mut state = self.lock();
        state.ops.push(Op::FleetCreate(name.clone()));
        if let Some(err) = state.take_failure(Verb::FleetCreate, None, &name) {
            return Err(err);
        }
        let fleet_key = (R::KIND.to_string(), name.clone());
        if state.fleets.contains_key(&fleet_key) {
            return Err(ClusterError::AlreadyExists(format!("{}/{name}", R::KIND)));
        }
        let mut value = serde_json::to_value(obj).map_err(|e| ClusterError::Other(e.to_string()))?;
        value["metadata"]["resourceVersion"] = Value::String(state.next_version());
        let created = decode(&value)?;
        state.fleets.insert(fleet_key, value);
        Ok(created)
    }

    async fn patch_status(&self, name: &str, patch: &Value) -> Result<R, ClusterError> {
        let mut state = self.lock();
        state.ops.push(Op::PatchStatus(name.to_string()));
        if let Some(err) = state.take_failure(Verb::PatchStatus, None, name) {
            return Err(err);
        }
        let version = state.next_version();
        let value = state
            .fleets
            .get_mut(&(R::KIND.to_string(), name.to_string()))
            .ok_or_else(|| ClusterError::NotFound(format!("{}/{name}", R::KIND)))?;
        if let Some(status) = patch.get("status") {
            merge_patch(&mut value["status"], status);
        }
        value["metadata"]["resourceVersion"] = Value::String(version);
        decode(value)
    }

    async fn set_finalizers(&self, name: &str, finalizers: Vec<String>) -> Result<R, ClusterError> {
        let mut state = self.lock();
        state.ops.push(Op::SetFinalizers(name.to_string()));
        if let Some(err) = state.take_failure(Verb::SetFinalizers, None, name) {
            return Err(err);
        }
        let fleet_key = (R::KIND.to_string(), name.to_string());
        let version = state.next_version();
        let value = state
            .fleets
            .get_mut(&fleet_key)
            .ok_or_else(|| ClusterError::NotFound(format!("{}/{name}", R::KIND)))?;
        let released = finalizers.is_empty() && !value["metadata"]["deletionTimestamp"].is_null();
        value["metadata"]["finalizers"] = Value::from(finalizers);
        value["metadata"]["resourceVersion"] = Value::String(version);
        let updated = decode(value)?;
        if released {
            state.fleets.remove(&fleet_key);
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_patch_replaces_and_removes() {
        let mut target = json!({"a": 1, "b": {"c": 2, "d": 3}});
        merge_patch(&mut target, &json!({"a": null, "b": {"c": 5}, "e": [1]}));
        assert_eq!(target, json!({"b": {"c": 5, "d": 3}, "e": [1]}));
    }

    #[test]
    fn test_merge_patch_into_missing_object() {
        let mut target = Value::Null;
        merge_patch(&mut target, &json!({"pools": ["a"]}));
        assert_eq!(target, json!({"pools": ["a"]}));
    }

    #[tokio::test]
    async fn test_node_pools_cannot_be_deleted() {
        let cluster = MemoryCluster::new();
        cluster.add_node_pool("edge");

        let err = cluster
            .delete(&ObjectKey::cluster(ObjectKind::NodePool, "edge"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClusterError::Other(_)));
        let names = cluster.list_names(ObjectKind::NodePool, None).await.unwrap();
        assert_eq!(names, vec!["edge".to_string()]);
    }
}

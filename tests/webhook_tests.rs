//! # Admission Webhook Tests
//!
//! Singleton naming and pool existence rules, exercised both directly and through
//! full `AdmissionReview` round trips.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use kube::api::DynamicObject;
use kube::core::admission::AdmissionReview;
use nodepool_ingress_controller::cluster::{
    ClusterError, MemoryCluster, ObjectClient, ObjectKind, Verb,
};
use nodepool_ingress_controller::webhook::{
    review, router, AdmittedObject, Operation, Validator, WebhookState,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const YURT_NAME: &str = "yurtingress-singleton";
const NODEPOOL_NAME: &str = "nodepool-ingress";

fn cluster_with_pools(pools: &[&str]) -> Arc<MemoryCluster> {
    let cluster = Arc::new(MemoryCluster::new());
    for pool in pools {
        cluster.add_node_pool(pool);
    }
    cluster
}

fn yurt_validator(cluster: &Arc<MemoryCluster>) -> Validator {
    Validator::new(Arc::clone(cluster) as Arc<dyn ObjectClient>, "YurtIngress", YURT_NAME)
}

fn admitted(name: &str, pools: &[&str]) -> AdmittedObject {
    AdmittedObject {
        name: name.to_string(),
        pools: pools.iter().map(|p| (*p).to_string()).collect(),
    }
}

fn review_body(operation: &str, kind: &str, name: &str, pools: &[&str]) -> Value {
    let object = json!({
        "apiVersion": "apps.openyurt.io/v1alpha1",
        "kind": kind,
        "metadata": { "name": name },
        "spec": { "pools": pools },
    });
    let mut request = json!({
        "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
        "kind": { "group": "apps.openyurt.io", "version": "v1alpha1", "kind": kind },
        "resource": {
            "group": "apps.openyurt.io",
            "version": "v1alpha1",
            "resource": format!("{}s", kind.to_lowercase()),
        },
        "operation": operation,
        "userInfo": {},
        "name": name,
    });
    if operation == "DELETE" {
        request["oldObject"] = object;
    } else {
        request["object"] = object;
    }
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": request,
    })
}

fn parse(body: Value) -> AdmissionReview<DynamicObject> {
    serde_json::from_value(body).unwrap()
}

#[tokio::test]
async fn test_allows_singleton_with_known_pools() {
    let cluster = cluster_with_pools(&["hangzhou", "beijing"]);
    let verdict = yurt_validator(&cluster)
        .validate(Operation::Create, Some(&admitted(YURT_NAME, &["hangzhou", "beijing"])), None)
        .await;
    assert!(verdict.allowed, "{}", verdict.reason);
}

#[tokio::test]
async fn test_rejects_misnamed_singleton() {
    let cluster = cluster_with_pools(&[]);
    let verdict = yurt_validator(&cluster)
        .validate(Operation::Create, Some(&admitted("my-ingress", &[])), None)
        .await;
    assert!(!verdict.allowed);
    assert_eq!(
        verdict.reason,
        "please name YurtIngress with yurtingress-singleton instead of my-ingress"
    );
}

#[tokio::test]
async fn test_rejects_unknown_pool() {
    let cluster = cluster_with_pools(&["hangzhou"]);
    let verdict = yurt_validator(&cluster)
        .validate(
            Operation::Update,
            Some(&admitted(YURT_NAME, &["hangzhou", "shanghai"])),
            Some(&admitted(YURT_NAME, &["hangzhou"])),
        )
        .await;
    assert!(!verdict.allowed);
    assert_eq!(verdict.reason, "shanghai does not exist in the cluster");
}

#[tokio::test]
async fn test_rejects_pools_when_cluster_has_none() {
    let cluster = cluster_with_pools(&[]);
    let verdict = yurt_validator(&cluster)
        .validate(Operation::Create, Some(&admitted(YURT_NAME, &["hangzhou"])), None)
        .await;
    assert!(!verdict.allowed);
}

#[tokio::test]
async fn test_empty_pools_skip_lookup() {
    let cluster = cluster_with_pools(&[]);
    cluster.fail(
        Verb::List,
        Some(ObjectKind::NodePool),
        ClusterError::Transient("down".to_string()),
        1,
    );
    let verdict = yurt_validator(&cluster)
        .validate(Operation::Create, Some(&admitted(YURT_NAME, &[])), None)
        .await;
    assert!(verdict.allowed);
    assert!(cluster.ops().is_empty());
}

#[tokio::test]
async fn test_list_failure_denies() {
    let cluster = cluster_with_pools(&["hangzhou"]);
    cluster.fail(
        Verb::List,
        Some(ObjectKind::NodePool),
        ClusterError::Transient("down".to_string()),
        1,
    );
    let verdict = yurt_validator(&cluster)
        .validate(Operation::Create, Some(&admitted(YURT_NAME, &["hangzhou"])), None)
        .await;
    assert!(!verdict.allowed);
    assert!(verdict.reason.starts_with("failed to list node pools"), "{}", verdict.reason);
}

#[tokio::test]
async fn test_delete_checks_old_object() {
    let cluster = cluster_with_pools(&[]);
    let validator = yurt_validator(&cluster);

    let verdict = validator
        .validate(Operation::Delete, None, Some(&admitted("other", &[])))
        .await;
    assert!(!verdict.allowed);

    let verdict = validator.validate(Operation::Delete, None, None).await;
    assert!(!verdict.allowed);
    assert!(verdict.reason.contains("carries no object"));
}

#[tokio::test]
async fn test_connect_is_allowed() {
    let cluster = cluster_with_pools(&[]);
    let verdict = yurt_validator(&cluster).validate(Operation::Connect, None, None).await;
    assert!(verdict.allowed);
}

#[tokio::test]
async fn test_review_allows_valid_request() {
    let cluster = cluster_with_pools(&["hangzhou"]);
    let body = parse(review_body("CREATE", "YurtIngress", YURT_NAME, &["hangzhou"]));

    let answer = review(&yurt_validator(&cluster), body).await;

    let response = answer.response.unwrap();
    assert!(response.allowed);
    assert_eq!(response.uid, "705ab4f5-6393-11e8-b7cc-42010a800002");
}

#[tokio::test]
async fn test_review_denies_with_reason() {
    let cluster = cluster_with_pools(&["hangzhou"]);
    let body = parse(review_body("CREATE", "YurtIngress", YURT_NAME, &["nowhere"]));

    let answer = review(&yurt_validator(&cluster), body).await;

    assert!(!answer.response.as_ref().unwrap().allowed);
    let serialized = serde_json::to_string(&answer).unwrap();
    assert!(serialized.contains("nowhere does not exist in the cluster"), "{serialized}");
}

#[tokio::test]
async fn test_review_denies_delete_of_misnamed_object() {
    let cluster = cluster_with_pools(&[]);
    let body = parse(review_body("DELETE", "YurtIngress", "stray", &[]));

    let answer = review(&yurt_validator(&cluster), body).await;

    assert!(!answer.response.unwrap().allowed);
}

#[tokio::test]
async fn test_review_rejects_malformed_spec() {
    let cluster = cluster_with_pools(&[]);
    let mut body = review_body("CREATE", "YurtIngress", YURT_NAME, &[]);
    body["request"]["object"]["spec"]["pools"] = json!("not-a-list");

    let answer = review(&yurt_validator(&cluster), parse(body)).await;

    assert!(!answer.response.unwrap().allowed);
}

#[tokio::test]
async fn test_router_dispatches_by_kind() {
    let cluster = cluster_with_pools(&["edge"]);
    let state = Arc::new(WebhookState {
        yurt_ingress: yurt_validator(&cluster),
        nodepool_ingress: Validator::new(
            Arc::clone(&cluster) as Arc<dyn ObjectClient>,
            "NodePoolIngress",
            NODEPOOL_NAME,
        ),
    });
    let body = review_body("CREATE", "NodePoolIngress", NODEPOOL_NAME, &["edge"]);

    let response = router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/validate-nodepoolingress")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let answer: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(answer["response"]["allowed"], true);
}

//! # Singleton Bootstrap Tests

use nodepool_ingress_controller::cluster::{ClusterError, FleetApi, MemoryCluster, Op, Verb};
use nodepool_ingress_controller::config::ControllerConfig;
use nodepool_ingress_controller::controller::backoff::{RecordingSleeper, Sleeper};
use nodepool_ingress_controller::controller::bootstrap::{ensure_singleton, spawn, BootstrapOutcome};
use nodepool_ingress_controller::crd::{NodePoolIngress, YurtIngress};
use std::sync::Arc;
use std::time::Duration;

const NAME: &str = "nodepool-ingress";
const NAMESPACE: &str = "kube-system";

async fn bootstrap(cluster: &MemoryCluster, sleeper: &RecordingSleeper) -> BootstrapOutcome {
    ensure_singleton::<NodePoolIngress>(
        cluster,
        NAME,
        Some(NAMESPACE),
        1,
        ControllerConfig::default().bootstrap_policy(),
        sleeper,
    )
    .await
}

fn create_attempts(cluster: &MemoryCluster) -> usize {
    cluster
        .ops()
        .iter()
        .filter(|op| matches!(op, Op::FleetCreate(_)))
        .count()
}

#[tokio::test]
async fn test_creates_missing_singleton() {
    let cluster = MemoryCluster::new();
    let sleeper = RecordingSleeper::default();

    assert_eq!(bootstrap(&cluster, &sleeper).await, BootstrapOutcome::Created);

    let created = cluster.fleet::<NodePoolIngress>(NAME).unwrap();
    assert_eq!(created.metadata.namespace.as_deref(), Some(NAMESPACE));
    assert_eq!(created.spec.replicas, Some(1));
    assert!(sleeper.slept().is_empty());
}

#[tokio::test]
async fn test_existing_singleton_is_left_alone() {
    let cluster = MemoryCluster::new();
    let sleeper = RecordingSleeper::default();
    bootstrap(&cluster, &sleeper).await;

    assert_eq!(bootstrap(&cluster, &sleeper).await, BootstrapOutcome::AlreadyExists);
    assert_eq!(create_attempts(&cluster), 2);
    assert!(sleeper.slept().is_empty());
}

#[tokio::test]
async fn test_retries_transient_failures() {
    let cluster = MemoryCluster::new();
    let sleeper = RecordingSleeper::default();
    cluster.fail(
        Verb::FleetCreate,
        None,
        ClusterError::Transient("apiserver starting".to_string()),
        2,
    );

    assert_eq!(bootstrap(&cluster, &sleeper).await, BootstrapOutcome::Created);
    assert_eq!(create_attempts(&cluster), 3);
    assert_eq!(sleeper.slept(), vec![Duration::from_secs(2); 2]);
}

#[tokio::test]
async fn test_gives_up_after_bounded_attempts() {
    let cluster = MemoryCluster::new();
    let sleeper = RecordingSleeper::default();
    cluster.fail(
        Verb::FleetCreate,
        None,
        ClusterError::Other("forbidden".to_string()),
        100,
    );

    assert_eq!(bootstrap(&cluster, &sleeper).await, BootstrapOutcome::GaveUp);
    assert_eq!(create_attempts(&cluster), 5);
    assert_eq!(sleeper.slept(), vec![Duration::from_secs(2); 4]);
    assert!(cluster.fleet::<NodePoolIngress>(NAME).is_none());
}

#[tokio::test]
async fn test_spawned_task_reports_outcome() {
    let cluster = Arc::new(MemoryCluster::new());
    let sleeper = Arc::new(RecordingSleeper::default());

    let handle = spawn::<YurtIngress>(
        Arc::clone(&cluster) as Arc<dyn FleetApi<YurtIngress>>,
        "yurtingress-singleton".to_string(),
        None,
        1,
        ControllerConfig::default().bootstrap_policy(),
        Arc::clone(&sleeper) as Arc<dyn Sleeper>,
    );

    assert_eq!(handle.await.unwrap(), BootstrapOutcome::Created);
    let created = cluster.fleet::<YurtIngress>("yurtingress-singleton").unwrap();
    assert!(created.metadata.namespace.is_none());
}

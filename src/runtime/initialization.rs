//! # Initialization
//!
//! Controller startup: rustls setup, tracing, metrics, probe server, Kubernetes
//! client, reconcile contexts, admission webhook and singleton bootstrap.

use crate::cluster::{FleetApi, KubeFleetApi, KubeObjectClient, ObjectClient};
use crate::config::ControllerConfig;
use crate::constants::{
    DEFAULT_INGRESS_CONTROLLER_REPLICAS_PER_POOL, SERVER_POLL_INTERVAL_MS,
    SERVER_STARTUP_TIMEOUT_SECS,
};
use crate::controller::backoff::{Sleeper, TokioSleeper};
use crate::controller::bootstrap;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::{NodePoolIngress, YurtIngress};
use crate::observability::{self, logging::LogFormat};
use crate::webhook::{self, Validator, WebhookState};
use anyhow::{Context, Result};
use kube::{api::Api, Client};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Everything the watch loop needs
pub struct InitializationResult {
    pub config: ControllerConfig,
    pub yurt_ingresses: Api<YurtIngress>,
    pub nodepool_ingresses: Api<NodePoolIngress>,
    pub yurt_reconciler: Arc<Reconciler<YurtIngress>>,
    pub nodepool_reconciler: Arc<Reconciler<NodePoolIngress>>,
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("config", &self.config)
            .field("server_state", &self.server_state)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// # Errors
///
/// Metrics registration, probe server startup, client creation or renderer setup.
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before any TLS connection is made
    let provider_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    let config = ControllerConfig::from_env();
    observability::logging::init(LogFormat::parse(&config.log_format));
    if !provider_installed {
        warn!("rustls crypto provider was already installed");
    }

    info!("Starting NodePool Ingress Controller");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_handle = {
        let state = Arc::clone(&server_state);
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = start_server(port, state).await {
                error!("HTTP server error: {}", e);
            }
        })
    };
    wait_for_server_ready(&server_state, &server_handle).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let objects: Arc<dyn ObjectClient> = Arc::new(KubeObjectClient::new(client.clone()));
    let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);

    let yurt_ingresses: Api<YurtIngress> = Api::all(client.clone());
    let nodepool_ingresses: Api<NodePoolIngress> =
        Api::namespaced(client.clone(), &config.nodepool_ingress_namespace);

    let yurt_fleet: Arc<dyn FleetApi<YurtIngress>> =
        Arc::new(KubeFleetApi::new(yurt_ingresses.clone()));
    let nodepool_fleet: Arc<dyn FleetApi<NodePoolIngress>> =
        Arc::new(KubeFleetApi::new(nodepool_ingresses.clone()));

    let yurt_settings = config.yurt_ingress_settings();
    let nodepool_settings = config.nodepool_ingress_settings();

    if config.enable_webhook {
        let state = Arc::new(WebhookState {
            yurt_ingress: Validator::new(
                Arc::clone(&objects),
                "YurtIngress",
                yurt_settings.singleton_name.clone(),
            ),
            nodepool_ingress: Validator::new(
                Arc::clone(&objects),
                "NodePoolIngress",
                nodepool_settings.singleton_name.clone(),
            ),
        });
        let port = config.webhook_port;
        tokio::spawn(async move {
            if let Err(e) = webhook::start_webhook_server(port, state).await {
                error!("admission webhook server error: {}", e);
            }
        });
    } else {
        info!("admission webhook disabled");
    }

    if config.create_singleton_pool_ingress {
        // Detached; it ends on its own once the singleton exists or attempts run out
        drop(bootstrap::spawn(
            Arc::clone(&nodepool_fleet),
            nodepool_settings.singleton_name.clone(),
            nodepool_settings.namespace.clone(),
            DEFAULT_INGRESS_CONTROLLER_REPLICAS_PER_POOL,
            config.bootstrap_policy(),
            Arc::clone(&sleeper),
        ));
    }

    let yurt_reconciler = Arc::new(
        Reconciler::new(yurt_settings, Arc::clone(&objects), yurt_fleet, Arc::clone(&sleeper))
            .context("Failed to build YurtIngress reconciler")?,
    );
    let nodepool_reconciler = Arc::new(
        Reconciler::new(nodepool_settings, objects, nodepool_fleet, sleeper)
            .context("Failed to build NodePoolIngress reconciler")?,
    );

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        config,
        yurt_ingresses,
        nodepool_ingresses,
        yurt_reconciler,
        nodepool_reconciler,
        server_state,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(SERVER_STARTUP_TIMEOUT_SECS);
    let poll_interval = Duration::from_millis(SERVER_POLL_INTERVAL_MS);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready.load(std::sync::atomic::Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

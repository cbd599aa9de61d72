//! # Watch Loop
//!
//! One `kube_runtime::Controller` per singleton kind, run side by side until a
//! shutdown signal arrives.

use crate::controller::reconciler::{reconcile, Reconciler, ReconcilerError};
use crate::controller::server::ServerState;
use crate::crd::IngressFleet;
use crate::runtime::error_policy::handle_reconciliation_error;
use crate::runtime::initialization::InitializationResult;
use futures::StreamExt;
use kube::api::Api;
use kube_runtime::controller::Error as ControllerError;
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Run both controllers until shutdown
///
/// # Errors
///
/// Currently infallible once initialization succeeded.
pub async fn run_watch_loop(init: InitializationResult) -> Result<(), anyhow::Error> {
    let InitializationResult {
        yurt_ingresses,
        nodepool_ingresses,
        yurt_reconciler,
        nodepool_reconciler,
        server_state,
        ..
    } = init;

    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, initiating graceful shutdown...");
            mark_not_ready(&shutdown_state);
        }
    });

    let yurt_name = yurt_reconciler.settings.singleton_name.clone();
    let nodepool_name = nodepool_reconciler.settings.singleton_name.clone();
    futures::join!(
        run_controller(yurt_ingresses, &yurt_name, yurt_reconciler),
        run_controller(nodepool_ingresses, &nodepool_name, nodepool_reconciler),
    );

    mark_not_ready(&server_state);
    info!("Controller stopped gracefully");
    Ok(())
}

fn mark_not_ready(state: &ServerState) {
    state.set_ready(false);
}

/// Watch the singleton `name` of kind `R` and drive reconcile passes
pub async fn run_controller<R: IngressFleet>(api: Api<R>, name: &str, ctx: Arc<Reconciler<R>>) {
    info!(resource.kind = R::KIND, resource.name = name, "starting controller");
    let config = watcher::Config::default()
        .fields(&format!("metadata.name={name}"))
        .any_semantic();

    Controller::new(api, config)
        .shutdown_on_signal()
        .run(reconcile, handle_reconciliation_error, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _)) => debug!(resource.kind = R::KIND, object = %obj, "reconciled"),
                Err(e) => log_controller_error::<R>(&e),
            }
        })
        .await;

    info!(resource.kind = R::KIND, "controller stream ended");
}

fn log_controller_error<R: IngressFleet>(error: &ControllerError<ReconcilerError, watcher::Error>) {
    match error {
        // Already logged and requeued by the error policy
        ControllerError::ReconcilerFailed(_, obj) => {
            debug!(resource.kind = R::KIND, object = %obj, "reconcile failed");
        }
        ControllerError::ObjectNotFound(obj) => {
            debug!(resource.kind = R::KIND, object = %obj, "object vanished before reconcile");
        }
        ControllerError::QueueError(e) => {
            warn!(resource.kind = R::KIND, error = %e, "watch stream error");
        }
        other => warn!(resource.kind = R::KIND, error = %other, "controller error"),
    }
}

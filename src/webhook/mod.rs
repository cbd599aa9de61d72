//! # Admission Webhook
//!
//! Validating admission for the ingress singletons.
//!
//! - `POST /validate-yurtingress`
//! - `POST /validate-nodepoolingress`
//!
//! Each endpoint decodes an `AdmissionReview`, runs the kind's [`Validator`] and
//! answers with the verdict. TLS is terminated in front of this server.

mod validator;

pub use validator::{AdmittedObject, Operation, Validator, Verdict};

use crate::observability::metrics;
use axum::{extract::State, routing::post, Json, Router};
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("malformed object: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Validators for both singleton kinds
#[derive(Debug)]
pub struct WebhookState {
    pub yurt_ingress: Validator,
    pub nodepool_ingress: Validator,
}

pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/validate-yurtingress", post(validate_yurt_ingress))
        .route("/validate-nodepoolingress", post(validate_nodepool_ingress))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the webhook on `port` until the process exits
///
/// # Errors
///
/// Bind or serve failures.
pub async fn start_webhook_server(
    port: u16,
    state: Arc<WebhookState>,
) -> Result<(), anyhow::Error> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("admission webhook listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn validate_yurt_ingress(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    Json(review(&state.yurt_ingress, body).await)
}

async fn validate_nodepool_ingress(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    Json(review(&state.nodepool_ingress, body).await)
}

/// Answer one admission review with the verdict of `validator`
pub async fn review(
    validator: &Validator,
    body: AdmissionReview<DynamicObject>,
) -> AdmissionReview<DynamicObject> {
    let req: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "failed to parse admission request");
            return AdmissionResponse::invalid(e.to_string()).into_review();
        }
    };

    let decoded = decode(&req);
    let (new, old) = match decoded {
        Ok(objects) => objects,
        Err(e) => {
            error!(uid = %req.uid, error = %e, "failed to decode admission object");
            return AdmissionResponse::invalid(e.to_string()).into_review();
        }
    };

    let verdict = validator
        .validate(Operation::from(&req.operation), new.as_ref(), old.as_ref())
        .await;
    metrics::record_admission_verdict(validator.kind(), verdict.allowed);
    info!(
        uid = %req.uid,
        kind = validator.kind(),
        name = %req.name,
        allowed = verdict.allowed,
        reason = %verdict.reason,
        "admission verdict"
    );

    let response = AdmissionResponse::from(&req);
    if verdict.allowed {
        response.into_review()
    } else {
        response.deny(verdict.reason).into_review()
    }
}

type Decoded = (Option<AdmittedObject>, Option<AdmittedObject>);

fn decode(req: &AdmissionRequest<DynamicObject>) -> Result<Decoded, WebhookError> {
    let admitted = |obj: &DynamicObject| -> Result<AdmittedObject, WebhookError> {
        let mut admitted = AdmittedObject::from_dynamic(obj)?;
        if admitted.name.is_empty() {
            admitted.name.clone_from(&req.name);
        }
        Ok(admitted)
    };
    let new = req.object.as_ref().map(&admitted).transpose()?;
    let old = req.old_object.as_ref().map(&admitted).transpose()?;
    Ok((new, old))
}

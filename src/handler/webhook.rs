// handler/webhook.rs
use std::sync::Arc;

use axum::{
    body::Bytes,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
    Extension, Json, Router,
};
use serde_json::{json, Value};

use crate::{
    dtos::webhookdtos::GatewayEvent,
    error::HttpError,
    service::{
        classifier::classify,
        error::ServiceError,
        signature::{SignatureHeaders, SignatureVerifier},
    },
    AppState,
};

pub fn webhook_handler() -> Router {
    Router::new().route("/gateway", post(gateway_webhook))
}

/// Gateway delivery endpoint. Any 2xx tells the gateway to stop redelivering,
/// so only outcomes a redelivery could fix are reported as 5xx.
pub async fn gateway_webhook(
    Extension(app_state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, HttpError> {
    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!("Rejecting gateway webhook with invalid JSON: {}", e);
        ServiceError::InvalidPayload(e.to_string())
    })?;

    let verifier = SignatureVerifier::from_config(&app_state.env).map_err(|e| {
        tracing::error!("Cannot verify gateway webhook: GATEWAY_SIGNING_KEY is not set");
        e
    })?;

    let event = GatewayEvent::from_payload(&payload);
    verifier.verify(&event, &SignatureHeaders::from_headers(&headers))?;

    let class = classify(&event)?;
    let outcome = app_state.ledger_service.process(class).await?;

    tracing::debug!("Gateway event {:?} handled: {:?}", event.request_id, outcome);
    Ok(Json(json!({ "ok": true })))
}

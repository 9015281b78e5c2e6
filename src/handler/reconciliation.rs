// handler/reconciliation.rs
use std::sync::Arc;

use axum::{
    extract::Query,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};

use crate::{
    dtos::reconciliationdtos::{ClearCacheResponse, RunReconciliationQuery},
    error::HttpError,
    middleware::{role_check, OperatorAuth, OperatorRole},
    AppState,
};

/// Operator routes. Expects `auth` to be layered on top.
pub fn reconciliation_handler() -> Router {
    Router::new()
        .route(
            "/",
            post(run_reconciliation).delete(clear_reconciliation_cache),
        )
        .route("/gateway-status", get(gateway_status))
        .layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![OperatorRole::Admin, OperatorRole::SuperAdmin])
        }))
}

pub async fn run_reconciliation(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(operator): Extension<OperatorAuth>,
    Query(query): Query<RunReconciliationQuery>,
) -> Result<impl IntoResponse, HttpError> {
    tracing::info!(
        "Reconciliation requested by {} (refresh: {})",
        operator.operator_id,
        query.refresh
    );

    let report = app_state
        .reconciliation_service
        .run(&operator.operator_id, query.refresh)
        .await
        .map_err(|e| {
            tracing::error!("Reconciliation run failed: {}", e);
            HttpError::server_error(format!("Reconciliation failed: {}", e))
        })?;

    Ok(Json(report))
}

pub async fn clear_reconciliation_cache(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(operator): Extension<OperatorAuth>,
) -> Result<impl IntoResponse, HttpError> {
    tracing::info!("Reconciliation cache cleared by {}", operator.operator_id);

    let cleared = app_state.reconciliation_service.clear_cache().await;
    Ok(Json(ClearCacheResponse { ok: true, cleared }))
}

pub async fn gateway_status(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let status = app_state.reconciliation_service.gateway_status().await;
    Ok(Json(status))
}

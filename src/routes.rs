// routes.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{reconciliation::reconciliation_handler, webhook::webhook_handler},
    middleware::auth,
    AppState,
};

async fn health_check(Extension(app_state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "cache": app_state.cache.backend()
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let admin_routes = Router::new().nest(
        "/reconciliation",
        reconciliation_handler().layer(middleware::from_fn(auth)),
    );

    let api_route = Router::new()
        .nest("/webhooks", webhook_handler())
        .nest("/admin", admin_routes)
        .layer(TraceLayer::new_for_http());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
        .layer(Extension(app_state))
}

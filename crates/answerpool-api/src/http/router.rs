//! Axum router configuration with middleware.
//!
//! All pool routes are under `/api/v1/`; `/health` is the liveness probe.
//! Middleware: CORS, request tracing.

use axum::Router;
use axum::routing::{delete, get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/answer", post(handlers::answer::answer))
        // Provider administration
        .route("/providers", get(handlers::provider::list_providers))
        .route("/providers/{name}/keys", get(handlers::provider::key_health))
        .route("/providers/{name}/active", put(handlers::provider::set_active))
        .route(
            "/providers/{name}/priority",
            put(handlers::provider::set_priority),
        )
        .route("/providers/{name}/reset", post(handlers::provider::reset_health))
        .route("/providers/{name}/probe", post(handlers::provider::probe))
        // Cache
        .route("/cache/stats", get(handlers::cache::stats))
        .route("/cache", delete(handlers::cache::clear));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - liveness.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

//! Cache endpoints.

use std::time::Instant;

use axum::Json;
use axum::extract::State;

use answerpool_types::status::CacheStatsInfo;

use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/cache/stats
pub async fn stats(State(state): State<AppState>) -> Json<ApiResponse<CacheStatsInfo>> {
    let start = Instant::now();
    Json(ApiResponse::success(state.dispatcher.cache_stats(), start))
}

/// DELETE /api/v1/cache - drops both tiers, reports shared rows removed.
pub async fn clear(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    let start = Instant::now();
    let removed = state.dispatcher.clear_cache().await;
    Json(ApiResponse::success(
        serde_json::json!({ "cleared": true, "shared_removed": removed }),
        start,
    ))
}

//! Provider administration endpoints.
//!
//! GET  /api/v1/providers                 - status of every provider
//! GET  /api/v1/providers/{name}/keys     - per-key health snapshot
//! PUT  /api/v1/providers/{name}/active   - enable / disable
//! PUT  /api/v1/providers/{name}/priority - change priority tier
//! POST /api/v1/providers/{name}/reset    - clear failures and cooldowns
//! POST /api/v1/providers/{name}/probe    - send a test question per key

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use answerpool_types::error::PoolError;
use answerpool_types::status::{KeyHealthSnapshot, ProbeResult, ProviderStatusInfo};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetPriorityRequest {
    pub priority: i32,
}

pub async fn list_providers(
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<ProviderStatusInfo>>> {
    let start = Instant::now();
    Json(ApiResponse::success(
        state.dispatcher.provider_statuses(),
        start,
    ))
}

pub async fn key_health(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<Vec<KeyHealthSnapshot>>>, AppError> {
    let start = Instant::now();
    let keys = state.dispatcher.key_health(&name)?;
    Ok(Json(ApiResponse::success(keys, start)))
}

pub async fn set_active(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<SetActiveRequest>,
) -> Result<Json<ApiResponse<ProviderStatusInfo>>, AppError> {
    let start = Instant::now();
    state.dispatcher.set_provider_active(&name, body.active)?;
    Ok(Json(ApiResponse::success(status_of(&state, &name)?, start)))
}

pub async fn set_priority(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<SetPriorityRequest>,
) -> Result<Json<ApiResponse<ProviderStatusInfo>>, AppError> {
    let start = Instant::now();
    state.dispatcher.set_provider_priority(&name, body.priority)?;
    Ok(Json(ApiResponse::success(status_of(&state, &name)?, start)))
}

pub async fn reset_health(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<Vec<KeyHealthSnapshot>>>, AppError> {
    let start = Instant::now();
    state.dispatcher.reset_provider_health(&name)?;
    let keys = state.dispatcher.key_health(&name)?;
    Ok(Json(ApiResponse::success(keys, start)))
}

pub async fn probe(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<ProbeResult>>, AppError> {
    let start = Instant::now();
    let result = state.dispatcher.probe_provider(&name).await?;
    Ok(Json(ApiResponse::success(result, start)))
}

fn status_of(state: &AppState, name: &str) -> Result<ProviderStatusInfo, AppError> {
    state
        .dispatcher
        .provider_statuses()
        .into_iter()
        .find(|s| s.name == name)
        .ok_or_else(|| PoolError::NotFound(name.to_string()).into())
}

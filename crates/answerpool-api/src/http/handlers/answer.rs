//! POST /api/v1/answer - answer one question through the pool.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use tokio_util::sync::CancellationToken;

use answerpool_types::answer::{Answer, AnswerRequest};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

pub async fn answer(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<ApiResponse<Answer>>, AppError> {
    let start = Instant::now();

    request
        .validate()
        .map_err(|reason| AppError::Validation(reason.to_string()))?;

    // Dropped with the handler future when the client disconnects.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let answer = state.dispatcher.answer(&request, &cancel).await?;
    Ok(Json(ApiResponse::success(answer, start)))
}

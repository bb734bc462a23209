use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::{api_state::ApiState, error::ApiError};

/// Status poll. Unknown ids report `not_found` instead of failing.
pub async fn check_status(
    State(state): State<ApiState>,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state
        .lifecycle
        .get_status(&file_id)
        .await
        .map_err(ApiError::from)?;

    let label = status.map_or("not_found", |s| s.as_str());
    Ok(Json(json!({ "file_id": file_id, "status": label })))
}

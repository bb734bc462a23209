use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::{api_state::ApiState, error::ApiError};

/// Result fetch. `text` is null while the job is still `processing` and
/// for unknown ids; the status field disambiguates.
pub async fn get_result(
    State(state): State<ApiState>,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state
        .lifecycle
        .get_result(&file_id)
        .await
        .map_err(ApiError::from)?;

    let body = match job {
        Some(job) => json!({
            "file_id": file_id,
            "text": job.text,
            "status": job.status.as_str(),
        }),
        None => json!({
            "file_id": file_id,
            "text": serde_json::Value::Null,
            "status": "not_found",
        }),
    };

    Ok(Json(body))
}

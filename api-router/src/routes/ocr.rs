use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use bytes::Bytes;
use common::storage::types::ocr_job::JobStatus;
use serde_json::json;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, TryFromMultipart)]
pub struct OcrParams {
    // Size is capped by the router-level body limit from config, not here.
    #[form_data(limit = "unlimited")]
    pub file: FieldData<Bytes>,
}

/// Synchronous submission: blocks the caller for the full recognition run
/// and answers with the terminal status. A recognition failure is part of
/// the normal response shape, not an HTTP error.
pub async fn ocr_image(
    State(state): State<ApiState>,
    TypedMultipart(input): TypedMultipart<OcrParams>,
) -> Result<impl IntoResponse, ApiError> {
    let file_name = input
        .file
        .metadata
        .file_name
        .ok_or_else(|| ApiError::ValidationError("File name missing in upload".to_string()))?;

    info!(
        file_name = %file_name,
        size_bytes = input.file.contents.len(),
        "Received synchronous ocr request"
    );

    let job = state
        .lifecycle
        .submit_sync(&file_name, input.file.contents)
        .await
        .map_err(ApiError::from)?;

    let body = match job.status {
        JobStatus::Error => json!({
            "file_id": job.id,
            "text": serde_json::Value::Null,
            "status": job.status.as_str(),
            "error": job.text,
        }),
        _ => json!({
            "file_id": job.id,
            "text": job.text,
            "status": job.status.as_str(),
        }),
    };

    Ok((StatusCode::OK, Json(body)))
}

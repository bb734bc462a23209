use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use bytes::Bytes;
use serde_json::json;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, TryFromMultipart)]
pub struct UploadParams {
    // Size is capped by the router-level body limit from config, not here.
    #[form_data(limit = "unlimited")]
    pub file: FieldData<Bytes>,
}

/// Deferred submission: the response carries only the generated id; the
/// caller observes completion by polling `/status/{file_id}`.
pub async fn upload_image(
    State(state): State<ApiState>,
    TypedMultipart(input): TypedMultipart<UploadParams>,
) -> Result<impl IntoResponse, ApiError> {
    let file_name = input
        .file
        .metadata
        .file_name
        .ok_or_else(|| ApiError::ValidationError("File name missing in upload".to_string()))?;

    info!(
        file_name = %file_name,
        size_bytes = input.file.contents.len(),
        "Received deferred upload"
    );

    let job = state
        .lifecycle
        .submit_deferred(&file_name, input.file.contents)
        .await
        .map_err(ApiError::from)?;

    Ok((StatusCode::OK, Json(json!({ "file_id": job.id }))))
}

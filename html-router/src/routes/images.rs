use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use common::error::AppError;

use crate::{error::HtmlError, html_state::HtmlState};

/// Read-only serving of stored blobs under `/images/{filename}`.
///
/// Stored names are flat (id-prefixed, sanitized at upload), so anything
/// with path separators is rejected outright.
pub async fn serve_image(
    State(state): State<HtmlState>,
    Path(filename): Path<String>,
) -> Result<Response, HtmlError> {
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let stream = match state.lifecycle.blobs().get_stream(&filename).await {
        Ok(stream) => stream,
        Err(object_store::Error::NotFound { .. }) => {
            return Ok(StatusCode::NOT_FOUND.into_response());
        }
        Err(err) => return Err(HtmlError::from(AppError::Blob(err))),
    };

    let content_type = mime_guess::from_path(&filename)
        .first_or(mime_guess::mime::APPLICATION_OCTET_STREAM)
        .to_string();

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    Ok(response)
}

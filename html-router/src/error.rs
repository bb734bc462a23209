use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use common::error::AppError;
use thiserror::Error;
use tracing::error;

/// Error wrapper for the HTML surface: renders a plain error page instead
/// of a JSON body.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct HtmlError(#[from] AppError);

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        let (status, title) = match &self.0 {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            _ => {
                error!("Internal error: {:?}", self.0);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        };

        let body = format!(
            "<!doctype html><html><body><h1>{} {}</h1></body></html>",
            status.as_u16(),
            title
        );
        (status, Html(body)).into_response()
    }
}

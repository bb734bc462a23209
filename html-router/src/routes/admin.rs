use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect},
};
use axum_typed_multipart::{TryFromMultipart, TypedMultipart};
use common::utils::template_engine::Value;
use serde::Serialize;
use tracing::info;

use crate::{error::HtmlError, html_state::HtmlState};

#[derive(Serialize)]
struct AdminJobRow {
    id: String,
    filename: String,
    status: &'static str,
    created_at: String,
}

#[derive(Serialize)]
struct AdminPageData {
    jobs: Vec<AdminJobRow>,
}

/// Admin listing of all jobs, newest first.
pub async fn show_admin_page(State(state): State<HtmlState>) -> Result<impl IntoResponse, HtmlError> {
    let jobs = state.lifecycle.list_jobs().await?;

    let rows = jobs
        .into_iter()
        .map(|job| AdminJobRow {
            id: job.id,
            filename: job.filename,
            status: job.status.as_str(),
            created_at: job.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        })
        .collect();

    let html = state
        .templates
        .render(
            "admin/base.html",
            &Value::from_serialize(&AdminPageData { jobs: rows }),
        )
        .map_err(common::error::AppError::from)?;

    Ok(Html(html))
}

#[derive(Debug, TryFromMultipart)]
pub struct DeleteJobsForm {
    #[form_data(default)]
    pub file_ids: Vec<String>,
}

/// Bulk delete from the admin form. Ids already gone are skipped; the
/// response is always a redirect back to the listing.
pub async fn delete_jobs(
    State(state): State<HtmlState>,
    TypedMultipart(form): TypedMultipart<DeleteJobsForm>,
) -> Result<impl IntoResponse, HtmlError> {
    let requested = form.file_ids.len();
    let removed = state.lifecycle.delete_jobs(&form.file_ids).await?;
    info!(requested, removed, "Admin delete completed");

    Ok(Redirect::to("/admin"))
}

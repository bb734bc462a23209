use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use html_state::HtmlState;
use routes::{
    admin::{delete_jobs, show_admin_page},
    images::serve_image,
};

pub mod error;
pub mod html_state;
mod routes;

/// Router for the admin HTML surface and read-only blob serving.
pub fn html_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    HtmlState: FromRef<S>,
{
    Router::new()
        .route("/admin", get(show_admin_page))
        .route("/admin/delete", post(delete_jobs))
        .route("/images/{filename}", get(serve_image))
}

use std::sync::Arc;

use api_router::{api_routes, api_state::ApiState};
use axum::{extract::FromRef, Router};
use common::{
    storage::{blob::BlobStorage, db::SurrealDbClient},
    utils::config::get_config,
};
use html_router::{html_routes, html_state::HtmlState};
use ocr_pipeline::{recognizer::VisionRecognizer, run_worker_loop, JobLifecycle};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    // Set up the shared database handle
    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );

    // Ensure db is initialized
    db.ensure_initialized().await?;

    // Blob storage and the shared job lifecycle
    let blobs = BlobStorage::new(&config).await?;
    let recognizer = Arc::new(VisionRecognizer::from_config(&config));
    let lifecycle = Arc::new(JobLifecycle::new(
        Arc::clone(&db),
        blobs,
        recognizer,
        &config,
    ));

    let api_state = ApiState::new(Arc::clone(&db), Arc::clone(&lifecycle), &config);
    let html_state = HtmlState::new_with_resources(Arc::clone(&lifecycle), config.clone(), None);

    // Create Axum router
    let app = Router::new()
        .merge(api_routes(&api_state))
        .merge(html_routes())
        .with_state(AppState {
            api_state,
            html_state,
        });

    // Background worker drains deferred jobs for the lifetime of the process.
    let worker_db = Arc::clone(&db);
    let worker_lifecycle = Arc::clone(&lifecycle);
    tokio::spawn(async move {
        if let Err(e) = run_worker_loop(worker_db, worker_lifecycle).await {
            error!("Worker process error: {}", e);
        }
    });

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Clone, FromRef)]
struct AppState {
    api_state: ApiState,
    html_state: HtmlState,
}

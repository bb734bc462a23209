use std::sync::Arc;

use common::{storage::db::SurrealDbClient, utils::config::AppConfig};
use ocr_pipeline::JobLifecycle;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub lifecycle: Arc<JobLifecycle>,
    pub config: AppConfig,
}

impl ApiState {
    pub fn new(db: Arc<SurrealDbClient>, lifecycle: Arc<JobLifecycle>, config: &AppConfig) -> Self {
        Self {
            db,
            lifecycle,
            config: config.clone(),
        }
    }
}

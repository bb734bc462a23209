use std::sync::Arc;

use common::utils::template_engine::{ProvidesTemplateEngine, TemplateEngine};
use common::{create_template_engine, utils::config::AppConfig};
use ocr_pipeline::JobLifecycle;
use tracing::debug;

#[derive(Clone)]
pub struct HtmlState {
    pub lifecycle: Arc<JobLifecycle>,
    pub templates: Arc<TemplateEngine>,
    pub config: AppConfig,
}

impl HtmlState {
    pub fn new_with_resources(
        lifecycle: Arc<JobLifecycle>,
        config: AppConfig,
        template_engine: Option<Arc<TemplateEngine>>,
    ) -> Self {
        let templates =
            template_engine.unwrap_or_else(|| Arc::new(create_template_engine!("templates")));
        debug!("Template engine configured for html_router.");

        Self {
            lifecycle,
            templates,
            config,
        }
    }
}

impl ProvidesTemplateEngine for HtmlState {
    fn template_engine(&self) -> &Arc<TemplateEngine> {
        &self.templates
    }
}

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    Memory,
}

#[derive(Clone, Deserialize, Debug)]
#[serde(default)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    pub data_dir: String,
    pub http_port: u16,
    pub openai_base_url: String,
    pub storage: StorageKind,
    /// Vision-capable model used by the recognition adapter.
    pub recognition_model: String,
    /// Languages the deployment expects the engine to read.
    pub recognition_languages: Vec<String>,
    /// Upper bound on a single recognition call; a hung engine call becomes
    /// a terminal `error` instead of a stuck job.
    pub recognition_timeout_secs: u64,
    pub upload_max_body_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            surrealdb_address: "ws://localhost:8000".to_string(),
            surrealdb_username: "root".to_string(),
            surrealdb_password: "root".to_string(),
            surrealdb_namespace: "tolka".to_string(),
            surrealdb_database: "tolka".to_string(),
            data_dir: "./images".to_string(),
            http_port: 3000,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            storage: StorageKind::Local,
            recognition_model: "gpt-4o-mini".to_string(),
            recognition_languages: vec![
                "zh-Hans".to_string(),
                "zh-Hant".to_string(),
                "en-US".to_string(),
            ],
            recognition_timeout_secs: 120,
            upload_max_body_bytes: 10_000_000,
        }
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_original_language_set() {
        let cfg = AppConfig::default();
        assert_eq!(
            cfg.recognition_languages,
            vec!["zh-Hans", "zh-Hant", "en-US"]
        );
        assert_eq!(cfg.storage, StorageKind::Local);
        assert!(cfg.recognition_timeout_secs > 0);
    }
}

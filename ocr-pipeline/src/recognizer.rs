use std::sync::Arc;

use async_openai::types::{
    ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::utils::config::AppConfig;
use thiserror::Error;

/// Failure of a single recognition call. Always carries a human-readable
/// diagnostic; the lifecycle layer stores it as the job's `text`.
#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("Recognition engine error: {0}")]
    Engine(String),
    #[error("Recognition timed out after {0}s")]
    Timeout(u64),
}

/// The external text-recognition capability, opaque to the lifecycle core.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> Result<String, RecognitionError>;
}

pub type OpenAIClientType = async_openai::Client<async_openai::config::OpenAIConfig>;

/// Recognizer backed by a vision-capable chat model.
pub struct VisionRecognizer {
    client: Arc<OpenAIClientType>,
    model: String,
    languages: Vec<String>,
}

impl VisionRecognizer {
    pub fn new(client: Arc<OpenAIClientType>, config: &AppConfig) -> Self {
        Self {
            client,
            model: config.recognition_model.clone(),
            languages: config.recognition_languages.clone(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let client = Arc::new(async_openai::Client::with_config(
            async_openai::config::OpenAIConfig::new()
                .with_api_key(&config.openai_api_key)
                .with_api_base(&config.openai_base_url),
        ));
        Self::new(client, config)
    }

    fn prompt(&self) -> String {
        format!(
            "Transcribe all text visible in this image verbatim, preserving line \
             breaks. Respond with the transcription only, no commentary. Expected \
             languages: {}.",
            self.languages.join(", ")
        )
    }
}

#[async_trait]
impl TextRecognizer for VisionRecognizer {
    async fn recognize(&self, image: &[u8]) -> Result<String, RecognitionError> {
        let base64_image = STANDARD.encode(image);
        let image_url = format!("data:image/png;base64,{}", base64_image);

        let build = || -> Result<_, async_openai::error::OpenAIError> {
            Ok(CreateChatCompletionRequestArgs::default()
                .model(&self.model)
                .max_tokens(6400_u32)
                .messages([ChatCompletionRequestUserMessageArgs::default()
                    .content(vec![
                        ChatCompletionRequestMessageContentPartTextArgs::default()
                            .text(self.prompt())
                            .build()?
                            .into(),
                        ChatCompletionRequestMessageContentPartImageArgs::default()
                            .image_url(
                                ImageUrlArgs::default()
                                    .url(image_url)
                                    .detail(ImageDetail::High)
                                    .build()?,
                            )
                            .build()?
                            .into(),
                    ])
                    .build()?
                    .into()])
                .build()?)
        };
        let request = build().map_err(|e| RecognitionError::Engine(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| RecognitionError::Engine(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .cloned()
            .ok_or_else(|| {
                RecognitionError::Engine("Engine response contained no text content".to_string())
            })
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::*;

    /// Recognizer that returns a fixed transcription.
    pub struct StaticRecognizer {
        pub text: String,
    }

    #[async_trait]
    impl TextRecognizer for StaticRecognizer {
        async fn recognize(&self, _image: &[u8]) -> Result<String, RecognitionError> {
            Ok(self.text.clone())
        }
    }

    /// Recognizer that always fails with the given diagnostic.
    pub struct FailingRecognizer {
        pub diagnostic: String,
    }

    #[async_trait]
    impl TextRecognizer for FailingRecognizer {
        async fn recognize(&self, _image: &[u8]) -> Result<String, RecognitionError> {
            Err(RecognitionError::Engine(self.diagnostic.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_configured_languages() {
        let config = AppConfig {
            recognition_languages: vec!["sv-SE".to_string(), "en-US".to_string()],
            ..AppConfig::default()
        };
        let recognizer = VisionRecognizer::from_config(&config);
        let prompt = recognizer.prompt();
        assert!(prompt.contains("sv-SE, en-US"));
    }

    #[test]
    fn test_errors_carry_diagnostics() {
        let engine = RecognitionError::Engine("could not decode image".into());
        assert!(engine.to_string().contains("could not decode image"));

        let timeout = RecognitionError::Timeout(120);
        assert!(timeout.to_string().contains("120"));
    }
}

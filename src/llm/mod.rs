//! Language model providers
//!
//! The conversation core depends only on [`LanguageModel`]. The concrete
//! provider is picked from `[llm] provider` at startup.

mod mock;
mod openai;
mod traits;

pub use mock::{MockConfig, MockModel};
pub use openai::{OpenAiConfig, OpenAiModel};
pub use traits::*;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{AppConfig, Provider};
use crate::error::Result;
use crate::logging::PromptLog;

/// Create the configured model, wrapped with prompt logging when enabled
pub fn build_model(config: &AppConfig) -> Result<Arc<dyn LanguageModel>> {
    let model: Arc<dyn LanguageModel> = match config.llm.provider {
        Provider::OpenAi => Arc::new(OpenAiModel::new(OpenAiConfig::from(&config.llm))?),
        Provider::Mock => Arc::new(MockModel::with_config(MockConfig {
            token_latency_ms: 15,
            ..Default::default()
        })),
    };

    match &config.logging.prompt_log {
        Some(path) => {
            let log = PromptLog::open(path)?;
            info!(path = %log.path().display(), "Prompt log enabled");
            Ok(Arc::new(PromptLoggingModel::new(model, log)))
        }
        None => Ok(model),
    }
}

// ─────────────────────────────────────────────────────────────────
// Prompt Logging
// ─────────────────────────────────────────────────────────────────

/// Records each instruction string before forwarding the request
pub struct PromptLoggingModel {
    inner: Arc<dyn LanguageModel>,
    log: PromptLog,
}

impl PromptLoggingModel {
    pub fn new(inner: Arc<dyn LanguageModel>, log: PromptLog) -> Self {
        Self { inner, log }
    }

    fn record(&self, label: &str, request: &CompletionRequest) {
        // A broken log file must not stop the conversation
        if let Err(e) = self.log.record(label, &request.system) {
            warn!(error = %e, "Failed to write prompt log");
        }
    }
}

#[async_trait]
impl LanguageModel for PromptLoggingModel {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.record("selection", &request);
        self.inner.complete(request).await
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<TextStream> {
        self.record("generation", &request);
        self.inner.complete_stream(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(system: &str) -> CompletionRequest {
        CompletionRequest {
            system: system.to_string(),
            history: vec![],
            max_tokens: 10,
            temperature: 0.3,
        }
    }

    #[test]
    fn test_build_mock_model() {
        let mut config = AppConfig::default();
        config.llm.provider = Provider::Mock;

        let model = build_model(&config).unwrap();
        assert_eq!(model.name(), "mock");
    }

    #[test]
    fn test_build_openai_model() {
        let model = build_model(&AppConfig::default()).unwrap();
        assert_eq!(model.name(), "openai");
    }

    #[tokio::test]
    async fn test_prompt_logging_records_labels() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("logs").join("prompts.log");
        let log = PromptLog::open(&path).unwrap();
        let model = PromptLoggingModel::new(Arc::new(MockModel::new()), log);

        model.complete(request("Choose the best person")).await.unwrap();
        let _ = model.complete_stream(request("You are writing a message as Bob.")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[selection]"));
        assert!(content.contains("Choose the best person"));
        assert!(content.contains("[generation]"));
        assert!(content.contains("You are writing a message as Bob."));
        assert_eq!(model.name(), "mock");
    }
}

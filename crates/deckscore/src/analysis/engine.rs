use std::sync::Arc;

use super::client::{CompletionClient, CompletionRequest};
use super::prompt::{build_prompt, AnalysisContext, SYSTEM_PROMPT};
use super::result::{parse_analysis, AnalysisResult};
use super::AnalysisError;
use crate::config::AiConfig;

/// Request limits applied to every analysis call.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_input_chars: usize,
}

impl From<&AiConfig> for EngineSettings {
    fn from(ai: &AiConfig) -> Self {
        Self {
            max_tokens: ai.max_tokens,
            temperature: ai.temperature,
            max_input_chars: ai.max_input_chars,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&AiConfig::default())
    }
}

/// Turns a deck corpus into an [`AnalysisResult`] with one completion call.
///
/// The engine never retries; a failed call surfaces as-is.
#[derive(Clone)]
pub struct AnalysisEngine {
    client: Arc<dyn CompletionClient>,
    settings: EngineSettings,
}

impl AnalysisEngine {
    pub fn new(client: Arc<dyn CompletionClient>, settings: EngineSettings) -> Self {
        Self { client, settings }
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub async fn analyze(
        &self,
        text: &str,
        context: &AnalysisContext,
    ) -> Result<AnalysisResult, AnalysisError> {
        if text.trim().is_empty() {
            tracing::info!("Corpus has no text, returning empty analysis");
            return Ok(AnalysisResult::empty_input());
        }

        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: build_prompt(text, context, self.settings.max_input_chars),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            json_mode: true,
        };

        tracing::debug!(
            model = self.client.model(),
            prompt_chars = request.user.len(),
            "Requesting analysis"
        );

        let completion = self.client.complete(&request).await?;

        match parse_analysis(&completion.content) {
            Ok(result) => Ok(result),
            Err(AnalysisError::MalformedResponse(msg)) if completion.hit_token_limit() => {
                Err(AnalysisError::IncompleteResponse(format!(
                    "response cut off at {} tokens: {}",
                    self.settings.max_tokens, msg
                )))
            }
            Err(e) => Err(e),
        }
    }
}

//! Chat completion capability used by the analysis engine.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::AnalysisError;
use crate::config::AiConfig;
use crate::sanitize::{truncate_for_log, MAX_ECHOED_BODY};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One system/user message pair sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the endpoint to constrain output to a JSON object.
    pub json_mode: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub finish_reason: Option<String>,
}

impl Completion {
    /// True when generation stopped at the token limit.
    pub fn hit_token_limit(&self) -> bool {
        self.finish_reason.as_deref() == Some("length")
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, AnalysisError>;

    fn model(&self) -> &str;
}

// ── OpenAI-compatible wire format ──

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponseBody {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for `POST {base_url}/chat/completions` (Groq, OpenAI and compatibles).
pub struct ChatCompletionClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
}

impl ChatCompletionClient {
    pub fn new(ai: &AiConfig, api_key: Option<SecretString>) -> Result<Self, AnalysisError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(ai.timeout_secs))
            .build()
            .map_err(|e| {
                AnalysisError::UpstreamUnavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        if api_key.is_none() {
            log::warn!("No API key configured for {}; requests are sent unauthenticated", ai.base_url);
        }

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", ai.base_url.trim_end_matches('/')),
            model: ai.model.clone(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, AnalysisError> {
        let body = ChatRequestBody {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let mut builder = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| {
            AnalysisError::UpstreamUnavailable(format!("Completion request failed: {}", e))
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            AnalysisError::UpstreamUnavailable(format!("Failed to read completion response: {}", e))
        })?;

        if !status.is_success() {
            return Err(AnalysisError::UpstreamUnavailable(format!(
                "Completion endpoint returned {}: {}",
                status,
                truncate_for_log(&text, MAX_ECHOED_BODY)
            )));
        }

        parse_chat_envelope(&text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Extracts the first choice from a chat completion response body.
fn parse_chat_envelope(body: &str) -> Result<Completion, AnalysisError> {
    let parsed: ChatResponseBody = serde_json::from_str(body).map_err(|e| {
        AnalysisError::MalformedResponse(format!(
            "unexpected completion envelope ({}): {}",
            e,
            truncate_for_log(body, MAX_ECHOED_BODY)
        ))
    })?;

    let choice = parsed.choices.into_iter().next().ok_or_else(|| {
        AnalysisError::MalformedResponse("completion response has no choices".to_string())
    })?;

    Ok(Completion {
        content: choice.message.content.unwrap_or_default(),
        finish_reason: choice.finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "system".to_string(),
            user: "user".to_string(),
            max_tokens: 16,
            temperature: 0.0,
            json_mode: true,
        }
    }

    #[test]
    fn test_parse_envelope_first_choice() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "{\"overall_score\": 1}"}, "finish_reason": "stop"},
                {"index": 1, "message": {"role": "assistant", "content": "ignored"}, "finish_reason": "stop"}
            ]
        }"#;

        let completion = parse_chat_envelope(body).unwrap();
        assert_eq!(completion.content, r#"{"overall_score": 1}"#);
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
        assert!(!completion.hit_token_limit());
    }

    #[test]
    fn test_parse_envelope_length_finish() {
        let body = r#"{"choices": [{"message": {"content": "{\"overall"}, "finish_reason": "length"}]}"#;
        assert!(parse_chat_envelope(body).unwrap().hit_token_limit());
    }

    #[test]
    fn test_parse_envelope_without_choices() {
        let result = parse_chat_envelope(r#"{"choices": []}"#);
        assert!(matches!(result, Err(AnalysisError::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_envelope_not_json() {
        let result = parse_chat_envelope("<html>Bad Gateway</html>");
        assert!(matches!(result, Err(AnalysisError::MalformedResponse(_))));
    }

    #[test]
    fn test_request_body_shape() {
        let req = request();
        let body = ChatRequestBody {
            model: "llama3-8b-8192",
            messages: [
                ChatMessage {
                    role: "system",
                    content: &req.system,
                },
                ChatMessage {
                    role: "user",
                    content: &req.user,
                },
            ],
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            response_format: Some(ResponseFormat {
                kind: "json_object",
            }),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "llama3-8b-8192");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "user");
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["max_tokens"], 16);
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let ai = AiConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..AiConfig::default()
        };
        let client = ChatCompletionClient::new(&ai, None).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(client.model(), "llama3-8b-8192");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_upstream_unavailable() {
        let ai = AiConfig {
            base_url: "http://127.0.0.1:1/v1".to_string(),
            timeout_secs: 5,
            ..AiConfig::default()
        };
        let client = ChatCompletionClient::new(&ai, Some(SecretString::from("k".to_string())))
            .unwrap();

        let result = client.complete(&request()).await;
        assert!(matches!(result, Err(AnalysisError::UpstreamUnavailable(_))));
    }
}

//! The model boundary: one image plus one prompt in, raw text out.
//!
//! This module is intentionally thin. It does not parse, retry or cache;
//! every failure is mapped onto [`ModelInvocationError`] and handed back to
//! the orchestrator, which decides what a failure means for the batch.
//!
//! Two adapters ship with the crate:
//!
//! * [`GeminiModel`]: calls the Gemini `generateContent` REST endpoint
//!   directly, authenticating with the session credential. Default.
//! * [`ProviderModel`]: wraps any `edgequake_llm` provider (OpenAI,
//!   Anthropic, Ollama, …) for users who configure `provider_name`.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, ModelInvocationError};
use crate::session::Session;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// What the model said, plus usage when the provider reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl ModelReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// A vision-language model that can read one image per call.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Short label for logs, e.g. `gemini/gemini-1.5-flash`.
    fn name(&self) -> &str;

    /// Send `[prompt, image]` and return the raw response text.
    async fn generate(
        &self,
        prompt: &str,
        image: &ImageData,
    ) -> Result<ModelReply, ModelInvocationError>;
}

/// Build the adapter selected by `config`.
pub fn build_model(
    session: &Arc<Session>,
    config: &ExtractionConfig,
) -> Result<Arc<dyn VisionModel>, ExtractError> {
    if config.uses_gemini_client() {
        Ok(Arc::new(GeminiModel::new(Arc::clone(session), config)?))
    } else {
        Ok(Arc::new(ProviderModel::from_config(config)?))
    }
}

// ── Gemini REST client ───────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Direct client for the Gemini `generateContent` endpoint.
pub struct GeminiModel {
    session: Arc<Session>,
    client: reqwest::Client,
    endpoint: String,
    label: String,
    temperature: f32,
    max_tokens: usize,
    timeout_secs: u64,
}

impl GeminiModel {
    /// Build a client bound to `session`'s credential.
    ///
    /// The per-call timeout comes from `config.api_timeout_secs`; without it a
    /// hung call would stall the whole sequential pipeline.
    pub fn new(session: Arc<Session>, config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| ExtractError::HttpClient(e.to_string()))?;

        Ok(Self {
            session,
            client,
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                config.gemini_base_url.trim_end_matches('/'),
                config.model
            ),
            label: format!("gemini/{}", config.model),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.api_timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_error(&self, e: reqwest::Error) -> ModelInvocationError {
        if e.is_timeout() {
            ModelInvocationError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            ModelInvocationError::Network {
                detail: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl VisionModel for GeminiModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(
        &self,
        prompt: &str,
        image: &ImageData,
    ) -> Result<ModelReply, ModelInvocationError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text { text: prompt },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: &image.mime_type,
                            data: &image.data,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", self.session.credential().expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text, retry_after));
        }

        let parsed: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|e| ModelInvocationError::Api {
                    status,
                    detail: format!("undecodable response body: {e}"),
                })?;

        let usage = parsed.usage_metadata.unwrap_or_default();
        let candidate = parsed.candidates.into_iter().next().unwrap_or_default();
        let text: String = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        // Empty text is passed on; the parser maps it to the null record.
        if text.trim().is_empty() {
            debug!(
                "{}: empty candidate (finish reason {:?})",
                self.label, candidate.finish_reason
            );
        }

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, usage.prompt_token_count, usage.candidates_token_count
        );

        Ok(ModelReply {
            text,
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
        })
    }
}

/// Map a non-success HTTP status and body onto the error taxonomy.
fn classify_status(status: u16, body: &str, retry_after: Option<u64>) -> ModelInvocationError {
    let (message, api_status) = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(b) => (b.error.message, b.error.status),
        Err(_) => (body.chars().take(300).collect(), None),
    };

    let invalid_key = body.contains("API_KEY_INVALID")
        || message.to_ascii_lowercase().contains("api key")
        || api_status.as_deref() == Some("UNAUTHENTICATED")
        || api_status.as_deref() == Some("PERMISSION_DENIED");

    match status {
        401 | 403 => ModelInvocationError::Auth { detail: message },
        400 if invalid_key => ModelInvocationError::Auth { detail: message },
        429 => ModelInvocationError::RateLimited {
            retry_after_secs: retry_after,
        },
        400..=499 => ModelInvocationError::InvalidRequest {
            status,
            detail: message,
        },
        _ => ModelInvocationError::Api {
            status,
            detail: message,
        },
    }
}

// ── edgequake-llm providers ──────────────────────────────────────────────────

/// Adapter over an `edgequake_llm` provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
    temperature: f32,
    max_tokens: usize,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            label: label.into(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Instantiate `config.provider_name` with `config.model`.
    ///
    /// The provider reads its own API key (`OPENAI_API_KEY`, …) from the
    /// environment.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let name = config.provider_name.as_deref().unwrap_or("openai");
        let provider = ProviderFactory::create_llm_provider(name, &config.model).map_err(|e| {
            ExtractError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, format!("{}/{}", name, config.model), config))
    }
}

#[async_trait]
impl VisionModel for ProviderModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(
        &self,
        prompt: &str,
        image: &ImageData,
    ) -> Result<ModelReply, ModelInvocationError> {
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image.clone()])];
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        match self.provider.chat(&messages, Some(&options)).await {
            Ok(response) => Ok(ModelReply {
                text: response.content,
                input_tokens: response.prompt_tokens as usize,
                output_tokens: response.completion_tokens as usize,
            }),
            Err(e) => Err(ModelInvocationError::Provider {
                provider: self.label.clone(),
                detail: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_auth_statuses() {
        assert!(matches!(
            classify_status(401, "nope", None),
            ModelInvocationError::Auth { .. }
        ));
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        match classify_status(400, body, None) {
            ModelInvocationError::Auth { detail } => assert!(detail.contains("API key not valid")),
            other => panic!("expected Auth, got {other:?}"),
        }
    }

    #[test]
    fn classify_rate_limit_and_bad_request() {
        assert_eq!(
            classify_status(429, "{}", Some(12)),
            ModelInvocationError::RateLimited {
                retry_after_secs: Some(12)
            }
        );
        let body = r#"{"error":{"code":400,"message":"Invalid inline data","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(
            classify_status(400, body, None),
            ModelInvocationError::InvalidRequest {
                status: 400,
                detail: "Invalid inline data".into()
            }
        );
    }

    #[test]
    fn classify_server_errors() {
        assert!(matches!(
            classify_status(503, "overloaded", None),
            ModelInvocationError::Api { status: 503, .. }
        ));
    }

    #[test]
    fn request_body_orders_prompt_before_image() {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text { text: "PROMPT" },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: "AAAA",
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 64,
            },
        };
        let v = serde_json::to_value(&body).unwrap();
        let parts = &v["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "PROMPT");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "AAAA");
        assert_eq!(v["generationConfig"]["maxOutputTokens"], 64);
    }

    #[test]
    fn gemini_endpoint_from_config() {
        let session = Arc::new(Session::new("k").unwrap());
        let config = ExtractionConfig::builder()
            .gemini_base_url("http://localhost:9999/")
            .model("gemini-test")
            .build()
            .unwrap();
        let model = GeminiModel::new(session, &config).unwrap();
        assert_eq!(
            model.endpoint(),
            "http://localhost:9999/v1beta/models/gemini-test:generateContent"
        );
        assert_eq!(model.name(), "gemini/gemini-test");
    }
}

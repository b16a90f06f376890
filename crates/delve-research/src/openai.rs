//! OpenAI Responses API backend for the [`Researcher`] trait.
//!
//! Mirrors the deep-research flow: create a response with
//! `background: true` and the web-search tool enabled, then poll the run's
//! status until it completes or fails. Synchronous mode (no polling) is
//! available for short runs and tests.
//!
//! An optional enhancement pass rewrites the raw query into researcher
//! instructions using a cheaper intermediate model; enhancement failures
//! fall back to the plain composed input and are never fatal.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use delve_core::RequestId;

use crate::prompt;
use crate::researcher::{
    ResearchArtifact, ResearchError, ResearchRequest, ResearchResult, Researcher,
};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default deep-research model.
pub const DEFAULT_MODEL: &str = "o4-mini-deep-research-2025-06-26";

/// Default model for the prompt-enhancement pass.
pub const DEFAULT_ENHANCE_MODEL: &str = "gpt-5-mini";

/// Default interval between background status polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for [`OpenAiResearcher`].
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// API key sent as a Bearer token.
    pub api_key: String,
    /// API base URL (overridable for tests and proxies).
    pub base_url: String,
    /// Deep-research model id.
    pub model: String,
    /// Model id for the prompt-enhancement pass.
    pub enhance_model: String,
    /// Whether to submit runs in background mode and poll for completion.
    pub background: bool,
    /// Interval between background status polls.
    pub poll_interval: Duration,
}

impl OpenAiConfig {
    /// Config with production defaults for the given API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            enhance_model: DEFAULT_ENHANCE_MODEL.to_owned(),
            background: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    background: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<Reasoning>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSpec>,
}

#[derive(Serialize)]
struct Reasoning {
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    effort: Option<&'static str>,
}

#[derive(Serialize)]
struct ToolSpec {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    model: Option<String>,
    /// SDK-style convenience field; not all responses carry it.
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<ContentItem>,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ApiErrorDetail,
}

/// Pull the synthesized text out of a response: prefer the convenience
/// `output_text` field, otherwise concatenate the message output items.
fn extract_output_text(response: &ResponsesResponse) -> Option<String> {
    if let Some(text) = &response.output_text {
        if !text.is_empty() {
            return Some(text.clone());
        }
    }

    let text: String = response
        .output
        .iter()
        .filter(|item| item.kind == "message")
        .flat_map(|item| item.content.iter())
        .filter(|content| content.kind == "output_text")
        .map(|content| content.text.as_str())
        .collect();

    if text.is_empty() { None } else { Some(text) }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAiResearcher
// ─────────────────────────────────────────────────────────────────────────────

/// [`Researcher`] backed by the OpenAI Responses API.
pub struct OpenAiResearcher {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiResearcher {
    /// Create a researcher with the given configuration.
    #[must_use]
    pub fn new(config: OpenAiConfig) -> Self {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(mut auth) = HeaderValue::from_str(&format!("Bearer {}", config.api_key)) {
            auth.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth);
        }

        // No global request timeout: a synchronous synthesis call can
        // legitimately run for many minutes. The orchestrator owns deadlines.
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .unwrap_or_default();

        Self { config, client }
    }

    async fn create_response(
        &self,
        body: &ResponsesRequest<'_>,
    ) -> ResearchResult<ResponsesResponse> {
        let response = self
            .client
            .post(format!("{}/responses", self.config.base_url))
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn retrieve(&self, id: &str) -> ResearchResult<ResponsesResponse> {
        let response = self
            .client
            .get(format!("{}/responses/{id}", self.config.base_url))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> ResearchResult<ResponsesResponse> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or(body);
            return Err(ResearchError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    /// Run the prompt-enhancement pass. Returns `None` on any failure so
    /// the caller falls back to the unenhanced input.
    async fn enhance(&self, request: &ResearchRequest) -> Option<String> {
        let input = prompt::compose_enhancement_input(request);
        let body = ResponsesRequest {
            model: &self.config.enhance_model,
            input: &input,
            instructions: Some(prompt::ENHANCEMENT_INSTRUCTIONS),
            background: false,
            reasoning: Some(Reasoning {
                summary: None,
                effort: Some("low"),
            }),
            tools: vec![],
        };

        debug!(model = %self.config.enhance_model, "enhancing research prompt");
        match self.create_response(&body).await {
            Ok(response) => match extract_output_text(&response) {
                Some(text) => {
                    debug!(chars = text.len(), "enhanced prompt composed");
                    Some(text)
                }
                None => {
                    warn!("prompt enhancement returned no output, using original query");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "prompt enhancement failed, using original query");
                None
            }
        }
    }

    /// Poll a background run until it reaches a terminal status.
    ///
    /// Transient retrieve errors are logged and retried on the next tick;
    /// the caller's deadline bounds the loop.
    async fn poll_until_terminal(
        &self,
        first: ResponsesResponse,
    ) -> ResearchResult<ResponsesResponse> {
        let id = first.id.clone();
        let mut current = first;

        loop {
            match current.status.as_deref() {
                Some("completed") => return Ok(current),
                Some(terminal @ ("failed" | "cancelled" | "incomplete")) => {
                    let message = current
                        .error
                        .map(|e| e.message)
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| format!("run ended with status {terminal}"));
                    return Err(ResearchError::RunFailed { message });
                }
                status => {
                    debug!(request_id = %id, ?status, "synthesis run in progress");
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;

            match self.retrieve(&id).await {
                Ok(next) => current = next,
                Err(e) => {
                    warn!(request_id = %id, error = %e, "status poll failed, will retry");
                }
            }
        }
    }
}

#[async_trait]
impl Researcher for OpenAiResearcher {
    fn engine(&self) -> &str {
        "openai"
    }

    async fn submit(&self, request: &ResearchRequest) -> ResearchResult<ResearchArtifact> {
        let model = request
            .options
            .model
            .as_deref()
            .unwrap_or(&self.config.model);

        let input = if request.options.enhance {
            match self.enhance(request).await {
                Some(enhanced) => enhanced,
                None => prompt::compose_input(request),
            }
        } else {
            prompt::compose_input(request)
        };

        info!(
            model,
            background = self.config.background,
            "submitting synthesis run"
        );

        let body = ResponsesRequest {
            model,
            input: &input,
            instructions: None,
            background: self.config.background,
            reasoning: Some(Reasoning {
                summary: Some("auto"),
                effort: None,
            }),
            tools: vec![ToolSpec {
                kind: "web_search_preview",
            }],
        };

        let first = self.create_response(&body).await?;
        let request_id = RequestId::from_string(first.id.clone());

        let response = if self.config.background {
            info!(request_id = %request_id, "synthesis run accepted, polling for completion");
            self.poll_until_terminal(first).await?
        } else {
            first
        };

        let content = extract_output_text(&response).ok_or(ResearchError::Empty)?;
        info!(request_id = %request_id, chars = content.len(), "synthesis run completed");

        Ok(ResearchArtifact {
            content,
            model: response.model.unwrap_or_else(|| model.to_owned()),
            request_id: Some(request_id),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

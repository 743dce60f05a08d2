//! OpenAI-compatible text-completion backend.
//!
//! Talks to a locally hosted model server over the legacy `/v1/completions`
//! endpoint, which takes a raw prompt and returns raw text. Works with:
//! llama.cpp's `llama-server`, vLLM, Ollama, LM Studio, and any server that
//! exposes the same route.

use crate::clean_completion;
use async_trait::async_trait;
use sage_core::completion::{Completion, CompletionRequest, CompletionService, Usage};
use sage_core::error::CompletionError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound for the `/models` readiness check, independent of the
/// completion timeout.
const READY_TIMEOUT: Duration = Duration::from_secs(2);

/// A completion backend reached over HTTP.
pub struct OpenAiCompatCompletion {
    name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatCompletion {
    /// Create a new OpenAI-compatible backend.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            client,
        })
    }

    /// A llama.cpp `llama-server` on its default port (convenience constructor).
    pub fn llama_cpp(base_url: Option<&str>, model: &str) -> Result<Self, CompletionError> {
        Self::new(
            "llama.cpp",
            base_url.unwrap_or("http://localhost:8080/v1"),
            model,
            None,
            Duration::from_secs(300),
        )
    }

    /// An Ollama server on its default port (convenience constructor).
    pub fn ollama(base_url: Option<&str>, model: &str) -> Result<Self, CompletionError> {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            model,
            None,
            Duration::from_secs(300),
        )
    }

    fn request_body<'a>(&'a self, request: &'a CompletionRequest) -> ApiRequest<'a> {
        ApiRequest {
            model: &self.model,
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
            temperature: request.sampling.temperature,
            top_p: request.sampling.top_p,
            top_k: request.sampling.top_k,
            repeat_penalty: request.sampling.repetition_penalty,
            stop: (!request.stop.is_empty()).then_some(request.stop.as_slice()),
            stream: false,
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {key}")),
            None => builder,
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiCompatCompletion {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionError> {
        let url = format!("{}/completions", self.base_url);
        let body = self.request_body(&request);

        debug!(
            backend = %self.name,
            model = %self.model,
            prompt_len = request.prompt.len(),
            max_tokens = request.max_tokens,
            "Sending completion request"
        );

        let response = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(e.to_string())
                } else {
                    CompletionError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 404 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(CompletionError::ModelNotFound(format!(
                "{} ({error_body})",
                self.model
            )));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Completion server returned error");
            return Err(CompletionError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response
                .json()
                .await
                .map_err(|e| CompletionError::ApiError {
                    status_code: 200,
                    message: format!("Failed to parse response: {e}"),
                })?;

        parse_response(api_response, &request.prompt, &self.model)
    }

    async fn is_ready(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        let request = self.client.get(&url).timeout(READY_TIMEOUT);
        match self.authorized(request).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(backend = %self.name, error = %e, "Readiness probe failed");
                false
            }
        }
    }
}

fn parse_response(
    api_response: ApiResponse,
    prompt: &str,
    requested_model: &str,
) -> Result<Completion, CompletionError> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionError::ApiError {
            status_code: 200,
            message: "No choices in response".into(),
        })?;

    let usage = api_response.usage.map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    Ok(Completion {
        text: clean_completion(prompt, &choice.text),
        model: api_response
            .model
            .unwrap_or_else(|| requested_model.to_string()),
        usage,
    })
}

// --- API types ---

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    top_k: usize,
    repeat_penalty: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    stream: bool,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

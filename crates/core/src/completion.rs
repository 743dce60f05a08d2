//! Completion service trait: the abstraction over the language model.
//!
//! The assistant treats the model as an opaque text-completion function:
//! a fully assembled prompt goes in, generated text comes out. Whether the
//! model runs in-process or behind a local HTTP server is an implementation
//! detail of the backend.

use crate::error::CompletionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sampling parameters forwarded to the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,

    /// Nucleus sampling cutoff
    pub top_p: f32,

    /// Only the `top_k` most likely tokens are considered
    pub top_k: usize,

    /// Penalty applied to tokens that already appeared (1.0 = none)
    pub repetition_penalty: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            top_k: 20,
            repetition_penalty: 1.1,
        }
    }
}

/// A single text-completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The fully assembled prompt
    pub prompt: String,

    /// Maximum number of new tokens to generate
    pub max_tokens: u32,

    /// Sampling parameters
    #[serde(default)]
    pub sampling: SamplingParams,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32, sampling: SamplingParams) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            sampling,
            stop: Vec::new(),
        }
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Generated text returned by a completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text, without the prompt
    pub text: String,

    /// Which model produced the text
    pub model: String,

    /// Token usage statistics, when the backend reports them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// The core completion trait.
///
/// Every model backend implements this. The chat pipeline calls `complete()`
/// without knowing where the model lives.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// A human-readable name for this backend (e.g., "llama.cpp", "local").
    fn name(&self) -> &str;

    /// Generate a continuation of `request.prompt`.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionError>;

    /// Whether the model is loaded and able to serve requests.
    async fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl CompletionService for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<Completion, CompletionError> {
            Ok(Completion {
                text: format!("{} tokens max", request.max_tokens),
                model: "fixed".into(),
                usage: None,
            })
        }
    }

    #[test]
    fn sampling_defaults_match_assistant_tuning() {
        let params = SamplingParams::default();
        assert!((params.temperature - 0.7).abs() < f32::EPSILON);
        assert!((params.top_p - 0.9).abs() < f32::EPSILON);
        assert_eq!(params.top_k, 20);
        assert!((params.repetition_penalty - 1.1).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn default_readiness_is_true() {
        let service = Fixed;
        assert!(service.is_ready().await);
        let out = service
            .complete(CompletionRequest::new("hi", 200, SamplingParams::default()))
            .await
            .unwrap();
        assert_eq!(out.text, "200 tokens max");
    }
}

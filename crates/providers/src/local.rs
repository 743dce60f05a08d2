//! In-process inference backend: runs the model directly on your hardware.
//!
//! Uses [Candle](https://github.com/huggingface/candle) (Rust-native ML) to run
//! GGUF-quantized Llama-family models with no server, no network after the
//! first download, and no API key. The prompt arrives fully formatted (chat
//! markup included), so this backend only tokenizes, samples, and decodes.
//!
//! Supported presets:
//! - **tinyllama**: TinyLlama-1.1B-Chat, Q4_K_M (~670 MB)
//! - **smollm:360m**, **smollm:1.7b**: SmolLM instruct models
//!
//! Any other value is treated as a path to a `.gguf` file with a
//! `tokenizer.json` next to it.

use crate::clean_completion;
use async_trait::async_trait;
use candle_core::quantized::gguf_file;
use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::quantized_llama as qlm;
use hf_hub::api::sync::Api;
use sage_core::completion::{
    Completion, CompletionRequest, CompletionService, SamplingParams, Usage,
};
use sage_core::error::CompletionError;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Tokens considered when applying the repetition penalty.
const REPEAT_LAST_N: usize = 64;

/// Context length assumed when the GGUF metadata does not carry one.
const FALLBACK_CONTEXT: usize = 2048;

struct ModelPreset {
    repo: &'static str,
    gguf_file: &'static str,
    tokenizer_repo: &'static str,
}

fn resolve_preset(alias: &str) -> Option<ModelPreset> {
    match alias.to_lowercase().as_str() {
        "tinyllama" | "tiny-llama" | "tinyllama-1.1b" => Some(ModelPreset {
            repo: "TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF",
            gguf_file: "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf",
            tokenizer_repo: "TinyLlama/TinyLlama-1.1B-Chat-v1.0",
        }),
        "smollm:360m" | "smollm-360m" => Some(ModelPreset {
            repo: "TheBloke/SmolLM-360M-Instruct-GGUF",
            gguf_file: "smollm-360m-instruct.Q4_K_M.gguf",
            tokenizer_repo: "HuggingFaceTB/SmolLM-360M-Instruct",
        }),
        "smollm:1.7b" | "smollm-1.7b" => Some(ModelPreset {
            repo: "TheBloke/SmolLM-1.7B-Instruct-GGUF",
            gguf_file: "smollm-1.7b-instruct.Q4_K_M.gguf",
            tokenizer_repo: "HuggingFaceTB/SmolLM-1.7B-Instruct",
        }),
        _ => None,
    }
}

/// A completion backend that owns a loaded GGUF model.
///
/// Candle inference is CPU-bound and the model keeps a KV cache, so the
/// weights sit behind a mutex and every generation runs on a blocking thread.
pub struct LocalCompletion {
    state: Arc<Mutex<LocalModelState>>,
    model_name: String,
}

struct LocalModelState {
    model: qlm::ModelWeights,
    tokenizer: Tokenizer,
    device: Device,
    eos_token_id: u32,
    context_length: usize,
}

impl LocalCompletion {
    /// Load the model (downloading it on first use). Blocking.
    ///
    /// `model_name` is a preset alias or a path to a local `.gguf` file.
    pub fn load(model_name: &str) -> Result<Self, CompletionError> {
        let state = LocalModelState::load(model_name)?;
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            model_name: model_name.to_string(),
        })
    }
}

impl LocalModelState {
    fn load(model_name: &str) -> Result<Self, CompletionError> {
        let device = Device::Cpu;

        let (model_path, tokenizer_path) = if model_name.ends_with(".gguf") {
            let path = Path::new(model_name);
            if !path.exists() {
                return Err(CompletionError::ModelNotFound(model_name.to_string()));
            }
            (path.to_path_buf(), path.with_file_name("tokenizer.json"))
        } else {
            let preset = resolve_preset(model_name).ok_or_else(|| {
                CompletionError::ModelNotFound(format!(
                    "Unknown local model '{model_name}'. Available presets: tinyllama, \
                     smollm:360m, smollm:1.7b. Or provide a path to a .gguf file."
                ))
            })?;

            info!(
                model = model_name,
                repo = preset.repo,
                file = preset.gguf_file,
                "Downloading/loading local model"
            );

            let api = Api::new().map_err(|e| {
                CompletionError::Network(format!("Failed to initialize HuggingFace Hub API: {e}"))
            })?;
            let model_path = api
                .model(preset.repo.to_string())
                .get(preset.gguf_file)
                .map_err(|e| {
                    CompletionError::Network(format!(
                        "Failed to download model '{}' from '{}': {e}",
                        preset.gguf_file, preset.repo
                    ))
                })?;
            let tokenizer_path = api
                .model(preset.tokenizer_repo.to_string())
                .get("tokenizer.json")
                .map_err(|e| {
                    CompletionError::Network(format!(
                        "Failed to download tokenizer from '{}': {e}",
                        preset.tokenizer_repo
                    ))
                })?;
            (model_path, tokenizer_path)
        };

        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            CompletionError::NotConfigured(format!(
                "Failed to load tokenizer {}: {e}",
                tokenizer_path.display()
            ))
        })?;

        let mut file = std::fs::File::open(&model_path).map_err(|e| {
            CompletionError::NotConfigured(format!("Failed to open model file: {e}"))
        })?;
        let gguf = gguf_file::Content::read(&mut file).map_err(|e| {
            CompletionError::NotConfigured(format!("Failed to parse GGUF file: {e}"))
        })?;

        let context_length = gguf
            .metadata
            .get("llama.context_length")
            .and_then(|v| v.to_u32().ok())
            .map(|n| n as usize)
            .unwrap_or(FALLBACK_CONTEXT);

        let model = qlm::ModelWeights::from_gguf(gguf, &mut file, &device).map_err(|e| {
            CompletionError::NotConfigured(format!("Failed to load model weights: {e}"))
        })?;

        let eos_token_id = tokenizer
            .token_to_id("</s>")
            .or_else(|| tokenizer.token_to_id("<|endoftext|>"))
            .or_else(|| tokenizer.token_to_id("<|im_end|>"))
            .unwrap_or(2);

        info!(
            path = %model_path.display(),
            eos_token_id,
            context_length,
            "Local model loaded"
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            eos_token_id,
            context_length,
        })
    }

    /// Tokenize → sample → decode. Returns (text, prompt tokens, completion tokens).
    fn generate(
        &mut self,
        request: &CompletionRequest,
    ) -> Result<(String, u32, u32), CompletionError> {
        let encoding = self
            .tokenizer
            .encode(request.prompt.as_str(), true)
            .map_err(|e| CompletionError::Inference(format!("Tokenization failed: {e}")))?;

        let mut prompt_tokens = encoding.get_ids().to_vec();
        let max_new = request.max_tokens as usize;
        let budget = self.context_length.saturating_sub(max_new).max(1);
        if prompt_tokens.len() > budget {
            // Keep the tail: it carries the user message and the priming suffix.
            warn!(
                prompt_tokens = prompt_tokens.len(),
                budget, "Prompt exceeds model context, dropping oldest tokens"
            );
            prompt_tokens.drain(..prompt_tokens.len() - budget);
        }
        let prompt_len = prompt_tokens.len();

        let sampling = &request.sampling;
        let mut logits_processor = logits_processor(sampling);

        debug!(
            prompt_tokens = prompt_len,
            max_tokens = max_new,
            "Starting local generation"
        );

        let mut all_tokens = prompt_tokens.clone();
        let mut generated: Vec<u32> = Vec::new();
        let mut input = Tensor::new(prompt_tokens.as_slice(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(map_candle_err)?;
        let mut index_pos = 0;

        for _ in 0..max_new {
            let seq_len = input.dim(1).map_err(map_candle_err)?;
            let logits = self
                .model
                .forward(&input, index_pos)
                .and_then(|l| l.squeeze(0))
                .and_then(|l| l.to_dtype(DType::F32))
                .map_err(map_candle_err)?;
            index_pos += seq_len;

            let logits = if (sampling.repetition_penalty - 1.0).abs() < f32::EPSILON {
                logits
            } else {
                let start = all_tokens.len().saturating_sub(REPEAT_LAST_N);
                candle_transformers::utils::apply_repeat_penalty(
                    &logits,
                    sampling.repetition_penalty,
                    &all_tokens[start..],
                )
                .map_err(map_candle_err)?
            };

            let next_token = logits_processor.sample(&logits).map_err(map_candle_err)?;
            if next_token == self.eos_token_id {
                break;
            }

            generated.push(next_token);
            all_tokens.push(next_token);
            input = Tensor::new(&[next_token][..], &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(map_candle_err)?;
        }

        let text = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| CompletionError::Inference(format!("Detokenization failed: {e}")))?;

        debug!(completion_tokens = generated.len(), "Generation complete");

        Ok((text, prompt_len as u32, generated.len() as u32))
    }
}

/// A sampler with a fresh random seed.
fn logits_processor(sampling: &SamplingParams) -> LogitsProcessor {
    let mode = if sampling.temperature <= 0.0 {
        Sampling::ArgMax
    } else {
        Sampling::TopKThenTopP {
            k: sampling.top_k,
            p: sampling.top_p as f64,
            temperature: sampling.temperature as f64,
        }
    };
    LogitsProcessor::from_sampling(rand::random::<u64>(), mode)
}

fn map_candle_err(e: candle_core::Error) -> CompletionError {
    CompletionError::Inference(format!("Candle inference error: {e}"))
}

#[async_trait]
impl CompletionService for LocalCompletion {
    fn name(&self) -> &str {
        "local"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionError> {
        let state = self.state.clone();
        let prompt = request.prompt.clone();

        let (text, prompt_tokens, completion_tokens) = tokio::task::spawn_blocking(move || {
            let mut guard = state.blocking_lock();
            guard.generate(&request)
        })
        .await
        .map_err(|e| CompletionError::Inference(format!("Inference task failed: {e}")))??;

        Ok(Completion {
            text: clean_completion(&prompt, &text),
            model: format!("local/{}", self.model_name),
            usage: Some(Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_preset_aliases() {
        assert!(resolve_preset("tinyllama").is_some());
        assert!(resolve_preset("TinyLlama").is_some());
        assert!(resolve_preset("smollm:360m").is_some());
        assert!(resolve_preset("nonexistent").is_none());
    }

    #[test]
    fn each_request_samples_with_its_own_seed() {
        let sampling = SamplingParams {
            temperature: 1.0,
            top_p: 1.0,
            top_k: 1000,
            repetition_penalty: 1.0,
        };
        let flat = Tensor::zeros(1000, DType::F32, &Device::Cpu).unwrap();
        let picks: Vec<u32> = (0..8)
            .map(|_| logits_processor(&sampling).sample(&flat).unwrap())
            .collect();
        assert!(picks.iter().any(|&t| t != picks[0]), "all samplers agreed: {picks:?}");
    }

    #[test]
    fn zero_temperature_is_greedy() {
        let sampling = SamplingParams {
            temperature: 0.0,
            ..SamplingParams::default()
        };
        let logits = Tensor::new(&[0.1f32, 3.0, 0.2], &Device::Cpu).unwrap();
        assert_eq!(logits_processor(&sampling).sample(&logits).unwrap(), 1);
    }

    #[test]
    fn missing_gguf_path_is_model_not_found() {
        let err = LocalCompletion::load("/definitely/not/here.gguf").err().unwrap();
        assert!(matches!(err, CompletionError::ModelNotFound(_)));
    }

    #[test]
    fn unknown_alias_lists_presets() {
        let err = LocalCompletion::load("gpt-17").err().unwrap();
        assert!(err.to_string().contains("tinyllama"));
    }
}

//! Backend selection: builds the configured completion service.

use crate::openai_compat::OpenAiCompatCompletion;
use sage_config::AppConfig;
use sage_core::completion::CompletionService;
use sage_core::error::CompletionError;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Default base URL per HTTP backend.
pub fn default_base_url(backend: &str) -> Option<&'static str> {
    match backend {
        "openai_compat" => Some("http://localhost:8080/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        _ => None,
    }
}

/// Build the completion backend named by `config.completion.backend`.
///
/// The `local` backend loads its weights here, so a missing or broken model
/// fails startup instead of the first request.
pub async fn build_from_config(
    config: &AppConfig,
) -> Result<Arc<dyn CompletionService>, CompletionError> {
    let completion = &config.completion;
    let timeout = Duration::from_secs(completion.timeout_secs);

    match completion.backend.as_str() {
        backend @ ("openai_compat" | "ollama") => {
            let base_url = completion
                .base_url
                .clone()
                .or_else(|| default_base_url(backend).map(String::from))
                .unwrap_or_default();
            let name = if backend == "ollama" { "ollama" } else { "llama.cpp" };

            info!(
                backend = name,
                url = %base_url,
                model = %completion.model,
                "Using HTTP completion backend"
            );

            let service = OpenAiCompatCompletion::new(
                name,
                base_url,
                completion.model.clone(),
                completion.api_key.clone(),
                timeout,
            )?;
            Ok(Arc::new(service))
        }
        "local" => build_local(&completion.model).await,
        other => Err(CompletionError::NotConfigured(format!(
            "unknown completion backend '{other}'"
        ))),
    }
}

#[cfg(feature = "local")]
async fn build_local(model: &str) -> Result<Arc<dyn CompletionService>, CompletionError> {
    let model = model.to_string();
    info!(model = %model, "Loading local model");
    let service = tokio::task::spawn_blocking(move || crate::local::LocalCompletion::load(&model))
        .await
        .map_err(|e| CompletionError::Inference(format!("Model loading task failed: {e}")))??;
    Ok(Arc::new(service))
}

#[cfg(not(feature = "local"))]
async fn build_local(_model: &str) -> Result<Arc<dyn CompletionService>, CompletionError> {
    Err(CompletionError::NotConfigured(
        "the 'local' backend requires building with `--features local`".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_config_builds_llama_cpp_backend() {
        let config = AppConfig::default();
        let service = build_from_config(&config).await.unwrap();
        assert_eq!(service.name(), "llama.cpp");
    }

    #[tokio::test]
    async fn ollama_backend_is_named_ollama() {
        let mut config = AppConfig::default();
        config.completion.backend = "ollama".into();
        let service = build_from_config(&config).await.unwrap();
        assert_eq!(service.name(), "ollama");
    }

    #[tokio::test]
    async fn unknown_backend_is_rejected() {
        let mut config = AppConfig::default();
        config.completion.backend = "carrier-pigeon".into();
        let err = build_from_config(&config).await.err().unwrap();
        assert!(matches!(err, CompletionError::NotConfigured(_)));
    }

    #[cfg(not(feature = "local"))]
    #[tokio::test]
    async fn local_backend_needs_feature() {
        let mut config = AppConfig::default();
        config.completion.backend = "local".into();
        let err = build_from_config(&config).await.err().unwrap();
        assert!(err.to_string().contains("--features local"));
    }

    #[test]
    fn default_urls() {
        assert_eq!(default_base_url("ollama"), Some("http://localhost:11434/v1"));
        assert_eq!(default_base_url("local"), None);
    }
}

//! The search adapter used by the chat pipeline.

use crate::clean::{clean_text, with_keyword};
use crate::duckduckgo::DuckDuckGoSearch;
use async_trait::async_trait;
use sage_config::AppConfig;
use sage_core::error::SearchError;
use sage_core::search::{SearchProvider, SearchResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Wraps a [`SearchProvider`] with query rewriting, normalization,
/// and failure isolation.
pub struct WebSearch {
    provider: Arc<dyn SearchProvider>,
    keyword: String,
    max_results: usize,
    enabled: bool,
}

impl WebSearch {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        keyword: impl Into<String>,
        max_results: usize,
    ) -> Self {
        Self {
            provider,
            keyword: keyword.into(),
            max_results,
            enabled: true,
        }
    }

    /// An adapter that never calls out and always returns no results.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoProvider), "", 0).with_enabled(false)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// DuckDuckGo with the keyword, limit, and timeout from `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, SearchError> {
        let provider = DuckDuckGoSearch::new(
            config.search.endpoint.clone(),
            Duration::from_secs(config.search.timeout_secs),
        )?;
        Ok(Self::new(
            Arc::new(provider),
            config.search_keyword(),
            config.search.max_results,
        )
        .with_enabled(config.search.enabled))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Search for `query`. Never fails: provider errors are logged and
    /// yield an empty list.
    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        if !self.enabled {
            return Vec::new();
        }

        let query = with_keyword(query, &self.keyword);
        match self.provider.search(&query, self.max_results).await {
            Ok(raw) => {
                let results: Vec<SearchResult> = raw
                    .into_iter()
                    .map(|r| SearchResult::new(clean_text(&r.title), clean_text(&r.snippet)))
                    .filter(|r| !(r.title.is_empty() && r.snippet.is_empty()))
                    .take(self.max_results)
                    .collect();
                debug!(
                    provider = self.provider.name(),
                    query = %query,
                    count = results.len(),
                    "Web search complete"
                );
                results
            }
            Err(e) => {
                warn!(
                    provider = self.provider.name(),
                    query = %query,
                    error = %e,
                    "Web search failed, continuing without results"
                );
                Vec::new()
            }
        }
    }
}

/// Stands in for a provider when search is switched off.
struct NoProvider;

#[async_trait]
impl SearchProvider for NoProvider {
    fn name(&self) -> &str {
        "none"
    }

    async fn search(
        &self,
        _query: &str,
        _max_results: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        Ok(Vec::new())
    }
}

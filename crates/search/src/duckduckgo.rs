//! DuckDuckGo provider: scrapes the keyless HTML results page.

use async_trait::async_trait;
use sage_core::error::SearchError;
use sage_core::search::{SearchProvider, SearchResult};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("sage/", env!("CARGO_PKG_VERSION"));

/// Searches DuckDuckGo through its HTML endpoint (no API key required).
pub struct DuckDuckGoSearch {
    endpoint: String,
    client: reqwest::Client,
}

impl DuckDuckGoSearch {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SearchError::Network(format!("HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        debug!(query, max_results, "Querying DuckDuckGo");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Provider {
                status_code: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        parse_results(&html, max_results)
    }
}

fn selector(css: &str) -> Result<Selector, SearchError> {
    Selector::parse(css).map_err(|e| SearchError::Parse(format!("selector '{css}': {e}")))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect()
}

/// Extract (title, snippet) pairs from a results page, skipping ads.
fn parse_results(html: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
    let blocks = selector(".result:not(.result--ad)")?;
    let title_sel = selector(".result__a")?;
    let snippet_sel = selector(".result__snippet")?;

    let document = Html::parse_document(html);
    let results = document
        .select(&blocks)
        .filter_map(|block| {
            let title = block.select(&title_sel).next().map(element_text)?;
            let snippet = block
                .select(&snippet_sel)
                .next()
                .map(element_text)
                .unwrap_or_default();
            Some(SearchResult::new(title, snippet))
        })
        .take(max_results)
        .collect();

    Ok(results)
}

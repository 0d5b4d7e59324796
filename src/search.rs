//! Web-search adapter: one domain-restricted search call per request, plus an
//! extract call used only when a record-detail link must be followed.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::types::SearchCandidate;

/// Remote search operations the pipeline depends on, kept behind a trait so
/// tests can drive the orchestration with canned candidates.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// One search call restricted to `domain`, ranked by provider score.
    async fn search(&self, query: &str, domain: &str) -> Result<Vec<SearchCandidate>>;

    /// Fetch the raw content of a single follow-up document.
    async fn extract(&self, url: &str) -> Result<String>;
}

/// Tavily-style search API client.
pub struct TavilySearchClient {
    http_client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    include_domains: Vec<&'a str>,
    include_raw_content: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchCandidate>,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    urls: Vec<&'a str>,
}

#[derive(Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    results: Vec<ExtractedDocument>,
}

#[derive(Deserialize)]
struct ExtractedDocument {
    #[serde(default)]
    raw_content: String,
}

impl TavilySearchClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for TavilySearchClient {
    async fn search(&self, query: &str, domain: &str) -> Result<Vec<SearchCandidate>> {
        let request = SearchRequest {
            query,
            include_domains: vec![domain],
            include_raw_content: true,
        };

        let response = self
            .http_client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(anyhow!("Search API request failed: {} {}", status, body));
        }

        let parsed: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("Failed to parse search response: {}", e))?;
        Ok(parsed.results)
    }

    async fn extract(&self, url: &str) -> Result<String> {
        let request = ExtractRequest { urls: vec![url] };

        let response = self
            .http_client
            .post(format!("{}/extract", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(anyhow!("Extract API request failed: {} {}", status, body));
        }

        let parsed: ExtractResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("Failed to parse extract response: {}", e))?;
        let content = parsed
            .results
            .into_iter()
            .map(|d| d.raw_content)
            .find(|c| !c.is_empty())
            .ok_or_else(|| anyhow!("Extract returned no content for {}", url))?;
        Ok(content)
    }
}

/// Pick the candidate to hand to the completion pass.
///
/// Sort descending by provider score; prefer the best-scoring candidate whose
/// content mentions the search address, otherwise fall back to the
/// top-scoring candidate overall. `normalized_address` must already be in
/// comparison form.
pub fn select_candidate(
    mut candidates: Vec<SearchCandidate>,
    normalized_address: &str,
) -> Option<SearchCandidate> {
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let matching = candidates
        .iter()
        .position(|c| c.content.to_lowercase().contains(normalized_address));

    let index = matching.unwrap_or(0);
    Some(candidates.swap_remove(index))
}

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::SearchResult;

/// Words in a clause that usually signal an exception or an override.
const CONFLICT_INDICATORS: &[&str] = &[
    "except",
    "however",
    "unless",
    "provided",
    "subject to",
    "notwithstanding",
    "conflict",
    "override",
    "supersede",
];

const DELIMITER: &str = "------------------------------------------------------------";

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("knowledge base unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("knowledge base timed out after {0}s")]
    Timeout(u64),
    #[error("knowledge base returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed knowledge base response: {0}")]
    Decode(String),
    #[error("empty search query")]
    EmptyQuery,
}

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Run one search. `Ok(vec![])` means the search succeeded with no matches.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;
}

#[derive(Debug, Clone, Copy)]
pub struct KbSettings {
    pub top_k: u32,
    pub timeout_s: u64,
}

impl Default for KbSettings {
    fn default() -> Self {
        Self {
            top_k: 12,
            timeout_s: 35,
        }
    }
}

/// Client for a knowledge-base search endpoint (`POST {query, top_k}`).
pub struct HttpKnowledgeBase {
    url: String,
    settings: KbSettings,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: u32,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Option<Vec<RawResult>>,
}

#[derive(Deserialize)]
struct RawResult {
    #[serde(default)]
    doc_id: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

impl HttpKnowledgeBase {
    pub fn new(url: impl Into<String>, settings: KbSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_s))
            .build()
            .context("failed to build knowledge base HTTP client")?;
        Ok(Self {
            url: url.into(),
            settings,
            http,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KnowledgeBase for HttpKnowledgeBase {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if self.url.trim().is_empty() {
            return Err(SearchError::Unavailable {
                reason: "knowledge base URL not configured".into(),
            });
        }

        let body = SearchRequest {
            query,
            top_k: self.settings.top_k,
        };

        let response = match self.http.post(&self.url).json(&body).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!(kb_url = %self.url, timeout_s = self.settings.timeout_s, "knowledge base search timed out");
                return Err(SearchError::Timeout(self.settings.timeout_s));
            }
            Err(e) => {
                warn!(kb_url = %self.url, "knowledge base request failed: {}", e);
                return Err(SearchError::Unavailable {
                    reason: e.to_string(),
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(kb_url = %self.url, status = %status, "knowledge base returned non-200");
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;

        let results: Vec<SearchResult> = parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, r)| SearchResult {
                id: r
                    .doc_id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("unknown_doc_{}", i + 1)),
                content: r.content.unwrap_or_default(),
                score: r.score.unwrap_or(0.0),
            })
            .collect();

        info!(kb_url = %self.url, query_len = query.len(), results = results.len(), "knowledge base search done");
        Ok(results)
    }
}

/// Whether `content` contains any exception/override wording.
pub fn has_conflict_indicators(content: &str) -> bool {
    let lower = content.to_lowercase();
    CONFLICT_INDICATORS.iter().any(|w| lower.contains(w))
}

/// Render a search outcome as plain text for the model. Never fails: errors
/// become a `SEARCH ERROR` line and empty results a `No documents found` line.
pub fn render_search(
    query: &str,
    search_type: &str,
    outcome: &Result<Vec<SearchResult>, SearchError>,
) -> String {
    let results = match outcome {
        Err(e) => return format!("SEARCH ERROR [{search_type}]: {e}"),
        Ok(r) if r.is_empty() => {
            return format!("SEARCH [{search_type}]: No documents found for '{query}'")
        }
        Ok(r) => r,
    };

    let mut out = format!(
        "=== {} SEARCH: '{}' ===\nFound {} documents\n",
        search_type.to_uppercase(),
        query,
        results.len()
    );
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!(
            "\nDOCUMENT #{}:\n  ID: {}\n  Score: {:.3}\n  Potential Conflicts: {}\n  Content: {}\n  {}\n",
            i + 1,
            r.id,
            r.score,
            if has_conflict_indicators(&r.content) { "YES" } else { "NO" },
            r.content,
            DELIMITER,
        ));
    }
    out
}

/// Run one tool-initiated search under its own timeout and render the outcome.
pub async fn search_as_text(
    kb: &dyn KnowledgeBase,
    query: &str,
    search_type: &str,
    timeout_s: u64,
) -> String {
    let outcome = if query.trim().is_empty() {
        Err(SearchError::EmptyQuery)
    } else {
        match tokio::time::timeout(Duration::from_secs(timeout_s), kb.search(query)).await {
            Ok(r) => r,
            Err(_) => Err(SearchError::Timeout(timeout_s)),
        }
    };
    render_search(query, search_type, &outcome)
}

// ── Tests ──────────────────────────────────────────────────────────────────

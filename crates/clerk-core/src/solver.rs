use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    agent::AgentBackend,
    extract,
    kb::{HttpKnowledgeBase, KbSettings, KnowledgeBase},
    types::{AgentContext, PromptConfig, SolveResult},
};

/// Citation sentinel used whenever no citation could be produced.
pub const NO_CITATIONS: &str = "No citations available";

const QUOTA_MARKERS: &[&str] = &["429", "quota", "rate limit", "insufficient_quota", "billing"];

/// Wires the knowledge base, the agent backend and the post-processor
/// together for one question at a time. Holds no per-request state.
pub struct Solver {
    backend: Arc<dyn AgentBackend>,
    prompt: PromptConfig,
    kb_settings: KbSettings,
    max_tool_calls: u32,
}

impl Solver {
    pub fn new(backend: Arc<dyn AgentBackend>, prompt: PromptConfig) -> Self {
        Self {
            backend,
            prompt,
            kb_settings: KbSettings::default(),
            max_tool_calls: 12,
        }
    }

    pub fn with_kb_settings(mut self, settings: KbSettings) -> Self {
        self.kb_settings = settings;
        self
    }

    pub fn with_max_tool_calls(mut self, max: u32) -> Self {
        self.max_tool_calls = max;
        self
    }

    pub fn backend(&self) -> &dyn AgentBackend {
        self.backend.as_ref()
    }

    pub fn prompt(&self) -> &PromptConfig {
        &self.prompt
    }

    /// Answer `query` against the knowledge base at `kb_search_url`.
    /// Never fails: any error becomes a degraded but well-formed result.
    pub async fn solve(&self, query: &str, kb_search_url: &str) -> SolveResult {
        let kb = match HttpKnowledgeBase::new(kb_search_url, self.kb_settings) {
            Ok(kb) => kb,
            Err(e) => {
                warn!(kb_url = %kb_search_url, "failed to build knowledge base client: {e:#}");
                return degraded(query, &format!("{e:#}"));
            }
        };
        info!(kb_url = %kb.url(), top_k = self.kb_settings.top_k, "knowledge base bound for request");
        self.solve_with(query, Arc::new(kb)).await
    }

    /// Like [`Solver::solve`] with an already-built knowledge base.
    pub async fn solve_with(&self, query: &str, kb: Arc<dyn KnowledgeBase>) -> SolveResult {
        let ctx = AgentContext {
            kb,
            max_tool_calls: self.max_tool_calls,
            tool_timeout_s: self.kb_settings.timeout_s,
        };

        info!(
            backend = self.backend.name(),
            model = self.backend.model(),
            question_len = query.len(),
            "solving question"
        );

        match self.backend.run(query, &self.prompt, ctx).await {
            Ok(output) => {
                let result = assemble(output.transcript);
                info!(
                    tool_calls = output.tool_calls,
                    rounds = output.rounds,
                    ids = result.retrieved_context_ids.len(),
                    "question solved"
                );
                result
            }
            Err(e) => {
                warn!(backend = self.backend.name(), "agent invocation failed: {e:#}");
                degraded(query, &format!("{e:#}"))
            }
        }
    }
}

/// Run a transcript through the post-processor and build the result.
pub fn assemble(transcript: String) -> SolveResult {
    let ids = extract::extract_document_ids(&transcript);
    let citation = extract::extract_citation(&transcript, &ids);
    let final_answer = extract::extract_final_answer(&transcript);

    let mut thought_process = transcript;
    if ids.is_empty() {
        thought_process.push_str(
            "\n\nQUALITY WARNING: No document IDs detected in the analysis.",
        );
    }
    if !thought_process.to_lowercase().contains("conflict") {
        thought_process.push_str(
            "\n\nCONFLICT CHECK: The analysis does not explicitly address conflicting provisions.",
        );
    }

    SolveResult {
        thought_process,
        retrieved_context_ids: ids,
        final_answer,
        citation: if citation.is_empty() {
            NO_CITATIONS.to_string()
        } else {
            citation
        },
    }
}

/// Result returned when the agent could not be run to completion.
pub fn degraded(query: &str, error: &str) -> SolveResult {
    let lower = error.to_lowercase();
    if QUOTA_MARKERS.iter().any(|m| lower.contains(m)) {
        return SolveResult {
            thought_process: format!(
                "MODEL QUOTA EXCEEDED: the language model provider rejected the request.\n\n\
                 Original query: {query}\n\nError details: {error}"
            ),
            retrieved_context_ids: Vec::new(),
            final_answer: format!(
                "Unable to analyze the question because the language model quota is exhausted. \
                 This is a temporary technical issue unrelated to the question. Error: {error}"
            ),
            citation: NO_CITATIONS.to_string(),
        };
    }

    SolveResult {
        thought_process: format!(
            "SYSTEM ERROR: {error}\n\nUnable to complete the legal analysis; \
             the knowledge base or language model may be unreachable."
        ),
        retrieved_context_ids: Vec::new(),
        final_answer: format!("Cannot provide legal guidance due to system error: {error}"),
        citation: NO_CITATIONS.to_string(),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_detects_quota_errors() {
        let r = degraded("q", "OpenAI returned 429 Too Many Requests");
        assert!(r.thought_process.starts_with("MODEL QUOTA EXCEEDED"));
        assert!(r.retrieved_context_ids.is_empty());
        assert_eq!(r.citation, NO_CITATIONS);
    }

    #[test]
    fn degraded_generic_error_mentions_cause() {
        let r = degraded("q", "connection refused");
        assert!(r.thought_process.contains("connection refused"));
        assert!(r.final_answer.contains("connection refused"));
        assert_eq!(r.citation, NO_CITATIONS);
    }

    #[test]
    fn assemble_without_ids_uses_sentinel_and_warns() {
        let r = assemble("Nothing useful was found about conflicts.".into());
        assert!(r.retrieved_context_ids.is_empty());
        assert_eq!(r.citation, NO_CITATIONS);
        assert!(r.thought_process.contains("QUALITY WARNING"));
        assert!(!r.thought_process.contains("CONFLICT CHECK"));
    }
}

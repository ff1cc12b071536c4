use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::kb::KnowledgeBase;

// ── Knowledge Base ───────────────────────────────────────────────────────

/// One ranked document returned by the knowledge-base search API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    pub score: f64,
}

// ── Solve Result ─────────────────────────────────────────────────────────

/// Structured answer returned to the caller for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    /// Full model transcript (or an error description on failure).
    pub thought_process: String,
    /// Unique document IDs in first-seen order.
    pub retrieved_context_ids: Vec<String>,
    pub final_answer: String,
    /// `id: "quote"` entries joined with `"; "`.
    pub citation: String,
}

// ── Prompt Profiles ──────────────────────────────────────────────────────

/// Prompt material for one agent run. Built-in profiles live in `clerk-domains`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptConfig {
    pub name: String,
    /// Human-readable name shown by `/health`.
    pub label: String,
    pub system_prompt: String,
    /// Per-question instruction; `{QUESTION}` is replaced with the user question.
    pub instruction: String,
    pub tool_name: String,
    pub tool_description: String,
}

// ── Agent Invocation ─────────────────────────────────────────────────────

/// Request-scoped collaborators handed to an agent backend.
#[derive(Clone)]
pub struct AgentContext {
    /// Search capability exposed to the model as a tool.
    pub kb: Arc<dyn KnowledgeBase>,
    /// Upper bound on tool calls the model may make for this request.
    pub max_tool_calls: u32,
    /// Timeout applied to each individual search.
    pub tool_timeout_s: u64,
}

/// What a backend produced for one question.
#[derive(Debug, Clone, Default)]
pub struct AgentOutput {
    /// Final assistant text, consumed once by the post-processor.
    pub transcript: String,
    pub tool_calls: u32,
    pub rounds: u32,
}

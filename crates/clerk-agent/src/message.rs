use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failure talking to the model provider. Surfaced to the orchestrator,
/// which turns it into a degraded answer.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model request failed: {0}")]
    Transport(String),

    #[error("model request timed out after {0}s")]
    Timeout(u64),

    #[error("model API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse model response: {0}")]
    Decode(String),

    #[error("model response contained no message")]
    EmptyResponse,
}

impl AgentError {
    pub fn from_reqwest(e: reqwest::Error, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            Self::Timeout(timeout_secs)
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// One chat message as exchanged with OpenAI-compatible and Ollama chat APIs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn tool(call_id: Option<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".into(),
            content: Some(content.into()),
            tool_call_id: call_id,
            ..Default::default()
        }
    }

    /// Tool calls requested by this message, if any.
    pub fn requested_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Present for OpenAI; Ollama does not number its calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded string (OpenAI) or a JSON object (Ollama). Kept as
    /// received so it can be echoed back verbatim in the next request.
    #[serde(default)]
    pub arguments: Value,
}

// ── OpenAI chat completions ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

// ── Ollama chat ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OllamaChatResponse {
    pub message: Option<ChatMessage>,
    pub done_reason: Option<String>,
}

// ── Tests ──────────────────────────────────────────────────────────────────

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use clerk_core::{
    agent::AgentBackend,
    types::{AgentContext, AgentOutput, PromptConfig},
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    message::{AgentError, ChatMessage, OllamaChatResponse},
    tools::{self, ToolBudget},
};

/// Calls a locally-hosted Ollama model via its native chat API.
///
/// Intended for deployments where questions must not leave the local
/// machine. The model needs tool-calling support to consult the knowledge
/// base; without it the answer will carry no citations.
pub struct OllamaBackend {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            timeout_secs: 300,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Value]>,
    options: OllamaOptions,
}

#[async_trait]
impl AgentBackend for OllamaBackend {
    async fn run(&self, question: &str, prompt: &PromptConfig, ctx: AgentContext) -> Result<AgentOutput> {
        let mut messages = Vec::new();
        if !prompt.system_prompt.is_empty() {
            messages.push(ChatMessage::system(prompt.system_prompt.clone()));
        }
        messages.push(ChatMessage::user(crate::instruction::build_instruction(question, prompt)));

        let tool_defs = vec![tools::search_tool_schema(prompt)];
        let mut budget = ToolBudget::new(ctx.max_tool_calls);
        let max_rounds = ctx.max_tool_calls.saturating_add(2);

        info!(
            model = %self.model,
            base_url = %self.base_url,
            "calling ollama chat API"
        );

        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let mut rounds = 0;
        loop {
            rounds += 1;
            let tools_enabled = !budget.exhausted() && rounds < max_rounds;
            let request_body = OllamaChatRequest {
                model: &self.model,
                messages: &messages,
                stream: false,
                tools: tools_enabled.then_some(tool_defs.as_slice()),
                options: OllamaOptions { temperature: 0.0 },
            };

            let response = match client.post(&url).json(&request_body).send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!(model = %self.model, "ollama request failed: {}", e);
                    return Err(AgentError::from_reqwest(e, self.timeout_secs).into());
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, model = %self.model, "ollama returned non-200: {}", body);
                return Err(AgentError::Status {
                    status: status.as_u16(),
                    body,
                }
                .into());
            }

            let parsed: OllamaChatResponse = response
                .json()
                .await
                .map_err(|e| AgentError::Decode(e.to_string()))?;
            let reply = parsed.message.ok_or(AgentError::EmptyResponse)?;

            if reply.requested_calls().is_empty() || !tools_enabled {
                let transcript = reply.text().to_string();
                info!(
                    rounds,
                    tool_calls = budget.used(),
                    output_len = transcript.len(),
                    done_reason = parsed.done_reason.as_deref().unwrap_or("unknown"),
                    "ollama response received"
                );
                return Ok(AgentOutput {
                    transcript,
                    tool_calls: budget.used(),
                    rounds,
                });
            }

            let calls = reply.requested_calls().to_vec();
            messages.push(reply);
            for call in &calls {
                let result = tools::dispatch(call, prompt, &ctx, &mut budget).await;
                messages.push(ChatMessage::tool(None, result));
            }
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

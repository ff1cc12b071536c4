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
    message::{AgentError, ChatMessage, Choice, CompletionResponse},
    tools::{self, ToolBudget},
};

/// Calls an OpenAI-compatible chat completions API with the knowledge base
/// search exposed as a function tool.
pub struct OpenAiBackend {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl OpenAiBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: 120,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    async fn complete(
        &self,
        client: &reqwest::Client,
        request: &CompletionRequest<'_>,
    ) -> Result<Choice, AgentError> {
        let mut req = client.post(self.endpoint()).json(request);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| AgentError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, model = %self.model, "chat completions returned non-200: {}", body);
            return Err(AgentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Decode(e.to_string()))?;

        if let Some(usage) = &parsed.usage {
            info!(
                prompt_tokens = usage.prompt_tokens.unwrap_or(0),
                completion_tokens = usage.completion_tokens.unwrap_or(0),
                "chat completion usage"
            );
        }

        parsed
            .choices
            .into_iter()
            .next()
            .ok_or(AgentError::EmptyResponse)
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    tools: &'a [Value],
    tool_choice: &'static str,
}

#[async_trait]
impl AgentBackend for OpenAiBackend {
    async fn run(&self, question: &str, prompt: &PromptConfig, ctx: AgentContext) -> Result<AgentOutput> {
        let mut messages = Vec::new();
        if !prompt.system_prompt.is_empty() {
            messages.push(ChatMessage::system(prompt.system_prompt.clone()));
        }
        messages.push(ChatMessage::user(crate::instruction::build_instruction(question, prompt)));

        let tool_defs = vec![tools::search_tool_schema(prompt)];
        let mut budget = ToolBudget::new(ctx.max_tool_calls);
        // Allows one forced final turn after the budget runs out.
        let max_rounds = ctx.max_tool_calls.saturating_add(2);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        info!(
            model = %self.model,
            endpoint = %self.endpoint(),
            max_tool_calls = ctx.max_tool_calls,
            "calling chat completions API"
        );

        let mut rounds = 0;
        loop {
            rounds += 1;
            let tools_enabled = !budget.exhausted() && rounds < max_rounds;
            let request = CompletionRequest {
                model: &self.model,
                messages: &messages,
                temperature: 0.0,
                tools: &tool_defs,
                tool_choice: if tools_enabled { "auto" } else { "none" },
            };
            let Choice {
                message: reply,
                finish_reason,
            } = self.complete(&client, &request).await?;

            if reply.requested_calls().is_empty() || !tools_enabled {
                let transcript = reply.text().to_string();
                info!(
                    rounds,
                    tool_calls = budget.used(),
                    output_len = transcript.len(),
                    finish_reason = finish_reason.as_deref().unwrap_or("unknown"),
                    "chat completions answer received"
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
                messages.push(ChatMessage::tool(call.id.clone(), result));
            }
        }
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

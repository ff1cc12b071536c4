use anyhow::Result;
use async_trait::async_trait;

use crate::types::{AgentContext, AgentOutput, PromptConfig};

#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Answer one question, calling the knowledge base through `ctx` as often
    /// as the tool budget allows. Transport and auth failures are returned as
    /// errors without retrying.
    async fn run(
        &self,
        question: &str,
        prompt: &PromptConfig,
        ctx: AgentContext,
    ) -> Result<AgentOutput>;

    /// Short identifier for health output and logs.
    fn name(&self) -> &str;

    fn model(&self) -> &str;
}

use clerk_core::{kb::search_as_text, types::AgentContext, PromptConfig};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::message::ToolCall;

const DEFAULT_SEARCH_TYPE: &str = "general";

/// Function schema advertised to the model. Both chat APIs accept this shape.
pub fn search_tool_schema(prompt: &PromptConfig) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": prompt.tool_name,
            "description": prompt.tool_description,
            "parameters": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query for the zoning code knowledge base"
                    },
                    "search_type": {
                        "type": "string",
                        "description": "Label for this pass: primary, conflict, restriction, boundary, exception or procedure"
                    }
                },
                "required": ["query"]
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    search_type: Option<String>,
}

fn parse_args(arguments: &Value) -> Result<SearchArgs, String> {
    match arguments {
        Value::String(s) => serde_json::from_str(s).map_err(|e| e.to_string()),
        Value::Object(_) => serde_json::from_value(arguments.clone()).map_err(|e| e.to_string()),
        other => Err(format!("expected a JSON object, got {other}")),
    }
}

/// Counts searches made during one agent run.
#[derive(Debug)]
pub struct ToolBudget {
    max: u32,
    used: u32,
}

impl ToolBudget {
    pub fn new(max: u32) -> Self {
        Self { max, used: 0 }
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn exhausted(&self) -> bool {
        self.used >= self.max
    }
}

/// Execute one tool call and return the text handed back to the model.
///
/// Never fails: unknown tools, bad arguments, an exhausted budget and search
/// failures all come back as text so the model can keep going.
pub async fn dispatch(
    call: &ToolCall,
    prompt: &PromptConfig,
    ctx: &AgentContext,
    budget: &mut ToolBudget,
) -> String {
    let name = call.function.name.as_str();
    if name != prompt.tool_name {
        warn!(tool = %name, "model called unknown tool");
        return format!(
            "ERROR: unknown tool '{name}'. The only available tool is '{}'.",
            prompt.tool_name
        );
    }

    if budget.exhausted() {
        warn!(max = budget.max, "search budget exhausted");
        return format!(
            "SEARCH LIMIT REACHED: {} searches already performed. \
             Write the final answer from the documents retrieved so far.",
            budget.max
        );
    }

    let args = match parse_args(&call.function.arguments) {
        Ok(a) => a,
        Err(e) => {
            warn!(tool = %name, "unparsable tool arguments: {e}");
            return format!("ERROR: invalid arguments for '{name}': {e}");
        }
    };

    budget.used += 1;
    let search_type = args
        .search_type
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SEARCH_TYPE);

    debug!(
        query = %args.query,
        search_type,
        n = budget.used,
        "running knowledge base search"
    );
    search_as_text(ctx.kb.as_ref(), &args.query, search_type, ctx.tool_timeout_s).await
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use clerk_core::{
        kb::{KnowledgeBase, SearchError},
        SearchResult,
    };

    use super::*;
    use crate::message::FunctionCall;

    #[derive(Default)]
    struct RecordingKb {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl KnowledgeBase for RecordingKb {
        async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(vec![SearchResult {
                id: "clause_B_2".into(),
                content: "Zone B allows 4 stories".into(),
                score: 0.9,
            }])
        }
    }

    fn prompt() -> PromptConfig {
        PromptConfig {
            tool_name: "search_knowledge_base".into(),
            ..Default::default()
        }
    }

    fn ctx(kb: Arc<RecordingKb>, max: u32) -> AgentContext {
        AgentContext {
            kb,
            max_tool_calls: max,
            tool_timeout_s: 5,
        }
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: Some("call_1".into()),
            kind: Some("function".into()),
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }

    #[tokio::test]
    async fn string_and_object_arguments_both_search() {
        let kb = Arc::new(RecordingKb::default());
        let ctx = ctx(Arc::clone(&kb), 5);
        let mut budget = ToolBudget::new(5);

        let out = dispatch(
            &call("search_knowledge_base", json!("{\"query\":\"height\",\"search_type\":\"primary\"}")),
            &prompt(),
            &ctx,
            &mut budget,
        )
        .await;
        assert!(out.starts_with("=== PRIMARY SEARCH: 'height' ==="));

        let out = dispatch(
            &call("search_knowledge_base", json!({"query": "setbacks"})),
            &prompt(),
            &ctx,
            &mut budget,
        )
        .await;
        assert!(out.starts_with("=== GENERAL SEARCH: 'setbacks' ==="));
        assert_eq!(budget.used(), 2);
        assert_eq!(*kb.queries.lock().unwrap(), vec!["height", "setbacks"]);
    }

    #[tokio::test]
    async fn budget_stops_further_searches() {
        let kb = Arc::new(RecordingKb::default());
        let ctx = ctx(Arc::clone(&kb), 1);
        let mut budget = ToolBudget::new(1);
        let c = call("search_knowledge_base", json!({"query": "q"}));

        dispatch(&c, &prompt(), &ctx, &mut budget).await;
        let out = dispatch(&c, &prompt(), &ctx, &mut budget).await;
        assert!(out.starts_with("SEARCH LIMIT REACHED"));
        assert!(budget.exhausted());
        assert_eq!(kb.queries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_tool_and_bad_arguments_become_error_text() {
        let kb = Arc::new(RecordingKb::default());
        let ctx = ctx(Arc::clone(&kb), 3);
        let mut budget = ToolBudget::new(3);

        let out = dispatch(&call("delete_everything", json!({})), &prompt(), &ctx, &mut budget).await;
        assert!(out.starts_with("ERROR: unknown tool 'delete_everything'"));

        let out = dispatch(&call("search_knowledge_base", json!("{not json")), &prompt(), &ctx, &mut budget).await;
        assert!(out.starts_with("ERROR: invalid arguments"));

        let out = dispatch(&call("search_knowledge_base", json!(42)), &prompt(), &ctx, &mut budget).await;
        assert!(out.starts_with("ERROR: invalid arguments"));

        assert_eq!(budget.used(), 0);
        assert!(kb.queries.lock().unwrap().is_empty());
    }
}

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use clerk_core::SolveResult;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::AppState;

pub(crate) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/solve", post(solve))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Error helper ──────────────────────────────────────────────────────────

type ApiError = (StatusCode, Json<Value>);

fn bad_request(detail: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail.into() })))
}

// ── Request body types ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct SolveBody {
    pub query: Option<String>,
    /// Alias for `query` used by some callers.
    pub claim: Option<String>,
    pub kb_search_url: Option<String>,
}

impl SolveBody {
    fn question(&self) -> Option<&str> {
        [self.query.as_deref(), self.claim.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|q| !q.is_empty())
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn root() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "zoning clerk",
        "endpoint": "POST /solve",
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let backend = state.solver.backend();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": backend.name(),
        "model": backend.model(),
        "profile": state.solver.prompt().label,
        "llm_configured": state.config.llm_configured(),
        "uptime_s": state.start_time.elapsed().as_secs(),
        "started_at": state.started_at.to_rfc3339(),
    }))
}

async fn solve(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SolveBody>, JsonRejection>,
) -> Result<Json<SolveResult>, ApiError> {
    let Json(body) = body.map_err(|e| bad_request(e.body_text()))?;

    let question = body
        .question()
        .ok_or_else(|| bad_request("request must include a non-empty 'query' or 'claim'"))?;
    let kb_url = body
        .kb_search_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| bad_request("request must include a non-empty 'kb_search_url'"))?;

    info!(question_len = question.len(), kb_url = %kb_url, "solve request");
    let result = state.solver.solve(question, kb_url).await;
    info!(
        ids = result.retrieved_context_ids.len(),
        output_len = result.thought_process.len(),
        "solve finished"
    );
    Ok(Json(result))
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use anyhow::Result;
    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use chrono::{DateTime, Utc};
    use clerk_core::{
        agent::AgentBackend,
        config::Config,
        solver::{Solver, NO_CITATIONS},
        types::{AgentContext, AgentOutput, PromptConfig},
    };
    use tower::ServiceExt;

    use super::*;

    struct EchoBackend;

    #[async_trait]
    impl AgentBackend for EchoBackend {
        async fn run(&self, question: &str, _p: &PromptConfig, _ctx: AgentContext) -> Result<AgentOutput> {
            Ok(AgentOutput {
                transcript: format!(
                    "Checked for conflict.\n\n**Final Answer:**\nThe question '{question}' is answered by clause_B_2 which allows four stories.\n\n**Citations:**\nclause_B_2: \"Zone B allows 4 stories\""
                ),
                tool_calls: 0,
                rounds: 1,
            })
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-1"
        }
    }

    fn config() -> Config {
        Config {
            backend: "openai".into(),
            openai_api_key: String::new(),
            openai_base_url: "http://localhost/v1".into(),
            model: "echo-1".into(),
            ollama_base_url: String::new(),
            ollama_model: String::new(),
            prompt_profile: "zoning_clerk".into(),
            kb_top_k: 12,
            kb_timeout_s: 35,
            agent_timeout_s: 120,
            max_tool_calls: 12,
            web_bind: "127.0.0.1".into(),
            web_port: 0,
            log_format: "text".into(),
        }
    }

    fn app() -> Router {
        let started_at: DateTime<Utc> = Utc::now();
        router(Arc::new(AppState {
            solver: Arc::new(Solver::new(
                Arc::new(EchoBackend),
                PromptConfig {
                    name: "zoning_clerk".into(),
                    label: "Zoning Clerk".into(),
                    ..Default::default()
                },
            )),
            config: Arc::new(config()),
            start_time: Instant::now(),
            started_at,
        }))
    }

    async fn call(req: Request<Body>) -> (StatusCode, Value) {
        let resp = app().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn post_json(body: Value) -> Request<Body> {
        Request::post("/solve")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn root_reports_service() {
        let (status, body) = call(Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["endpoint"], "POST /solve");
    }

    #[tokio::test]
    async fn health_reports_backend_and_credentials() {
        let (status, body) = call(Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["backend"], "echo");
        assert_eq!(body["model"], "echo-1");
        assert_eq!(body["profile"], "Zoning Clerk");
        assert_eq!(body["llm_configured"], false);
        assert!(body["uptime_s"].is_u64());
        assert!(DateTime::parse_from_rfc3339(body["started_at"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn solve_returns_structured_result() {
        let (status, body) = call(post_json(json!({
            "query": "Can I build 3 stories in Zone B?",
            "kb_search_url": "http://127.0.0.1:9/search"
        })))
        .await;
        assert_eq!(status, StatusCode::OK);
        let result: SolveResult = serde_json::from_value(body).unwrap();
        assert_eq!(result.retrieved_context_ids, vec!["clause_B_2".to_string()]);
        assert_eq!(result.citation, "clause_B_2: \"Zone B allows 4 stories\"");
        assert!(result.final_answer.contains("Can I build 3 stories in Zone B?"));
    }

    #[tokio::test]
    async fn solve_accepts_claim_alias() {
        let (status, body) = call(post_json(json!({
            "claim": "Zone B height",
            "kb_search_url": "http://127.0.0.1:9/search"
        })))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(body["citation"], NO_CITATIONS);
    }

    #[tokio::test]
    async fn solve_rejects_missing_question_or_url() {
        let (status, body) = call(post_json(json!({"kb_search_url": "http://kb/search"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("query"));

        let (status, _) = call(post_json(json!({"query": "   ", "kb_search_url": "http://kb/search"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(post_json(json!({"query": "q", "kb_search_url": " "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("kb_search_url"));
    }

    #[tokio::test]
    async fn solve_rejects_malformed_json() {
        let req = Request::post("/solve")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());
    }
}

mod routes;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clerk_agent::{OllamaBackend, OpenAiBackend};
use clerk_core::{agent::AgentBackend, config::Config, kb::KbSettings, solver::Solver};
use tracing::{info, warn};

// ── AppState ──────────────────────────────────────────────────────────────

pub struct AppState {
    pub solver: Arc<Solver>,
    pub config: Arc<Config>,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "clerk_server=info,clerk_core=info,clerk_agent=info,tower_http=debug".into()
    });
    if config.log_format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_backend(config: &Config) -> Arc<dyn AgentBackend> {
    match config.backend.as_str() {
        "ollama" => Arc::new(
            OllamaBackend::new(&config.ollama_base_url, &config.ollama_model)
                .with_timeout(config.agent_timeout_s),
        ),
        _ => Arc::new(
            OpenAiBackend::new(&config.openai_base_url, &config.openai_api_key, &config.model)
                .with_timeout(config.agent_timeout_s),
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_logging(&config);

    let prompt = clerk_domains::get_prompt(&config.prompt_profile)
        .with_context(|| format!("unknown PROMPT_PROFILE {:?}", config.prompt_profile))?;

    let backend = build_backend(&config);
    if !config.llm_configured() {
        warn!(backend = %config.backend, "no model credential configured; /solve will return degraded answers");
    }

    let solver = Solver::new(backend, prompt)
        .with_kb_settings(KbSettings {
            top_k: config.kb_top_k,
            timeout_s: config.kb_timeout_s,
        })
        .with_max_tool_calls(config.max_tool_calls);

    info!(
        backend = %config.backend,
        model = %config.active_model(),
        profile = %solver.prompt().name,
        max_tool_calls = config.max_tool_calls,
        "solver ready"
    );

    let config = Arc::new(config);
    let state = Arc::new(AppState {
        solver: Arc::new(solver),
        config: Arc::clone(&config),
        start_time: Instant::now(),
        started_at: Utc::now(),
    });

    let app = routes::router(state);

    let addr = format!("{}:{}", config.web_bind, config.web_port);
    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}

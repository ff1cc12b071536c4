use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;

/// Full application configuration.
/// Everything comes from the process environment, falling back to `.env`.
#[derive(Debug, Clone)]
pub struct Config {
    /// "openai" (default) or "ollama".
    pub backend: String,

    // OpenAI-compatible backend
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub model: String,

    // Ollama backend
    pub ollama_base_url: String,
    pub ollama_model: String,

    /// Built-in prompt profile name (see `clerk_domains::get_prompt`).
    pub prompt_profile: String,

    // Knowledge base
    pub kb_top_k: u32,
    pub kb_timeout_s: u64,

    // Agent lifecycle
    pub agent_timeout_s: u64,
    pub max_tool_calls: u32,

    // Web server
    pub web_bind: String,
    pub web_port: u16,
    /// "text" (default) or "json" log lines.
    pub log_format: String,
}

fn parse_dotenv(path: &Path) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let Ok(contents) = std::fs::read_to_string(path) else {
        return map;
    };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            let v = v.trim().trim_matches('"');
            map.insert(k.trim().to_string(), v.to_string());
        }
    }
    map
}

fn get(key: &str, dotenv: &HashMap<String, String>) -> Option<String> {
    std::env::var(key).ok().or_else(|| dotenv.get(key).cloned())
}

fn get_str(key: &str, dotenv: &HashMap<String, String>, default: &str) -> String {
    get(key, dotenv).unwrap_or_else(|| default.to_string())
}

fn get_u32(key: &str, dotenv: &HashMap<String, String>, default: u32) -> u32 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_u64(key: &str, dotenv: &HashMap<String, String>, default: u64) -> u64 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_u16(key: &str, dotenv: &HashMap<String, String>, default: u16) -> u16 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_dotenv(Path::new(".env"))
    }

    /// Like [`Config::from_env`] but reads the fallback file from `dotenv_path`.
    pub fn from_env_with_dotenv(dotenv_path: &Path) -> Result<Self> {
        let dotenv = parse_dotenv(dotenv_path);

        let backend = get_str("BACKEND", &dotenv, "openai").to_lowercase();
        if backend != "openai" && backend != "ollama" {
            anyhow::bail!("unknown BACKEND {backend:?} (expected \"openai\" or \"ollama\")");
        }

        Ok(Config {
            backend,
            openai_api_key: get_str("OPENAI_API_KEY", &dotenv, ""),
            openai_base_url: get_str("OPENAI_BASE_URL", &dotenv, "https://api.openai.com/v1"),
            model: get_str("MODEL", &dotenv, "gpt-4o-mini"),
            ollama_base_url: get_str("OLLAMA_BASE_URL", &dotenv, "http://localhost:11434"),
            ollama_model: get_str("OLLAMA_MODEL", &dotenv, "llama3.1"),
            prompt_profile: get_str("PROMPT_PROFILE", &dotenv, "zoning_clerk"),
            kb_top_k: get_u32("KB_TOP_K", &dotenv, 12),
            kb_timeout_s: get_u64("KB_TIMEOUT_S", &dotenv, 35),
            agent_timeout_s: get_u64("AGENT_TIMEOUT_S", &dotenv, 120),
            max_tool_calls: get_u32("MAX_TOOL_CALLS", &dotenv, 12),
            web_bind: get_str("WEB_BIND", &dotenv, "0.0.0.0"),
            web_port: get_u16("WEB_PORT", &dotenv, 8100),
            log_format: get_str("LOG_FORMAT", &dotenv, "text").to_lowercase(),
        })
    }

    /// Whether the selected backend has what it needs to call a model.
    pub fn llm_configured(&self) -> bool {
        match self.backend.as_str() {
            "ollama" => !self.ollama_base_url.is_empty(),
            _ => !self.openai_api_key.is_empty(),
        }
    }

    pub fn active_model(&self) -> &str {
        match self.backend.as_str() {
            "ollama" => &self.ollama_model,
            _ => &self.model,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_dotenv_skips_comments_and_blanks() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "# comment\n\nCLERK_TEST_A=1\n  CLERK_TEST_B = \"two\"  ").unwrap();
        let map = parse_dotenv(tmp.path());
        assert_eq!(map.len(), 2);
        assert_eq!(map["CLERK_TEST_A"], "1");
        assert_eq!(map["CLERK_TEST_B"], "two");
    }

    #[test]
    fn parse_dotenv_missing_file_is_empty() {
        assert!(parse_dotenv(Path::new("/nonexistent/.env")).is_empty());
    }

    #[test]
    fn numeric_getters_fall_back_on_garbage() {
        let mut dotenv = HashMap::new();
        dotenv.insert("CLERK_TEST_NUM".to_string(), "not-a-number".to_string());
        assert_eq!(get_u32("CLERK_TEST_NUM", &dotenv, 7), 7);
        dotenv.insert("CLERK_TEST_NUM".to_string(), "42".to_string());
        assert_eq!(get_u64("CLERK_TEST_NUM", &dotenv, 7), 42);
    }

    #[test]
    fn defaults_from_empty_dotenv() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let config = Config::from_env_with_dotenv(tmp.path()).unwrap();
        if std::env::var("KB_TOP_K").is_err() {
            assert_eq!(config.kb_top_k, 12);
        }
        if std::env::var("WEB_PORT").is_err() {
            assert_eq!(config.web_port, 8100);
        }
    }
}

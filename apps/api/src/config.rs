use anyhow::{Context, Result};

/// Which text-generation provider to use. Selected once at startup via
/// `LLM_PROVIDER` — never at call time, so a process talks to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Gemini,
}

impl ProviderKind {
    fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" => Ok(ProviderKind::Anthropic),
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" => Ok(ProviderKind::Gemini),
            other => anyhow::bail!(
                "LLM_PROVIDER must be one of anthropic|openai|gemini, got '{other}'"
            ),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// Credentials are optional on purpose: a missing LLM key or RapidAPI key
/// degrades to deterministic fallback / skipped enrichment rather than
/// failing startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderKind,
    pub llm_api_key: Option<String>,
    /// Test hook — overrides the provider's hardcoded endpoint when set.
    pub llm_base_url: Option<String>,
    pub rapidapi_key: Option<String>,
    pub rapidapi_base_url: Option<String>,
    pub cache_ttl_secs: u64,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            provider: ProviderKind::parse(
                &std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "anthropic".to_string()),
            )?,
            llm_api_key: optional_env("LLM_API_KEY"),
            llm_base_url: optional_env("LLM_BASE_URL"),
            rapidapi_key: optional_env("RAPIDAPI_KEY"),
            rapidapi_base_url: optional_env("RAPIDAPI_BASE_URL"),
            cache_ttl_secs: parse_env("CACHE_TTL_SECS", 3600)?,
            rate_limit_max_requests: parse_env("RATE_LIMIT_MAX_REQUESTS", 30)?,
            rate_limit_window_secs: parse_env("RATE_LIMIT_WINDOW_SECS", 60)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// Returns `None` for unset or empty variables so `FOO=` behaves like unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

use anyhow::{bail, Context, Result};

use crate::llm_client::{
    DEFAULT_BACKOFF_MS, DEFAULT_BASE_URL, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MODEL,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::screening::batch::DEFAULT_WORKERS;

/// Which `Store` implementation backs the service.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    Supabase { url: String, key: String },
    Postgres { database_url: String },
    Memory,
}

impl StoreConfig {
    pub fn label(&self) -> &'static str {
        match self {
            StoreConfig::Supabase { .. } => "supabase",
            StoreConfig::Postgres { .. } => "postgres",
            StoreConfig::Memory => "memory",
        }
    }
}

/// Application configuration loaded from environment variables.
/// Start-up fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Checked by `LlmClient::new`, not here.
    pub deepseek_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_connect_timeout_secs: u64,
    pub llm_request_timeout_secs: u64,
    /// Delay before the first retry of a timed-out call; doubles per retry.
    pub llm_retry_backoff_ms: u64,
    pub store: StoreConfig,
    pub batch_workers: usize,
    pub max_upload_mb: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let batch_workers = parse_or("BATCH_WORKERS", DEFAULT_WORKERS)?;
        if batch_workers == 0 {
            bail!("BATCH_WORKERS must be at least 1");
        }

        Ok(Config {
            deepseek_api_key: optional_env("DEEPSEEK_API_KEY"),
            llm_base_url: optional_env("LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            llm_model: optional_env("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            llm_connect_timeout_secs: parse_or(
                "LLM_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?,
            llm_request_timeout_secs: parse_or(
                "LLM_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
            llm_retry_backoff_ms: parse_or("LLM_RETRY_BACKOFF_MS", DEFAULT_BACKOFF_MS)?,
            store: store_from_env()?,
            batch_workers,
            max_upload_mb: parse_or("MAX_UPLOAD_MB", 25)?,
            port: parse_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

fn store_from_env() -> Result<StoreConfig> {
    let backend = optional_env("STORE_BACKEND").unwrap_or_else(|| "supabase".to_string());
    match backend.to_lowercase().as_str() {
        "supabase" => Ok(StoreConfig::Supabase {
            url: require_env("SUPABASE_URL")?,
            key: require_env("SUPABASE_KEY")?,
        }),
        "postgres" => Ok(StoreConfig::Postgres {
            database_url: require_env("DATABASE_URL")?,
        }),
        "memory" => Ok(StoreConfig::Memory),
        other => bail!("STORE_BACKEND must be 'supabase', 'postgres' or 'memory', got '{other}'"),
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

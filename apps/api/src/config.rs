use std::time::Duration;

use anyhow::{Context, Result};

use crate::pipeline::fields::RetryPolicy;
use crate::pipeline::BatchSettings;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub google_api_key: String,
    pub gemini_model: String,
    pub port: u16,
    pub rust_log: String,
    pub batch_size: usize,
    pub batch_pause_secs: u64,
    pub llm_max_retries: u32,
    pub llm_base_wait_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            google_api_key: require_env("GOOGLE_API_KEY")?,
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| crate::llm_client::DEFAULT_MODEL.to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            batch_size: parse_env("BATCH_SIZE", 15)?,
            batch_pause_secs: parse_env("BATCH_PAUSE_SECS", 60)?,
            llm_max_retries: parse_env("LLM_MAX_RETRIES", 5)?,
            llm_base_wait_secs: parse_env("LLM_BASE_WAIT_SECS", 30)?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.llm_max_retries,
            base_wait: Duration::from_secs(self.llm_base_wait_secs),
        }
    }

    pub fn batch_settings(&self, store_cv: bool) -> BatchSettings {
        BatchSettings {
            batch_size: self.batch_size,
            pause: Duration::from_secs(self.batch_pause_secs),
            store_cv,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("'{key}' must be a valid number")),
        Err(_) => Ok(default),
    }
}

use std::time::Duration;

use anyhow::{Context, Result};

use crate::stream::frame::DEFAULT_MAX_FRAME_BYTES;
use crate::stream::session::DEFAULT_SOURCE_TIMEOUT;
use crate::stream::SessionOptions;

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Front-end configuration loaded from environment variables (and `.env`).
/// Every variable has a default; malformed values are startup errors.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    /// `None` when `JOBSCOUT_SOURCE_TIMEOUT_SECS=0`.
    pub source_timeout: Option<Duration>,
    pub request_timeout: Duration,
    pub max_frame_bytes: usize,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let source_timeout_secs = parse_or(
            &lookup,
            "JOBSCOUT_SOURCE_TIMEOUT_SECS",
            DEFAULT_SOURCE_TIMEOUT.as_secs(),
        )?;
        let request_timeout_secs = parse_or(
            &lookup,
            "JOBSCOUT_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        let max_frame_bytes = parse_or(&lookup, "JOBSCOUT_MAX_FRAME_BYTES", DEFAULT_MAX_FRAME_BYTES)?;
        if max_frame_bytes == 0 {
            anyhow::bail!("JOBSCOUT_MAX_FRAME_BYTES must be greater than zero");
        }

        Ok(Config {
            api_url: lookup("JOBSCOUT_API_URL")
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            source_timeout: (source_timeout_secs > 0)
                .then(|| Duration::from_secs(source_timeout_secs)),
            request_timeout: Duration::from_secs(request_timeout_secs),
            max_frame_bytes,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            source_timeout: self.source_timeout,
            max_frame_bytes: self.max_frame_bytes,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a non-negative integer, got '{raw}'")),
        None => Ok(default),
    }
}

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Every variable is optional; malformed numbers fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Directory holding one `<collection>.json` file per resource type.
    pub data_dir: PathBuf,
    /// Built UI bundle. Served with an `index.html` fallback when set.
    pub static_dir: Option<PathBuf>,
    pub rate_limit_window: Duration,
    pub rate_limit_max_requests: u32,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: parse_env("PORT", 3001)?,
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            static_dir: std::env::var("STATIC_DIR").ok().map(PathBuf::from),
            rate_limit_window: Duration::from_secs(parse_env("RATE_LIMIT_WINDOW_SECS", 900)?),
            rate_limit_max_requests: parse_env("RATE_LIMIT_MAX_REQUESTS", 100)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

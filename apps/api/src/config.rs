use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Everything has a default; only malformed numeric values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Directory rendered artifacts are written to and served from.
    pub output_dir: PathBuf,
    /// Absent key means text is always formatted locally.
    pub anthropic_api_key: Option<String>,
    pub chrome_bin: PathBuf,
    pub render_pool_size: usize,
    pub render_timeout_secs: u64,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("outputs")),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            chrome_bin: std::env::var("CHROME_BIN")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("chromium")),
            render_pool_size: parse_env("RENDER_POOL_SIZE", 2)?,
            render_timeout_secs: parse_env("RENDER_TIMEOUT_SECS", 60)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
        })
    }
}

/// Reads an env var, treating unset and blank values alike.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let value: u16 = parse_env("INKNOTES_TEST_UNSET_PORT", 8080).unwrap();
        assert_eq!(value, 8080);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("INKNOTES_TEST_BAD_POOL", "lots");
        let result: Result<usize> = parse_env("INKNOTES_TEST_BAD_POOL", 2);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("INKNOTES_TEST_BAD_POOL"), "got: {err}");
    }

    #[test]
    fn test_optional_env_ignores_blank() {
        std::env::set_var("INKNOTES_TEST_BLANK_KEY", "   ");
        assert_eq!(optional_env("INKNOTES_TEST_BLANK_KEY"), None);
    }
}

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Where thread checkpoints live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointBackend {
    Memory,
    Redis { url: String, ttl_secs: Option<u64> },
    Postgres { database_url: String },
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub checkpoint_backend: CheckpointBackend,
    pub node_timeout: Duration,
    pub max_steps_per_run: usize,
    pub parse_retries: u32,
    pub upload_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            get(key).with_context(|| format!("Required environment variable '{key}' is not set"))
        };

        let checkpoint_backend = match get("CHECKPOINT_BACKEND")
            .unwrap_or_else(|| "memory".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => CheckpointBackend::Memory,
            "redis" => CheckpointBackend::Redis {
                url: require("REDIS_URL")?,
                ttl_secs: parse_opt(&get, "CHECKPOINT_TTL_SECS")?,
            },
            "postgres" => CheckpointBackend::Postgres {
                database_url: require("DATABASE_URL")?,
            },
            other => bail!("CHECKPOINT_BACKEND must be memory, redis or postgres, got '{other}'"),
        };

        Ok(Config {
            anthropic_api_key: require("ANTHROPIC_API_KEY")?,
            port: parse_or(&get, "PORT", 8080)?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            checkpoint_backend,
            node_timeout: Duration::from_secs(parse_or(&get, "NODE_TIMEOUT_SECS", 180)?),
            max_steps_per_run: parse_or(&get, "MAX_STEPS_PER_RUN", 64)?,
            parse_retries: parse_or(&get, "PARSE_RETRIES", 2)?,
            upload_dir: get("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
        })
    }
}

fn parse_opt<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key} has an invalid value: '{raw}'"))
        })
        .transpose()
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_opt(get, key)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("ANTHROPIC_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.rust_log, "info");
        assert_eq!(config.checkpoint_backend, CheckpointBackend::Memory);
        assert_eq!(config.node_timeout, Duration::from_secs(180));
        assert_eq!(config.max_steps_per_run, 64);
        assert_eq!(config.parse_retries, 2);
        assert_eq!(config.upload_dir, PathBuf::from("./data"));
    }

    #[test]
    fn test_missing_api_key_fails() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_redis_backend_requires_url() {
        assert!(load(&[("ANTHROPIC_API_KEY", "k"), ("CHECKPOINT_BACKEND", "redis")]).is_err());

        let config = load(&[
            ("ANTHROPIC_API_KEY", "k"),
            ("CHECKPOINT_BACKEND", "Redis"),
            ("REDIS_URL", "redis://localhost"),
            ("CHECKPOINT_TTL_SECS", "3600"),
        ])
        .unwrap();
        assert_eq!(
            config.checkpoint_backend,
            CheckpointBackend::Redis {
                url: "redis://localhost".to_string(),
                ttl_secs: Some(3600)
            }
        );
    }

    #[test]
    fn test_postgres_backend() {
        let config = load(&[
            ("ANTHROPIC_API_KEY", "k"),
            ("CHECKPOINT_BACKEND", "postgres"),
            ("DATABASE_URL", "postgres://localhost/resume"),
        ])
        .unwrap();
        assert!(matches!(config.checkpoint_backend, CheckpointBackend::Postgres { .. }));
    }

    #[test]
    fn test_malformed_values_fail() {
        assert!(load(&[("ANTHROPIC_API_KEY", "k"), ("PORT", "eighty")]).is_err());
        assert!(load(&[("ANTHROPIC_API_KEY", "k"), ("CHECKPOINT_BACKEND", "sqlite")]).is_err());
        assert!(load(&[("ANTHROPIC_API_KEY", "k"), ("PARSE_RETRIES", "-1")]).is_err());
    }
}

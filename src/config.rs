//! Configuration loading and validation.
//!
//! Configuration comes from a TOML file with the `TMDB_API_KEY` environment
//! variable overriding the stored credential, so deployments can keep the
//! secret out of the file entirely.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub tmdb: TmdbConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "./showstash.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    /// TMDB credential: either a v3 API key or a v4 read access token.
    /// Empty means unset; commands that talk to TMDB refuse to start.
    pub credential: String,

    /// Language tag passed to every TMDB request.
    pub language: String,

    /// Base URL for the TMDB API. Overridable for testing.
    pub base_url: String,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            credential: String::new(),
            language: "en-US".to_string(),
            base_url: "https://api.themoviedb.org/3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// How long to sleep between polls when the queue is empty.
    pub poll_interval_ms: u64,

    /// Total attempts for each TMDB request before it counts as failed.
    pub fetch_retries: u32,

    /// Base delay between request attempts; scales linearly with the attempt
    /// number.
    pub retry_delay_ms: u64,

    /// Running jobs locked longer than this are returned to pending at
    /// worker startup.
    pub stale_lease_minutes: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 750,
            fetch_retries: 3,
            retry_delay_ms: 250,
            stale_lease_minutes: 15,
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    apply_credential_override(&mut config, std::env::var("TMDB_API_KEY").ok());

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./showstash.toml",
        "~/.config/showstash/config.toml",
        "/etc/showstash/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    let mut config = Config::default();
    apply_credential_override(&mut config, std::env::var("TMDB_API_KEY").ok());
    validate_config(&config)?;
    Ok(config)
}

fn apply_credential_override(config: &mut Config, env_credential: Option<String>) {
    if let Some(credential) = env_credential {
        if !credential.is_empty() {
            config.tmdb.credential = credential;
        }
    }
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.database.path.is_empty() {
        anyhow::bail!("Database path cannot be empty");
    }

    if config.worker.poll_interval_ms == 0 {
        anyhow::bail!("Worker poll interval cannot be 0");
    }

    if config.worker.fetch_retries == 0 {
        anyhow::bail!("Worker fetch retries cannot be 0");
    }

    if config.worker.stale_lease_minutes <= 0 {
        anyhow::bail!("Worker stale lease must be positive");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, "./showstash.db");
        assert_eq!(config.tmdb.language, "en-US");
        assert_eq!(config.worker.poll_interval_ms, 750);
        assert_eq!(config.worker.fetch_retries, 3);
        assert_eq!(config.worker.retry_delay_ms, 250);
        assert_eq!(config.worker.stale_lease_minutes, 15);
        assert!(config.tmdb.credential.is_empty());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [tmdb]
            credential = "abc123"

            [worker]
            poll_interval_ms = 100
            "#,
        )
        .unwrap();

        assert_eq!(config.tmdb.credential, "abc123");
        assert_eq!(config.worker.poll_interval_ms, 100);
        // Unspecified sections keep their defaults.
        assert_eq!(config.tmdb.language, "en-US");
        assert_eq!(config.worker.fetch_retries, 3);
    }

    #[test]
    fn test_env_override_replaces_credential() {
        let mut config = Config::default();
        config.tmdb.credential = "from-file".to_string();

        apply_credential_override(&mut config, Some("from-env".to_string()));
        assert_eq!(config.tmdb.credential, "from-env");
    }

    #[test]
    fn test_env_override_ignores_empty() {
        let mut config = Config::default();
        config.tmdb.credential = "from-file".to_string();

        apply_credential_override(&mut config, Some(String::new()));
        assert_eq!(config.tmdb.credential, "from-file");

        apply_credential_override(&mut config, None);
        assert_eq!(config.tmdb.credential, "from-file");
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let mut config = Config::default();
        config.worker.poll_interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [database]
            path = "/tmp/test.db"
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.database.path, "/tmp/test.db");
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config(Path::new("/nonexistent/config.toml")).is_err());
    }
}

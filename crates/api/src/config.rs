//! Layered application configuration
//!
//! Built-in defaults, then `config/default.toml`, then
//! `config/{TRIAGE_ENV}.toml`, then `TRIAGE__SECTION__KEY` environment
//! variables. Later layers win.

use config::{Config, Environment, File};
use failover::FailoverConfig;
use model_adapter::ProviderConfig;
use response_validator::NormalizerConfig;
use serde::{Deserialize, Serialize};
use storage::StorageConfig;

use crate::rate_limit::RateLimitConfig;

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub rate_limit: RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Log output settings; `RUST_LOG` overrides `level` when set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub failover: FailoverConfig,
    pub primary: ProviderConfig,
    pub secondary: ProviderConfig,
    pub normalizer: NormalizerConfig,
    pub storage: StorageConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            failover: FailoverConfig::default(),
            primary: ProviderConfig::gemini(),
            secondary: ProviderConfig::huggingface(),
            normalizer: NormalizerConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `config/` using `TRIAGE_ENV` (default "development")
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("TRIAGE_ENV").unwrap_or_else(|_| "development".to_string());
        Self::load_from("config", &env)
    }

    /// Load from an explicit directory and environment name
    pub fn load_from(dir: &str, env: &str) -> Result<Self, config::ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name(&format!("{}/default", dir)).required(false))
            .add_source(File::with_name(&format!("{}/{}", dir, env)).required(false))
            .add_source(
                Environment::with_prefix("TRIAGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_files() {
        let config = AppConfig::load_from("does-not-exist", "test").unwrap();
        assert_eq!(config.failover.failure_threshold, 3);
        assert_eq!(config.failover.cooldown_secs, 30);
        assert_eq!(config.failover.call_timeout_ms, 8_000);
        assert_eq!(config.primary.model, "gemini-2.0-flash");
        assert_eq!(config.primary.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.secondary.model, "meta-llama/Llama-3.1-8B-Instruct");
        assert_eq!(config.secondary.api_key_env, "HF_TOKEN");
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config: AppConfig = Config::builder()
            .add_source(Config::try_from(&AppConfig::default()).unwrap())
            .add_source(config::File::from_str(
                "[failover]\ncall_timeout_ms = 2000\n[secondary]\nenabled = false\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.failover.call_timeout_ms, 2_000);
        assert_eq!(config.failover.failure_threshold, 3);
        assert!(!config.secondary.enabled);
        assert_eq!(config.secondary.api_key_env, "HF_TOKEN");
    }
}

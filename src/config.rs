use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::attempts::DEFAULT_MAX_PIN_ATTEMPTS;
use crate::orchestrator::EngineSettings;
use crate::session::{SessionSettings, DEFAULT_CACHE_CAPACITY, DEFAULT_TTL_SECONDS};

/// Main configuration structure for the USSD engine
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UssdEngineConfig {
    /// Session storage and leasing
    pub session: SessionConfig,
    /// Turn processing settings
    pub engine: EngineConfig,
    /// Durable JSONL journal
    pub journal: JournalConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Database settings (optional, used with the `database` feature)
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Seconds a session survives without a turn
    pub ttl_seconds: u64,
    /// Maximum cached sessions
    pub cache_capacity: u64,
    /// Serialize turns per session id
    pub lease_enabled: bool,
    /// How long a turn waits for the session lease
    pub lease_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Bound on waiting for invoked steps in one turn
    pub settle_timeout_ms: u64,
    /// Invoked steps allowed to chain in one turn
    pub max_settle_hops: usize,
    /// PIN failures before an account is blocked
    pub max_pin_attempts: u8,
    /// Language for callers without an account
    pub default_language: String,
    /// Catalogue consulted when a template is missing
    pub fallback_language: String,
    /// Country calling code used to normalize local numbers
    pub country_code: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JournalConfig {
    /// Path of the append-only session journal
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON log lines instead of compact text
    pub json_logs: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for UssdEngineConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig {
                ttl_seconds: DEFAULT_TTL_SECONDS,
                cache_capacity: DEFAULT_CACHE_CAPACITY,
                lease_enabled: true,
                lease_timeout_ms: 2_000,
            },
            engine: EngineConfig {
                settle_timeout_ms: 5_000,
                max_settle_hops: 8,
                max_pin_attempts: DEFAULT_MAX_PIN_ATTEMPTS,
                default_language: "eng".to_string(),
                fallback_language: "eng".to_string(),
                country_code: "254".to_string(),
            },
            journal: JournalConfig {
                path: ".ussd-engine/sessions.jsonl".to_string(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
            database: None,
        }
    }
}

impl UssdEngineConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (ussd-engine.toml, .ussd-engine-rc)
    /// 3. Environment variables (prefixed with USSD_ENGINE, `__` between sections)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if Path::new("ussd-engine.toml").exists() {
            builder = builder.add_source(File::with_name("ussd-engine"));
        }

        if Path::new(".ussd-engine-rc").exists() {
            builder = builder.add_source(File::new(".ussd-engine-rc", config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("USSD_ENGINE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            ttl_seconds: self.session.ttl_seconds,
            cache_capacity: self.session.cache_capacity,
            lease_enabled: self.session.lease_enabled,
            lease_timeout: Duration::from_millis(self.session.lease_timeout_ms),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            settle_timeout: Duration::from_millis(self.engine.settle_timeout_ms),
            max_settle_hops: self.engine.max_settle_hops,
            max_pin_attempts: self.engine.max_pin_attempts,
            default_language: self.engine.default_language.clone(),
            fallback_language: self.engine.fallback_language.clone(),
            country_code: self.engine.country_code.clone(),
        }
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<UssdEngineConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = UssdEngineConfig::load_env_file();
        UssdEngineConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static UssdEngineConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = UssdEngineConfig::default();
        assert_eq!(config.session.ttl_seconds, 180);
        assert_eq!(config.engine.max_pin_attempts, 3);
        assert_eq!(config.session_settings().lease_timeout, Duration::from_millis(2_000));
        assert_eq!(config.engine_settings().settle_timeout, Duration::from_secs(5));
    }

    #[test]
    fn saved_configuration_is_valid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ussd-engine.toml");
        let config = UssdEngineConfig::default();

        config.save_to_file(&path).unwrap();
        let loaded: UssdEngineConfig = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(loaded, config);
    }
}

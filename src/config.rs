use crate::dedup::{HashMode, HashStrategy, DEFAULT_KEY_THRESHOLD, DEFAULT_VAL_THRESHOLD};
use crate::observability::{LogConfig, LogFormat};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub redis: RedisSettings,
    #[serde(default)]
    pub dedup: DedupSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            default_ttl_secs: default_ttl_secs(),
        }
    }
}

impl RedisSettings {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DedupSettings {
    #[serde(default)]
    pub key_hash_mode: HashMode,
    #[serde(default)]
    pub value_hash_mode: HashMode,
    #[serde(default = "default_key_threshold")]
    pub key_threshold: usize,
    #[serde(default = "default_val_threshold")]
    pub val_threshold: usize,
    /// Overrides the type-derived key prefix when set.
    #[serde(default)]
    pub prefix: Option<String>,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            key_hash_mode: HashMode::AutoSmart,
            value_hash_mode: HashMode::AutoSmart,
            key_threshold: DEFAULT_KEY_THRESHOLD,
            val_threshold: DEFAULT_VAL_THRESHOLD,
            prefix: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_key_threshold() -> usize {
    DEFAULT_KEY_THRESHOLD
}

fn default_val_threshold() -> usize {
    DEFAULT_VAL_THRESHOLD
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Settings {
    /// Loads `config/default`, `config/local` and `DEDUP__*` environment variables,
    /// in increasing order of precedence. `.env` is read first if present.
    pub fn new() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("DEDUP").separator("__"));

        builder.build()?.try_deserialize()
    }

    pub fn hash_strategy(&self) -> HashStrategy {
        HashStrategy::new(self.dedup.key_hash_mode, self.dedup.value_hash_mode)
            .with_key_threshold(self.dedup.key_threshold)
            .with_val_threshold(self.dedup.val_threshold)
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig::new(&self.logging.level, LogFormat::from(self.logging.format.as_str()))
    }
}

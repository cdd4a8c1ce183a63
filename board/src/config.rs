// Configuration management with layered configuration (file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub redis: RedisConfig,
    pub board: BoardConfig,
    pub scheduler: SchedulerConfig,
    pub consumer: ConsumerConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Board name; also the root of the keyspace.
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the driver calls tick, in seconds.
    pub tick_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Runner queue the worker listens on.
    pub queue: String,
    /// Payload codec name ("plain" or "json").
    pub format: String,
    /// Bounded wait per pop cycle, in seconds.
    pub pop_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub metrics_port: u16,
}

impl Settings {
    /// Load configuration with layered precedence: defaults file → local
    /// overrides → `APP__`-prefixed environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific directory.
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.redis.url.is_empty() {
            return Err("Redis URL cannot be empty".to_string());
        }
        if self.board.name.is_empty() {
            return Err("Board name cannot be empty".to_string());
        }
        if self.scheduler.tick_interval_seconds == 0 {
            return Err("Scheduler tick_interval_seconds must be greater than 0".to_string());
        }
        if self.consumer.queue.is_empty() {
            return Err("Consumer queue cannot be empty".to_string());
        }
        if self.consumer.pop_timeout_seconds == 0 {
            return Err("Consumer pop_timeout_seconds must be greater than 0".to_string());
        }
        if !matches!(self.consumer.format.as_str(), "plain" | "json") {
            return Err(format!(
                "Consumer format must be 'plain' or 'json', got '{}'",
                self.consumer.format
            ));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                pool_size: 10,
            },
            board: BoardConfig {
                name: "jobs".to_string(),
            },
            scheduler: SchedulerConfig {
                tick_interval_seconds: 1,
            },
            consumer: ConsumerConfig {
                queue: "default".to_string(),
                format: "plain".to_string(),
                pop_timeout_seconds: 1,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                metrics_port: 9090,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_catches_empty_redis_url() {
        let mut settings = Settings::default();
        settings.redis.url = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_zero_tick_interval() {
        let mut settings = Settings::default();
        settings.scheduler.tick_interval_seconds = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_unknown_format() {
        let mut settings = Settings::default();
        settings.consumer.format = "yaml".to_string();
        assert!(settings.validate().is_err());
    }
}

//! Config Module - Configuration management

use serde::{Serialize, Deserialize};

/// Main configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub presence: PresenceConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Participants idle longer than this are evicted.
    pub timeout_seconds: u64,
    /// How often the eviction sweep runs. Deliberately longer than the
    /// timeout, matching the original backend.
    pub sweep_interval_seconds: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Max tracing level; one of `error`, `warn`, `info`, `debug`, `trace`.
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            presence: PresenceConfig {
                timeout_seconds: 10,
                sweep_interval_seconds: 15,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Config {
    /// Load from a TOML or JSON file, picked by extension.
    pub async fn load(path: &str) -> Result<Config, String> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config: {}", e))?;

        if path.ends_with(".toml") {
            toml::from_str(&content).map_err(|e| format!("Invalid TOML: {}", e))
        } else if path.ends_with(".json") {
            serde_json::from_str(&content).map_err(|e| format!("Invalid JSON: {}", e))
        } else {
            Err("Unsupported config format".to_string())
        }
    }

    /// Validate config
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push("Invalid server port".to_string());
        }
        if self.presence.timeout_seconds == 0 {
            errors.push("presence timeout must be > 0".to_string());
        }
        if self.presence.sweep_interval_seconds == 0 {
            errors.push("sweep interval must be > 0".to_string());
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            errors.push(format!("unknown log level '{}'", self.logging.level));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Export config as TOML
    pub fn export_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_keep_timeout_below_sweep_interval() {
        let config = Config::default();
        assert_eq!(config.presence.timeout_seconds, 10);
        assert_eq!(config.presence.sweep_interval_seconds, 15);
        assert!(config.presence.timeout_seconds < config.presence.sweep_interval_seconds);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_collects_errors() {
        let mut config = Config::default();
        config.server.port = 0;
        config.presence.timeout_seconds = 0;
        config.logging.level = "loud".to_string();
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_default_log_level_parses() {
        let config = Config::default();
        let level: tracing::Level = config.logging.level.parse().unwrap();
        assert_eq!(level, tracing::Level::INFO);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let toml_str = config.export_toml().unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.presence.sweep_interval_seconds, 15);
    }
}

use std::net::SocketAddr;
use std::path::Path;

use crate::config::schema::{Config, RateProvider, StoreBackend};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();

    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

/// Semantic checks the schema cannot express. Also run by the server after
/// environment overrides are applied.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.server.bind.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::Validation {
            message: format!("server.bind is not a socket address: {}", config.server.bind),
        });
    }

    if config.store.backend == StoreBackend::Redis
        && config
            .store
            .redis_url
            .as_deref()
            .is_none_or(|u| u.trim().is_empty())
    {
        return Err(ConfigError::Validation {
            message: "store.backend is 'redis' but store.redis_url is not set".to_string(),
        });
    }

    if !(0.0..=1.0).contains(&config.pipeline.review_threshold) {
        return Err(ConfigError::Validation {
            message: format!(
                "pipeline.review_threshold must be within [0, 1], got {}",
                config.pipeline.review_threshold
            ),
        });
    }

    if config.extraction.max_concurrent_sources == 0 {
        return Err(ConfigError::Validation {
            message: "extraction.max_concurrent_sources must be at least 1".to_string(),
        });
    }

    if config.rates.provider == RateProvider::Static {
        for (code, rate) in &config.rates.static_rates {
            if !rate.is_finite() || *rate <= 0.0 {
                return Err(ConfigError::Validation {
                    message: format!("rates.static_rates.{} must be positive, got {}", code, rate),
                });
            }
        }
    }

    if let Some(url) = &config.delivery.webhook_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation {
                message: format!("delivery.webhook_url must be an http(s) URL: {}", url),
            });
        }
    }

    Ok(())
}

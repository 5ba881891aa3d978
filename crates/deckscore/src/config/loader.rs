use std::path::Path;

use crate::config::schema::{Config, DocumentFormat};
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

/// Loads the config at `path`, or returns defaults when the file does not exist.
///
/// Any other failure (unreadable file, invalid JSON, schema errors) is still reported.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        log::info!(
            "No config file at {}, using built-in defaults",
            path.display()
        );
        return Ok(Config::default());
    }
    load_config(path)
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

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    for content_type in &config.allowed_content_types {
        if DocumentFormat::from_content_type(content_type).is_none() {
            return Err(ConfigError::Validation {
                message: format!(
                    "allowed_content_types contains '{}', which no document reader handles",
                    content_type
                ),
            });
        }
    }

    let base_url = config.ai.base_url.trim_end_matches('/');
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::Validation {
            message: format!("ai.base_url must be an http(s) URL, got '{}'", base_url),
        });
    }

    if config.server.max_upload_bytes < config.max_file_size_bytes as usize {
        return Err(ConfigError::Validation {
            message: format!(
                "server.max_upload_bytes ({}) is smaller than max_file_size_bytes ({})",
                config.server.max_upload_bytes, config.max_file_size_bytes
            ),
        });
    }

    Ok(())
}

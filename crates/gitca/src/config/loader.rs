use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::engine::store;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// Environment variable that overrides `model.path`.
pub const MODEL_PATH_ENV: &str = "GITCA_MODEL";

/// Returns the per-user config location (`<config dir>/git-ca/config.json`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("git-ca").join("config.json"))
}

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

/// Applies environment overrides on top of a loaded or default config.
pub fn apply_env_overrides(config: &mut Config) {
    if let Ok(path) = std::env::var(MODEL_PATH_ENV) {
        if !path.trim().is_empty() {
            log::debug!("Model path overridden by {}", MODEL_PATH_ENV);
            config.model.path = Some(path);
        }
    }
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

/// Semantic checks the JSON schema cannot express.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.model.path.is_none() && store::lookup(&config.model.id).is_none() {
        return Err(ConfigError::Validation {
            message: format!(
                "Unknown model id '{}' and no model path given",
                config.model.id
            ),
        });
    }

    let generation = &config.generation;
    if generation.max_output_chars >= config.model.context_size as usize {
        return Err(ConfigError::Validation {
            message: format!(
                "max_output_chars ({}) must be smaller than the context size ({})",
                generation.max_output_chars, config.model.context_size
            ),
        });
    }

    if generation.concurrency == 0 || generation.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "concurrency and timeout_secs must be positive".to_string(),
        });
    }

    Ok(())
}

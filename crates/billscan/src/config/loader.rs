use std::path::Path;

use crate::config::schema::{Config, ParserBackend, CONFIG_VERSION};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

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

/// Checks the constraints the schema cannot express.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(invalid(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }

    let ocr = &config.ocr;
    if !(0.0..=1.0).contains(&ocr.confidence_threshold) {
        return Err(invalid(format!(
            "ocr.confidence_threshold must be within 0..=1, got {}",
            ocr.confidence_threshold
        )));
    }
    if !ocr.line_band.is_finite() || ocr.line_band <= 0.0 {
        return Err(invalid(format!(
            "ocr.line_band must be a positive number, got {}",
            ocr.line_band
        )));
    }
    if ocr.max_image_side == 0 {
        return Err(invalid("ocr.max_image_side must be positive".to_string()));
    }

    if config
        .storage
        .key_prefix
        .split('/')
        .any(|segment| segment == "." || segment == "..")
    {
        return Err(invalid(format!(
            "storage.key_prefix must not contain relative segments: {}",
            config.storage.key_prefix
        )));
    }

    let currency = &config.records.currency;
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(invalid(format!(
            "records.currency must be a three-letter code, got '{}'",
            currency
        )));
    }

    let parser = &config.parser;
    if parser.backend == ParserBackend::Llm {
        if !(parser.base_url.starts_with("http://") || parser.base_url.starts_with("https://")) {
            return Err(invalid(format!(
                "parser.base_url must be an http(s) URL, got '{}'",
                parser.base_url
            )));
        }
        if parser.model.trim().is_empty() {
            return Err(invalid("parser.model must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&parser.temperature) {
            return Err(invalid(format!(
                "parser.temperature must be within 0..=2, got {}",
                parser.temperature
            )));
        }
        if parser.request_timeout_secs == 0 {
            return Err(invalid(
                "parser.request_timeout_secs must be positive".to_string(),
            ));
        }
    }

    Ok(())
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Validation { message }
}

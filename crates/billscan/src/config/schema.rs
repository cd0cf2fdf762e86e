use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::secrets::{expand_home, SecretSource};

pub const CONFIG_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub records: RecordsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            storage: StorageConfig::default(),
            database: DatabaseConfig::default(),
            ocr: OcrConfig::default(),
            parser: ParserConfig::default(),
            records: RecordsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Where uploaded images are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_storage_root() -> String {
    "~/.billscan/objects".to_string()
}

fn default_key_prefix() -> String {
    "bill_images".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl StorageConfig {
    pub fn root_path(&self) -> PathBuf {
        expand_home(&self.root)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Falls back to `~/.billscan/data/billscan.db` when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> Option<PathBuf> {
        match self.path.as_deref() {
            Some(path) if !path.is_empty() => Some(expand_home(path)),
            _ => crate::db::default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_max_image_side")]
    pub max_image_side: u32,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default = "default_line_band")]
    pub line_band: f32,
    /// Extracted text shorter than this (trimmed, in characters) fails the job.
    #[serde(default = "default_min_text_length")]
    pub min_text_length: usize,
}

fn default_languages() -> Vec<String> {
    vec!["chi_sim".to_string(), "eng".to_string()]
}

fn default_max_image_side() -> u32 {
    1200
}

fn default_confidence_threshold() -> f32 {
    crate::layout::DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_line_band() -> f32 {
    crate::layout::DEFAULT_LINE_BAND
}

fn default_min_text_length() -> usize {
    10
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            max_image_side: default_max_image_side(),
            confidence_threshold: default_confidence_threshold(),
            line_band: default_line_band(),
            min_text_length: default_min_text_length(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserBackend {
    #[default]
    Llm,
    Keyword,
}

/// Structured parser settings. Only the `llm` backend uses the connection fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    #[serde(default)]
    pub backend: ParserBackend,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env_var() -> Option<String> {
    Some("BILLSCAN_API_KEY".to_string())
}

fn default_temperature() -> f32 {
    0.1
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            backend: ParserBackend::default(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ParserConfig {
    pub fn api_key_source(&self) -> SecretSource<'_> {
        SecretSource::new(
            self.api_key.as_deref(),
            self.api_key_file.as_deref(),
            self.api_key_env_var.as_deref(),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsConfig {
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "CNY".to_string()
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

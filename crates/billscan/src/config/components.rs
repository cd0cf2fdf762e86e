//! Builds the pipeline's stage executors from a loaded [`Config`].

use std::sync::Arc;
use std::time::Duration;

use super::schema::{Config, ParserBackend};
use crate::db::Database;
use crate::error::{BillscanError, ConfigError};
use crate::extract::{OcrOptions, TextExtractor};
use crate::parse::{ChatCompletionParser, KeywordParser, LlmOptions, StructuredParser};
use crate::storage::FilesystemStore;

pub fn build_object_store(config: &Config) -> FilesystemStore {
    FilesystemStore::new(config.storage.root_path(), &config.storage.key_prefix)
}

pub fn ocr_options(config: &Config) -> OcrOptions {
    OcrOptions {
        max_image_side: config.ocr.max_image_side,
        confidence_threshold: config.ocr.confidence_threshold,
        line_band: config.ocr.line_band,
    }
}

/// The OCR extractor needs a detection backend compiled in.
#[cfg(feature = "tesseract")]
pub fn build_extractor(config: &Config) -> Result<Arc<dyn TextExtractor>, ConfigError> {
    use crate::extract::{OcrExtractor, TesseractDetector};

    let detector = Arc::new(TesseractDetector::new(&config.ocr.languages));
    Ok(Arc::new(OcrExtractor::new(detector, ocr_options(config))))
}

#[cfg(not(feature = "tesseract"))]
pub fn build_extractor(_config: &Config) -> Result<Arc<dyn TextExtractor>, ConfigError> {
    Err(ConfigError::BackendUnavailable("tesseract".to_string()))
}

pub fn build_parser(config: &Config) -> Result<Arc<dyn StructuredParser>, BillscanError> {
    let parser = &config.parser;
    match parser.backend {
        ParserBackend::Keyword => Ok(Arc::new(KeywordParser::new(config.ocr.min_text_length))),
        ParserBackend::Llm => {
            let api_key = parser.api_key_source().resolve_optional()?;
            if api_key.is_none() {
                tracing::warn!(
                    base_url = %parser.base_url,
                    "No API key configured for the model endpoint"
                );
            }
            let options = LlmOptions {
                base_url: parser.base_url.clone(),
                model: parser.model.clone(),
                api_key,
                temperature: parser.temperature,
                request_timeout: Duration::from_secs(parser.request_timeout_secs),
                min_text_length: config.ocr.min_text_length,
            };
            Ok(Arc::new(ChatCompletionParser::new(options)?))
        }
    }
}

pub fn open_database(config: &Config) -> Result<Database, BillscanError> {
    let path = config
        .database
        .resolved_path()
        .ok_or_else(|| ConfigError::Validation {
            message: "Could not determine a database path; set database.path".to_string(),
        })?;
    Ok(Database::open(&path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_object_store_uses_prefix() {
        let config = load_config_from_str(
            r#"{ "version": "1.0", "storage": { "root": "/tmp/bills", "key_prefix": "/scans/" } }"#,
        )
        .unwrap();
        let store = build_object_store(&config);
        assert_eq!(store.root(), std::path::Path::new("/tmp/bills"));
        assert_eq!(store.key_prefix(), "scans");
    }

    #[test]
    fn test_ocr_options_follow_config() {
        let config = load_config_from_str(
            r#"{ "version": "1.0", "ocr": { "max_image_side": 800, "line_band": 8 } }"#,
        )
        .unwrap();
        let options = ocr_options(&config);
        assert_eq!(options.max_image_side, 800);
        assert_eq!(options.line_band, 8.0);
        assert_eq!(options.confidence_threshold, 0.5);
    }

    #[cfg(feature = "tesseract")]
    #[test]
    fn test_default_build_has_ocr_extractor() {
        assert!(build_extractor(&Config::default()).is_ok());
    }

    #[cfg(not(feature = "tesseract"))]
    #[test]
    fn test_extractor_unavailable_without_backend() {
        let result = build_extractor(&Config::default());
        assert!(matches!(result, Err(ConfigError::BackendUnavailable(_))));
    }

    #[test]
    fn test_keyword_parser_needs_no_key() {
        let config =
            load_config_from_str(r#"{ "version": "1.0", "parser": { "backend": "keyword" } }"#)
                .unwrap();
        assert!(build_parser(&config).is_ok());
    }

    #[test]
    fn test_llm_parser_with_inline_key() {
        let config = load_config_from_str(
            r#"{ "version": "1.0", "parser": { "api_key": "sk-test", "api_key_env_var": null } }"#,
        )
        .unwrap();
        assert!(build_parser(&config).is_ok());
    }

    #[test]
    fn test_llm_parser_reports_unreadable_key_file() {
        let config = load_config_from_str(
            r#"{ "version": "1.0", "parser": { "api_key_file": "/nonexistent/billscan.key" } }"#,
        )
        .unwrap();
        assert!(matches!(
            build_parser(&config),
            Err(BillscanError::Secret(_))
        ));
    }

    #[test]
    fn test_open_database_at_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.path = Some(dir.path().join("bills.db").to_string_lossy().into_owned());
        let db = open_database(&config).unwrap();
        db.ping().unwrap();
    }
}

pub mod components;
pub mod loader;
pub mod schema;

pub use components::{build_extractor, build_object_store, build_parser, open_database};
pub use loader::{load_config, load_config_from_str, validate_config};
pub use schema::{
    Config, DatabaseConfig, LoggingConfig, OcrConfig, ParserBackend, ParserConfig, RecordsConfig,
    StorageConfig, CONFIG_VERSION,
};

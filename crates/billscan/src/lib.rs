pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod layout;
pub mod logging;
pub mod parse;
pub mod pipeline;
pub mod registry;
pub mod sanitize;
pub mod secrets;
pub mod storage;

pub use config::{load_config, Config};
pub use db::{Database, RecordSink, SqliteRecordSink, TransactionRecord};
pub use error::{
    BillscanError, ConfigError, ExtractionError, ParseError, RegistryError, Result, StorageError,
    ValidationError,
};
pub use extract::{OcrExtractor, TextDetector, TextExtractor};
pub use layout::{reconstruct, TextFragment};
pub use parse::{StructuredParser, TransactionFields};
pub use pipeline::{HealthReport, ImageSubmission, Pipeline, PipelineBuilder, StageError, SubmitError};
pub use registry::{FailureKind, Job, JobEvent, JobId, Stage, TaskRegistry};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use storage::{FilesystemStore, ObjectStore};

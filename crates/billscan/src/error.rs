use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillscanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Submission rejected: {0}")]
    Submit(#[from] crate::pipeline::SubmitError),

    #[error("Secret resolution failed: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Backend '{0}' is not available in this build")]
    BackendUnavailable(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write object '{path}': {source}")]
    WriteObject {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read object '{path}': {source}")]
    ReadObject {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Object already exists: {0}")]
    ObjectExists(String),
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    #[error("Text detection failed: {0}")]
    DetectionFailed(String),

    #[error("Insufficient text extracted from image: {length} characters (minimum {minimum})")]
    InsufficientText { length: usize, minimum: usize },

    #[error("Text extraction task aborted: {0}")]
    TaskAborted(String),
}

/// Domain constraints on parsed transaction fields.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Amount must be greater than zero, got {0}")]
    NonPositiveAmount(f64),

    #[error("Amount is not a finite number")]
    NonFiniteAmount,

    #[error("Field '{0}' must not be empty")]
    EmptyField(&'static str),
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Bill text too short to analyze: {length} characters (minimum {minimum})")]
    TextTooShort { length: usize, minimum: usize },

    #[error("Model request failed: {0}")]
    Request(String),

    #[error("Model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Model response contained no JSON object")]
    NoJson,

    #[error("Failed to decode transaction fields: {0}")]
    Decode(String),

    #[error("Could not find {0} in bill text")]
    MissingField(&'static str),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error(transparent)]
    Transition(#[from] crate::registry::TransitionError),
}

pub type Result<T> = std::result::Result<T, BillscanError>;

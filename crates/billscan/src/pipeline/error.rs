use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::{ExtractionError, ParseError, RegistryError, StorageError, ValidationError};
use crate::registry::FailureKind;

/// Why a job stopped before `Completed`.
///
/// Wrapped errors display their own message unchanged so the job's
/// message and error carry exactly what the stage reported.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Upload(#[from] StorageError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Persistence(#[from] DatabaseError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Stage panicked: {0}")]
    Panicked(String),
}

impl StageError {
    pub fn kind(&self) -> FailureKind {
        match self {
            StageError::Upload(_) => FailureKind::Upload,
            StageError::Extraction(_) => FailureKind::Extraction,
            StageError::Validation(_) => FailureKind::Validation,
            StageError::Parse(_) => FailureKind::Parse,
            StageError::Persistence(_) => FailureKind::Persistence,
            StageError::Cancelled => FailureKind::Cancelled,
            StageError::Registry(_) | StageError::Panicked(_) => FailureKind::Internal,
        }
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

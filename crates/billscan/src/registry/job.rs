use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Opaque job identifier, generated at submission and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Processing stage of a job. Declaration order is the pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Queued,
    Uploading,
    Extracting,
    Parsing,
    Persisting,
    Completed,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed)
    }

    /// Position along the happy path. `Failed` ranks after every stage it can follow.
    pub fn rank(self) -> u8 {
        match self {
            Stage::Queued => 0,
            Stage::Uploading => 1,
            Stage::Extracting => 2,
            Stage::Parsing => 3,
            Stage::Persisting => 4,
            Stage::Completed | Stage::Failed => 5,
        }
    }

    /// The next stage on the happy path, `None` for terminal stages.
    pub fn successor(self) -> Option<Stage> {
        match self {
            Stage::Queued => Some(Stage::Uploading),
            Stage::Uploading => Some(Stage::Extracting),
            Stage::Extracting => Some(Stage::Parsing),
            Stage::Parsing => Some(Stage::Persisting),
            Stage::Persisting => Some(Stage::Completed),
            Stage::Completed | Stage::Failed => None,
        }
    }

    pub fn can_transition_to(self, next: Stage) -> bool {
        match next {
            Stage::Failed => matches!(
                self,
                Stage::Uploading | Stage::Extracting | Stage::Parsing | Stage::Persisting
            ),
            _ => self.successor() == Some(next),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Queued => write!(f, "Queued"),
            Stage::Uploading => write!(f, "Uploading"),
            Stage::Extracting => write!(f, "Extracting text"),
            Stage::Parsing => write!(f, "Parsing"),
            Stage::Persisting => write!(f, "Persisting"),
            Stage::Completed => write!(f, "Completed"),
            Stage::Failed => write!(f, "Failed"),
        }
    }
}

/// Which stage produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Upload,
    Extraction,
    Validation,
    Parse,
    Persistence,
    Cancelled,
    Internal,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid stage transition for job {job_id}: {from:?} -> {to:?}")]
pub struct TransitionError {
    pub job_id: String,
    pub from: Stage,
    pub to: Stage,
}

/// Side data accumulated as stages succeed. Kept on failure for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobArtifacts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

/// Status record for one submitted image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub stage: Stage,
    /// Human-readable description of the current activity.
    pub message: String,
    /// Extension the image was submitted with.
    pub file_extension: String,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    started: Instant,
    #[serde(
        rename = "processingTimeSecs",
        serialize_with = "serialize_duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub processing_time: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    pub artifacts: JobArtifacts,
}

fn serialize_duration_secs<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(d) => serializer.serialize_some(&d.as_secs_f64()),
        None => serializer.serialize_none(),
    }
}

impl Job {
    pub fn queued(id: JobId, file_extension: &str) -> Self {
        let now = Utc::now();
        Self {
            id,
            stage: Stage::Queued,
            message: "Job queued for processing".to_string(),
            file_extension: file_extension.to_string(),
            submitted_at: now,
            updated_at: now,
            started: Instant::now(),
            processing_time: None,
            error: None,
            failure_kind: None,
            artifacts: JobArtifacts::default(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Time since the job was queued.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Moves to `next` with a new progress message.
    pub fn advance(&mut self, next: Stage, message: &str) -> Result<(), TransitionError> {
        self.check_transition(next)?;
        self.stage = next;
        self.message = message.to_string();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Moves to `Completed`, recording the record id and elapsed time.
    pub fn complete(&mut self, record_id: &str) -> Result<(), TransitionError> {
        self.check_transition(Stage::Completed)?;
        self.stage = Stage::Completed;
        self.artifacts.record_id = Some(record_id.to_string());
        self.processing_time = Some(self.elapsed());
        self.message = "Processing completed".to_string();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Moves to `Failed`; message and error both carry the stage's error text.
    pub fn fail(&mut self, kind: FailureKind, error: &str) -> Result<(), TransitionError> {
        self.check_transition(Stage::Failed)?;
        self.stage = Stage::Failed;
        self.message = error.to_string();
        self.error = Some(error.to_string());
        self.failure_kind = Some(kind);
        self.processing_time = Some(self.elapsed());
        self.updated_at = Utc::now();
        Ok(())
    }

    fn check_transition(&self, next: Stage) -> Result<(), TransitionError> {
        if self.stage.can_transition_to(next) {
            Ok(())
        } else {
            Err(TransitionError {
                job_id: self.id.to_string(),
                from: self.stage,
                to: next,
            })
        }
    }
}

pub mod config;
pub mod error;
pub mod health;
pub mod runner;
pub mod submission;

pub use config::PipelineConfig;
pub use error::StageError;
pub use health::{ComponentHealth, HealthReport};
pub use runner::{Pipeline, PipelineBuilder};
pub use submission::{ImageSubmission, SubmitError};

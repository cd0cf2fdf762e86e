use crate::config::Config;

/// Orchestrator settings that are not owned by any single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Jobs whose extracted text (trimmed, in characters) is shorter fail at extraction.
    pub min_text_length: usize,
    /// Buffer size of the job event channel.
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_text_length: 10,
            event_capacity: 100,
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_text_length: config.ocr.min_text_length,
            ..Self::default()
        }
    }
}

use serde::Serialize;

use crate::registry::JobCounts;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub name: &'static str,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ComponentHealth {
    pub fn from_check(name: &'static str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self {
                name,
                healthy: true,
                detail: None,
            },
            Err(detail) => Self {
                name,
                healthy: false,
                detail: Some(detail),
            },
        }
    }
}

/// Aggregated result of every stage executor's health check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub healthy: bool,
    pub components: Vec<ComponentHealth>,
    pub jobs: JobCounts,
}

impl HealthReport {
    pub fn new(components: Vec<ComponentHealth>, jobs: JobCounts) -> Self {
        Self {
            healthy: components.iter().all(|c| c.healthy),
            components,
            jobs,
        }
    }

    pub fn component(&self, name: &str) -> Option<&ComponentHealth> {
        self.components.iter().find(|c| c.name == name)
    }
}

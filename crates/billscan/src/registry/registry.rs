//! In-memory job registry.
//!
//! Each job lives behind its own lock so that a status update is applied
//! atomically: readers see either the state before or after the update,
//! never a mix of fields from both.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use super::events::{JobEvent, JobEventBroadcaster};
use super::job::{Job, JobId, Stage, TransitionError};
use crate::error::RegistryError;

type Slot = Arc<RwLock<Job>>;

/// Number of jobs per coarse state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCounts {
    pub total: usize,
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

pub struct TaskRegistry {
    jobs: RwLock<HashMap<JobId, Slot>>,
    events: JobEventBroadcaster,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new(JobEventBroadcaster::default())
    }
}

impl TaskRegistry {
    pub fn new(events: JobEventBroadcaster) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Registers a freshly queued job and announces it.
    pub fn insert(&self, job: Job) -> JobId {
        let id = job.id;
        let event = JobEvent::from_job(&job);
        self.write_jobs().insert(id, Arc::new(RwLock::new(job)));
        self.events.send(event);
        id
    }

    /// Returns a consistent copy of the job's current state.
    pub fn get(&self, id: &JobId) -> Result<Job, RegistryError> {
        let slot = self
            .slot(id)
            .ok_or_else(|| RegistryError::UnknownJob(id.to_string()))?;
        let job = read_slot(&slot).clone();
        Ok(job)
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.read_jobs().contains_key(id)
    }

    /// Applies `change` under the job's write lock and returns the new state.
    ///
    /// If `change` fails the job is left exactly as it was.
    pub fn update<F>(&self, id: &JobId, change: F) -> Result<Job, RegistryError>
    where
        F: FnOnce(&mut Job) -> Result<(), TransitionError>,
    {
        let slot = self
            .slot(id)
            .ok_or_else(|| RegistryError::UnknownJob(id.to_string()))?;

        let snapshot = {
            let mut job = write_slot(&slot);
            let mut next = job.clone();
            change(&mut next)?;
            *job = next;
            job.clone()
        };

        self.events.send(JobEvent::from_job(&snapshot));
        Ok(snapshot)
    }

    /// Advances along the happy path with a progress message.
    pub fn advance(&self, id: &JobId, stage: Stage, message: &str) -> Result<Job, RegistryError> {
        self.update(id, |job| job.advance(stage, message))
    }

    pub fn remove(&self, id: &JobId) -> Option<Job> {
        let slot = self.write_jobs().remove(id)?;
        let job = read_slot(&slot).clone();
        Some(job)
    }

    /// Drops terminal jobs last updated before `cutoff`. Returns how many were removed.
    pub fn prune_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut jobs = self.write_jobs();
        let before = jobs.len();
        jobs.retain(|_, slot| {
            let job = read_slot(slot);
            !(job.is_finished() && job.updated_at < cutoff)
        });
        let removed = before - jobs.len();
        if removed > 0 {
            log::debug!("Pruned {} finished job(s) from registry", removed);
        }
        removed
    }

    /// All jobs, newest submission first.
    pub fn list(&self) -> Vec<Job> {
        let slots: Vec<Slot> = self.read_jobs().values().cloned().collect();
        let mut result: Vec<Job> = slots.iter().map(|s| read_slot(s).clone()).collect();
        result.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        result
    }

    pub fn counts(&self) -> JobCounts {
        let slots: Vec<Slot> = self.read_jobs().values().cloned().collect();
        slots.iter().fold(JobCounts::default(), |mut acc, slot| {
            acc.total += 1;
            match read_slot(slot).stage {
                Stage::Queued => acc.queued += 1,
                Stage::Completed => acc.completed += 1,
                Stage::Failed => acc.failed += 1,
                _ => acc.running += 1,
            }
            acc
        })
    }

    pub fn len(&self) -> usize {
        self.read_jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    fn slot(&self, id: &JobId) -> Option<Slot> {
        self.read_jobs().get(id).cloned()
    }

    fn read_jobs(&self) -> RwLockReadGuard<'_, HashMap<JobId, Slot>> {
        self.jobs.read().unwrap_or_else(|poisoned| {
            log::warn!("Registry lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_jobs(&self) -> RwLockWriteGuard<'_, HashMap<JobId, Slot>> {
        self.jobs.write().unwrap_or_else(|poisoned| {
            log::warn!("Registry lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

fn read_slot(slot: &Slot) -> RwLockReadGuard<'_, Job> {
    slot.read().unwrap_or_else(|poisoned| {
        log::warn!("Job lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

fn write_slot(slot: &Slot) -> RwLockWriteGuard<'_, Job> {
    slot.write().unwrap_or_else(|poisoned| {
        log::warn!("Job lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

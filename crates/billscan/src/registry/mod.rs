//! Job status tracking: the stage state machine, the registry and its event feed.

pub mod events;
pub mod job;
#[allow(clippy::module_inception)]
pub mod registry;

pub use events::{JobEvent, JobEventBroadcaster};
pub use job::{FailureKind, Job, JobArtifacts, JobId, Stage, TransitionError};
pub use registry::{JobCounts, TaskRegistry};

//! Engine error taxonomy.

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::merger::MergeError;
use crate::planner::PlanError;
use crate::status::DownloadStatus;
use crate::task::TaskId;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("task {0} is already queued or running")]
    DuplicateTask(TaskId),

    #[error("planning failed: {0}")]
    PlanningFailed(#[from] PlanError),

    #[error("segment {index} failed after {attempts} attempt(s): {last_error}")]
    SegmentFetchExhausted {
        index: usize,
        attempts: u32,
        last_error: String,
    },

    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("cancelled")]
    Cancelled,

    #[error("persistence: {0}")]
    Persistence(#[from] GatewayError),

    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition {
        from: DownloadStatus,
        to: DownloadStatus,
    },

    #[error("worker failed: {0}")]
    Worker(String),
}

impl EngineError {
    /// True when the persistence gateway could not be reached.
    pub fn is_persistence_unavailable(&self) -> bool {
        matches!(self, EngineError::Persistence(GatewayError::Unavailable(_)))
    }
}

//! Status/persistence gateway: the boundary the engine reads task
//! parameters from and records status and log lines through.
//!
//! Implementations must serialise writes per id; the engine does no locking
//! of persisted state of its own.

mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::status::DownloadStatus;
use crate::task::{TaskId, TaskParams};

pub use memory::MemoryGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("record {0} not found")]
    NotFound(TaskId),
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    /// Wrap any backend error as `Unavailable`, keeping the cause chain.
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        GatewayError::Unavailable(format!("{:#}", err))
    }
}

#[async_trait]
pub trait StatusGateway: Send + Sync {
    async fn load_task_params(&self, id: TaskId) -> Result<TaskParams, GatewayError>;

    async fn status(&self, id: TaskId) -> Result<DownloadStatus, GatewayError>;

    async fn set_status(&self, id: TaskId, status: DownloadStatus) -> Result<(), GatewayError>;

    /// Append one line to the record's diagnostic log.
    async fn append_log(&self, id: TaskId, text: &str) -> Result<(), GatewayError>;
}

//! `StatusGateway` over the record store.

use async_trait::async_trait;

use super::db::RecordStore;
use crate::gateway::{GatewayError, StatusGateway};
use crate::status::DownloadStatus;
use crate::task::{TaskId, TaskParams};

#[async_trait]
impl StatusGateway for RecordStore {
    async fn load_task_params(&self, id: TaskId) -> Result<TaskParams, GatewayError> {
        self.find_record(id)
            .await
            .map_err(GatewayError::unavailable)?
            .map(|r| r.params())
            .ok_or(GatewayError::NotFound(id))
    }

    async fn status(&self, id: TaskId) -> Result<DownloadStatus, GatewayError> {
        self.status_of(id)
            .await
            .map_err(GatewayError::unavailable)?
            .ok_or(GatewayError::NotFound(id))
    }

    async fn set_status(&self, id: TaskId, status: DownloadStatus) -> Result<(), GatewayError> {
        match RecordStore::set_status(self, id, status).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(GatewayError::NotFound(id)),
            Err(e) => Err(GatewayError::unavailable(e)),
        }
    }

    async fn append_log(&self, id: TaskId, text: &str) -> Result<(), GatewayError> {
        match RecordStore::append_log(self, id, text).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(GatewayError::NotFound(id)),
            Err(e) => Err(GatewayError::unavailable(e)),
        }
    }
}

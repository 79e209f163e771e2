//! In-process gateway for embedding and tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{GatewayError, StatusGateway};
use crate::status::DownloadStatus;
use crate::task::{TaskId, TaskParams};

#[derive(Debug, Clone)]
struct MemoryRecord {
    params: TaskParams,
    status: DownloadStatus,
    log: Vec<String>,
    /// Every status written through the gateway, in order.
    history: Vec<DownloadStatus>,
}

#[derive(Debug)]
struct State {
    records: HashMap<TaskId, MemoryRecord>,
    available: bool,
    downloading: usize,
    peak_downloading: usize,
}

/// Gateway backed by a mutex-guarded map. Tracks status history and the peak
/// number of records in `Downloading` at once.
#[derive(Debug)]
pub struct MemoryGateway {
    state: Mutex<State>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                records: HashMap::new(),
                available: true,
                downloading: 0,
                peak_downloading: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a record in `Ready`.
    pub fn insert(&self, id: TaskId, params: TaskParams) {
        self.insert_with_status(id, params, DownloadStatus::Ready);
    }

    pub fn insert_with_status(&self, id: TaskId, params: TaskParams, status: DownloadStatus) {
        self.lock().records.insert(
            id,
            MemoryRecord {
                params,
                status,
                log: Vec::new(),
                history: Vec::new(),
            },
        );
    }

    pub fn current_status(&self, id: TaskId) -> Option<DownloadStatus> {
        self.lock().records.get(&id).map(|r| r.status)
    }

    pub fn history(&self, id: TaskId) -> Vec<DownloadStatus> {
        self.lock()
            .records
            .get(&id)
            .map(|r| r.history.clone())
            .unwrap_or_default()
    }

    pub fn log(&self, id: TaskId) -> String {
        self.lock()
            .records
            .get(&id)
            .map(|r| r.log.join("\n"))
            .unwrap_or_default()
    }

    /// Simulate the backing store going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    pub fn peak_downloading(&self) -> usize {
        self.lock().peak_downloading
    }

    fn check_available(state: &State) -> Result<(), GatewayError> {
        if state.available {
            Ok(())
        } else {
            Err(GatewayError::Unavailable("memory gateway offline".to_string()))
        }
    }
}

#[async_trait]
impl StatusGateway for MemoryGateway {
    async fn load_task_params(&self, id: TaskId) -> Result<TaskParams, GatewayError> {
        let state = self.lock();
        Self::check_available(&state)?;
        state
            .records
            .get(&id)
            .map(|r| r.params.clone())
            .ok_or(GatewayError::NotFound(id))
    }

    async fn status(&self, id: TaskId) -> Result<DownloadStatus, GatewayError> {
        let state = self.lock();
        Self::check_available(&state)?;
        state
            .records
            .get(&id)
            .map(|r| r.status)
            .ok_or(GatewayError::NotFound(id))
    }

    async fn set_status(&self, id: TaskId, status: DownloadStatus) -> Result<(), GatewayError> {
        let mut state = self.lock();
        Self::check_available(&state)?;
        let record = state
            .records
            .get_mut(&id)
            .ok_or(GatewayError::NotFound(id))?;
        let previous = record.status;
        record.status = status;
        record.history.push(status);

        if previous == DownloadStatus::Downloading && status != DownloadStatus::Downloading {
            state.downloading = state.downloading.saturating_sub(1);
        }
        if status == DownloadStatus::Downloading && previous != DownloadStatus::Downloading {
            state.downloading += 1;
            state.peak_downloading = state.peak_downloading.max(state.downloading);
        }
        Ok(())
    }

    async fn append_log(&self, id: TaskId, text: &str) -> Result<(), GatewayError> {
        let mut state = self.lock();
        Self::check_available(&state)?;
        let record = state
            .records
            .get_mut(&id)
            .ok_or(GatewayError::NotFound(id))?;
        record.log.push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;

    fn params() -> TaskParams {
        TaskParams {
            name: "ep1".into(),
            url: "https://x/v.m3u8".into(),
            headers: HashMap::new(),
            kind: TaskKind::Segmented,
            folder: None,
            variant: None,
        }
    }

    #[tokio::test]
    async fn tracks_history_and_peak() {
        let gw = MemoryGateway::new();
        gw.insert(1, params());
        gw.insert(2, params());
        for id in [1, 2] {
            gw.set_status(id, DownloadStatus::Waiting).await.unwrap();
            gw.set_status(id, DownloadStatus::Downloading).await.unwrap();
        }
        gw.set_status(1, DownloadStatus::Success).await.unwrap();
        assert_eq!(gw.peak_downloading(), 2);
        assert_eq!(
            gw.history(1),
            vec![
                DownloadStatus::Waiting,
                DownloadStatus::Downloading,
                DownloadStatus::Success
            ]
        );
        assert_eq!(gw.current_status(2), Some(DownloadStatus::Downloading));
    }

    #[tokio::test]
    async fn offline_and_missing_records() {
        let gw = MemoryGateway::new();
        assert!(matches!(gw.status(5).await, Err(GatewayError::NotFound(5))));
        gw.insert(5, params());
        gw.append_log(5, "first").await.unwrap();
        gw.append_log(5, "second").await.unwrap();
        assert_eq!(gw.log(5), "first\nsecond");
        gw.set_available(false);
        assert!(matches!(
            gw.set_status(5, DownloadStatus::Waiting).await,
            Err(GatewayError::Unavailable(_))
        ));
    }
}

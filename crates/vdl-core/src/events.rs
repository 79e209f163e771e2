//! Push channel for status changes and progress snapshots.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::status::DownloadStatus;
use crate::task::TaskId;

const EVENT_CAPACITY: usize = 256;

/// Point-in-time progress of one running task.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub task_id: TaskId,
    pub bytes_done: u64,
    /// Known only for direct downloads that announce Content-Length.
    pub bytes_total: Option<u64>,
    pub segments_done: usize,
    pub segments_total: usize,
    pub speed_bytes_per_sec: f64,
}

impl ProgressSnapshot {
    /// Completion in [0, 1], by bytes when the total is known, else by segments.
    pub fn fraction(&self) -> f64 {
        match self.bytes_total {
            Some(total) if total > 0 => (self.bytes_done as f64 / total as f64).min(1.0),
            _ if self.segments_total > 0 => {
                self.segments_done as f64 / self.segments_total as f64
            }
            _ => 0.0,
        }
    }

    pub fn eta(&self) -> Option<Duration> {
        let total = self.bytes_total?;
        if self.speed_bytes_per_sec <= 0.0 {
            return None;
        }
        let remaining = total.saturating_sub(self.bytes_done);
        Some(Duration::from_secs_f64(
            remaining as f64 / self.speed_bytes_per_sec,
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Status {
        task_id: TaskId,
        status: DownloadStatus,
    },
    Progress(ProgressSnapshot),
    /// Something the engine could not persist or report otherwise.
    Error { task_id: TaskId, message: String },
}

/// Fire-and-forget broadcaster; having no subscribers is fine.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

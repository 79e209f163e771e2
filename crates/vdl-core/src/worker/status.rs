//! Validated, persisted status transitions for one worker.

use std::sync::Arc;

use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::gateway::{GatewayError, StatusGateway};
use crate::retry::{ErrorKind, RetryDecision, RetryPolicy};
use crate::status::DownloadStatus;
use crate::task::TaskId;

/// Holds the last status that was actually persisted for a task.
pub(crate) struct StatusTracker {
    task_id: TaskId,
    current: DownloadStatus,
    gateway: Arc<dyn StatusGateway>,
    events: EventBus,
    retry: RetryPolicy,
}

impl StatusTracker {
    pub(crate) fn new(
        task_id: TaskId,
        current: DownloadStatus,
        gateway: Arc<dyn StatusGateway>,
        events: EventBus,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            task_id,
            current,
            gateway,
            events,
            retry,
        }
    }

    pub(crate) fn current(&self) -> DownloadStatus {
        self.current
    }

    /// Validate, persist, then publish. Terminal statuses are written with
    /// the retry policy's backoff while the gateway reports `Unavailable`.
    /// On a persistence failure `current` keeps the last persisted status and
    /// an error event is emitted.
    pub(crate) async fn advance(&mut self, next: DownloadStatus) -> Result<(), EngineError> {
        let next = self.current.transition(next)?;
        if let Err(e) = self.persist(next).await {
            tracing::error!(task_id = self.task_id, status = %next, error = %e, "status write failed");
            self.events.emit(EngineEvent::Error {
                task_id: self.task_id,
                message: format!("could not persist status {}: {}", next, e),
            });
            return Err(EngineError::Persistence(e));
        }
        tracing::debug!(task_id = self.task_id, from = %self.current, to = %next, "status");
        self.current = next;
        self.events.emit(EngineEvent::Status {
            task_id: self.task_id,
            status: next,
        });
        Ok(())
    }

    async fn persist(&self, next: DownloadStatus) -> Result<(), GatewayError> {
        let mut attempt = 1u32;
        loop {
            let err = match self.gateway.set_status(self.task_id, next).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            let kind = match err {
                GatewayError::Unavailable(_) if next.is_terminal() => ErrorKind::Connection,
                _ => ErrorKind::Other,
            };
            match self.retry.decide(attempt, kind) {
                RetryDecision::NoRetry => return Err(err),
                RetryDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        task_id = self.task_id,
                        status = %next,
                        attempt,
                        error = %err,
                        "status write failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Append a log line; failures are reported, never fatal.
    pub(crate) async fn log(&self, text: &str) -> bool {
        match self.gateway.append_log(self.task_id, text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(task_id = self.task_id, error = %e, "log write failed");
                self.events.emit(EngineEvent::Error {
                    task_id: self.task_id,
                    message: format!("could not append log: {}", e),
                });
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;
    use crate::task::{TaskKind, TaskParams};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Rejects the first `outages` status writes as `Unavailable`.
    struct FlakyWrites {
        inner: MemoryGateway,
        outages: AtomicUsize,
        writes: AtomicUsize,
    }

    impl FlakyWrites {
        fn new(outages: usize) -> Self {
            let inner = MemoryGateway::new();
            inner.insert_with_status(
                1,
                TaskParams {
                    name: "a".into(),
                    url: "https://example.invalid/a.mp4".into(),
                    headers: HashMap::new(),
                    kind: TaskKind::Direct,
                    folder: None,
                    variant: None,
                },
                DownloadStatus::Downloading,
            );
            Self {
                inner,
                outages: AtomicUsize::new(outages),
                writes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StatusGateway for FlakyWrites {
        async fn load_task_params(&self, id: TaskId) -> Result<TaskParams, GatewayError> {
            self.inner.load_task_params(id).await
        }

        async fn status(&self, id: TaskId) -> Result<DownloadStatus, GatewayError> {
            self.inner.status(id).await
        }

        async fn set_status(&self, id: TaskId, status: DownloadStatus) -> Result<(), GatewayError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            let left = self.outages.load(Ordering::SeqCst);
            if left > 0 {
                self.outages.store(left - 1, Ordering::SeqCst);
                return Err(GatewayError::Unavailable("db locked".into()));
            }
            self.inner.set_status(id, status).await
        }

        async fn append_log(&self, id: TaskId, text: &str) -> Result<(), GatewayError> {
            self.inner.append_log(id, text).await
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
        }
    }

    fn tracker(gateway: Arc<FlakyWrites>, retry: RetryPolicy) -> StatusTracker {
        StatusTracker::new(
            1,
            DownloadStatus::Downloading,
            gateway,
            EventBus::new(),
            retry,
        )
    }

    #[tokio::test]
    async fn terminal_write_survives_short_outage() {
        let gateway = Arc::new(FlakyWrites::new(2));
        let mut tracker = tracker(gateway.clone(), policy(3));
        tracker.advance(DownloadStatus::Failed).await.unwrap();
        assert_eq!(tracker.current(), DownloadStatus::Failed);
        assert_eq!(gateway.writes.load(Ordering::SeqCst), 3);
        assert_eq!(gateway.inner.current_status(1), Some(DownloadStatus::Failed));
    }

    #[tokio::test]
    async fn terminal_write_gives_up_after_policy_attempts() {
        let gateway = Arc::new(FlakyWrites::new(10));
        let mut tracker = tracker(gateway.clone(), policy(2));
        let err = tracker.advance(DownloadStatus::Success).await.unwrap_err();
        assert!(matches!(err, EngineError::Persistence(GatewayError::Unavailable(_))));
        assert_eq!(tracker.current(), DownloadStatus::Downloading);
        assert_eq!(gateway.writes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_terminal_write_is_not_retried() {
        let gateway = Arc::new(FlakyWrites::new(1));
        let mut tracker = StatusTracker::new(
            1,
            DownloadStatus::Waiting,
            gateway.clone(),
            EventBus::new(),
            policy(3),
        );
        assert!(tracker.advance(DownloadStatus::Downloading).await.is_err());
        assert_eq!(gateway.writes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.current(), DownloadStatus::Waiting);
    }
}

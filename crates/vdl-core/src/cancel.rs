//! Cancellation signal shared between the scheduler and one task worker.
//!
//! `stop` requests cancellation and waits (bounded) for the worker to
//! acknowledge that it has observed the request and begun teardown. Final
//! cleanup and the `Stopped` status happen after the acknowledgment.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    requested: CancellationToken,
    acknowledged: CancellationToken,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.requested.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.requested.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.requested.cancelled().await
    }

    /// Token observed by transfers and retry loops.
    pub fn token(&self) -> &CancellationToken {
        &self.requested
    }

    /// Child token: cancelled with the task, or on its own (sibling abort).
    pub fn child_token(&self) -> CancellationToken {
        self.requested.child_token()
    }

    /// Worker side: teardown has started (or the worker is gone).
    pub fn acknowledge(&self) {
        self.acknowledged.cancel();
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged.is_cancelled()
    }

    /// Wait for the acknowledgment; false on timeout.
    pub async fn acknowledged(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.acknowledged.cancelled())
            .await
            .is_ok()
    }
}

/// Acknowledges on drop, so a worker that exits by any path releases a waiting `stop`.
pub(crate) struct AckGuard(pub(crate) CancelSignal);

impl Drop for AckGuard {
    fn drop(&mut self) {
        self.0.acknowledge();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn child_tokens_follow_parent() {
        let signal = CancelSignal::new();
        let child = signal.child_token();
        let sibling = signal.child_token();
        child.cancel();
        assert!(!signal.is_cancelled());
        assert!(!sibling.is_cancelled());
        signal.cancel();
        assert!(sibling.is_cancelled());
    }

    #[tokio::test]
    async fn ack_guard_releases_waiter() {
        let signal = CancelSignal::new();
        assert!(!signal.acknowledged(Duration::from_millis(10)).await);
        {
            let _guard = AckGuard(signal.clone());
        }
        assert!(signal.acknowledged(Duration::from_millis(10)).await);
    }
}

//! RAII guard that frees a worker slot when dropped.

use super::Scheduler;
use crate::task::TaskId;

/// Frees the slot of task `id` and admits the next queued task when dropped.
pub(super) struct SlotGuard {
    scheduler: Scheduler,
    id: TaskId,
}

impl SlotGuard {
    pub(super) fn new(scheduler: Scheduler, id: TaskId) -> Self {
        Self { scheduler, id }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.scheduler.release(self.id);
    }
}

//! Task scheduler: admission, global concurrency bound, FIFO queue, cancel.
//!
//! All queue/running state sits behind one mutex that is never held across
//! an `.await`. A worker's slot is released by a drop guard, so a worker that
//! finishes by any path (including a panic) frees its slot and admits the
//! head of the queue.

mod guard;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;

use crate::cancel::CancelSignal;
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::status::DownloadStatus;
use crate::task::{Task, TaskId};
use crate::worker::{self, WorkerContext};

use guard::SlotGuard;

/// Default bound on how long `cancel` waits for a worker to acknowledge.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Removed from the queue; the record stays `waiting`.
    Dequeued,
    /// Running worker was signalled; it finalises `stopped` on its own.
    Stopping { acknowledged: bool },
    NotActive,
}

#[derive(Default)]
struct State {
    /// Ids whose `Waiting` write is in flight.
    accepting: HashSet<TaskId>,
    /// Accepting ids cancelled before they reached the queue.
    cancel_pending: HashSet<TaskId>,
    queue: VecDeque<Task>,
    running: HashMap<TaskId, CancelSignal>,
}

impl State {
    fn is_active(&self, id: TaskId) -> bool {
        self.accepting.contains(&id)
            || self.running.contains_key(&id)
            || self.queue.iter().any(|t| t.id == id)
    }

    fn is_idle(&self) -> bool {
        self.accepting.is_empty() && self.queue.is_empty() && self.running.is_empty()
    }
}

pub(crate) struct Inner {
    ctx: Arc<WorkerContext>,
    max_concurrent: usize,
    ack_timeout: Duration,
    state: Mutex<State>,
    idle: Notify,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify_if_idle(&self, state: &State) {
        if state.is_idle() {
            self.idle.notify_waiters();
        }
    }
}

/// Cheap to clone; clones share one queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(ctx: Arc<WorkerContext>, max_concurrent: usize) -> Self {
        Self::with_ack_timeout(ctx, max_concurrent, DEFAULT_ACK_TIMEOUT)
    }

    pub fn with_ack_timeout(
        ctx: Arc<WorkerContext>,
        max_concurrent: usize,
        ack_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                ctx,
                max_concurrent: max_concurrent.max(1),
                ack_timeout,
                state: Mutex::new(State::default()),
                idle: Notify::new(),
            }),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    /// Accept `task`: persist `Waiting`, enqueue, try to admit.
    ///
    /// Returns once the task is accepted, never on completion. Rejected with
    /// `DuplicateTask` while the id is accepted, queued or running; nothing is
    /// queued when the status cannot be read or written.
    pub async fn submit(&self, task: Task) -> Result<(), EngineError> {
        let id = task.id;
        {
            let mut st = self.inner.lock();
            if st.is_active(id) {
                return Err(EngineError::DuplicateTask(id));
            }
            st.accepting.insert(id);
        }

        let accepted = self.accept(id).await;

        {
            let mut st = self.inner.lock();
            st.accepting.remove(&id);
            let cancelled = st.cancel_pending.remove(&id);
            if let Err(e) = accepted {
                tracing::warn!(task_id = id, error = %e, "submission rejected");
                self.inner.notify_if_idle(&st);
                return Err(e);
            }
            if cancelled {
                tracing::info!(task_id = id, "cancelled while being accepted; not queued");
                self.inner.notify_if_idle(&st);
                return Ok(());
            }
            st.queue.push_back(task);
            tracing::debug!(task_id = id, queued = st.queue.len(), "task queued");
        }
        self.admit();
        Ok(())
    }

    async fn accept(&self, id: TaskId) -> Result<(), EngineError> {
        let gateway = &self.inner.ctx.gateway;
        let current = gateway.status(id).await?;
        let next = match current {
            // Dequeued, or a crash before admission: re-admitted as is.
            DownloadStatus::Waiting => return Ok(()),
            // No worker of this scheduler holds the id, so the record was left
            // behind by a run whose final status write never landed.
            DownloadStatus::Downloading => {
                tracing::warn!(task_id = id, "re-admitting orphaned downloading record");
                DownloadStatus::Waiting
            }
            other => other.transition(DownloadStatus::Waiting)?,
        };
        gateway.set_status(id, next).await?;
        self.inner.ctx.events.emit(EngineEvent::Status {
            task_id: id,
            status: next,
        });
        Ok(())
    }

    /// Start queued tasks while slots are free.
    pub(crate) fn admit(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no tokio runtime; queued tasks not admitted");
            return;
        };
        let mut st = self.inner.lock();
        while st.running.len() < self.inner.max_concurrent {
            let Some(task) = st.queue.pop_front() else {
                break;
            };
            let id = task.id;
            let signal = CancelSignal::new();
            st.running.insert(id, signal.clone());
            tracing::debug!(task_id = id, running = st.running.len(), "task admitted");

            let guard = SlotGuard::new(self.clone(), id);
            let ctx = Arc::clone(&self.inner.ctx);
            runtime.spawn(async move {
                let _guard = guard;
                let report = worker::run_task(ctx, task, signal).await;
                match &report.error {
                    None => tracing::debug!(task_id = id, status = %report.status, "worker exited"),
                    Some(e) => {
                        tracing::debug!(task_id = id, status = %report.status, error = %e, "worker exited")
                    }
                }
            });
        }
    }

    /// Called by the slot guard when a worker ends.
    pub(crate) fn release(&self, id: TaskId) {
        {
            let mut st = self.inner.lock();
            st.running.remove(&id);
            self.inner.notify_if_idle(&st);
        }
        self.admit();
    }

    /// Cancel a queued or running task.
    ///
    /// Queued (or still being accepted): removed, no status change. Running:
    /// signalled, then waits (bounded) for the worker's acknowledgment;
    /// `Stopped` is written by the worker afterwards.
    pub async fn cancel(&self, id: TaskId) -> CancelOutcome {
        let signal = {
            let mut st = self.inner.lock();
            if st.accepting.contains(&id) {
                st.cancel_pending.insert(id);
                tracing::info!(task_id = id, "cancelled before queueing");
                return CancelOutcome::Dequeued;
            }
            if let Some(pos) = st.queue.iter().position(|t| t.id == id) {
                st.queue.remove(pos);
                tracing::info!(task_id = id, "removed from queue");
                self.inner.notify_if_idle(&st);
                return CancelOutcome::Dequeued;
            }
            match st.running.get(&id) {
                Some(signal) => signal.clone(),
                None => return CancelOutcome::NotActive,
            }
        };

        signal.cancel();
        let acknowledged = signal.acknowledged(self.inner.ack_timeout).await;
        if !acknowledged {
            tracing::warn!(task_id = id, "worker did not acknowledge cancellation in time");
        }
        CancelOutcome::Stopping { acknowledged }
    }

    /// Empty the queue and signal every running worker. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let mut st = self.inner.lock();
        st.queue.clear();
        let accepting: Vec<TaskId> = st.accepting.iter().copied().collect();
        st.cancel_pending.extend(accepting);
        for signal in st.running.values() {
            signal.cancel();
        }
        self.inner.notify_if_idle(&st);
        st.running.len()
    }

    pub fn queued(&self) -> Vec<TaskId> {
        self.inner.lock().queue.iter().map(|t| t.id).collect()
    }

    pub fn running(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.inner.lock().running.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_active(&self, id: TaskId) -> bool {
        self.inner.lock().is_active(id)
    }

    /// Wait until nothing is accepted, queued or running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }
}

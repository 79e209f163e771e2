//! Periodic progress snapshots for one running task.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::events::{EngineEvent, EventBus, ProgressSnapshot};
use crate::task::TaskId;
use crate::transfer::TransferMeter;

/// Shared counters the reporter samples.
#[derive(Clone)]
pub(crate) struct ProgressCounters {
    pub(crate) meter: Arc<TransferMeter>,
    pub(crate) segments_done: Arc<AtomicUsize>,
    pub(crate) segments_total: usize,
}

impl ProgressCounters {
    pub(crate) fn snapshot(&self, task_id: TaskId, speed: f64) -> ProgressSnapshot {
        ProgressSnapshot {
            task_id,
            bytes_done: self.meter.received(),
            bytes_total: self.meter.expected(),
            segments_done: self.segments_done.load(Ordering::Relaxed),
            segments_total: self.segments_total,
            speed_bytes_per_sec: speed,
        }
    }
}

/// Background loop emitting a snapshot every `interval` until finished.
pub(crate) struct ProgressReporter {
    stop: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    pub(crate) fn spawn(
        task_id: TaskId,
        events: EventBus,
        counters: ProgressCounters,
        interval: Duration,
    ) -> Self {
        let stop = CancellationToken::new();
        let loop_stop = stop.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            let mut last_bytes = counters.meter.received();
            let mut last_at = Instant::now();
            loop {
                tokio::select! {
                    _ = loop_stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let now = Instant::now();
                let bytes = counters.meter.received();
                let elapsed = now.duration_since(last_at).as_secs_f64();
                let speed = if elapsed > 0.0 {
                    bytes.saturating_sub(last_bytes) as f64 / elapsed
                } else {
                    0.0
                };
                last_bytes = bytes;
                last_at = now;
                events.emit(EngineEvent::Progress(counters.snapshot(task_id, speed)));
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop the loop and wait for it.
    pub(crate) async fn finish(mut self) {
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_snapshots_until_finished() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let counters = ProgressCounters {
            meter: Arc::new(TransferMeter::new(false)),
            segments_done: Arc::new(AtomicUsize::new(0)),
            segments_total: 4,
        };
        counters.meter.add(1000);
        counters.segments_done.store(2, Ordering::Relaxed);
        let reporter =
            ProgressReporter::spawn(9, events.clone(), counters, Duration::from_millis(10));
        let ev = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match ev {
            EngineEvent::Progress(s) => {
                assert_eq!(s.task_id, 9);
                assert_eq!(s.bytes_done, 1000);
                assert_eq!(s.segments_done, 2);
                assert_eq!(s.segments_total, 4);
                assert_eq!(s.bytes_total, None);
            }
            other => panic!("unexpected {:?}", other),
        }
        reporter.finish().await;
    }
}

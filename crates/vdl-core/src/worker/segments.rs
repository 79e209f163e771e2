//! Bounded-concurrency segment downloads for one plan.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::progress::ProgressCounters;
use super::WorkerSettings;
use crate::cancel::CancelSignal;
use crate::error::EngineError;
use crate::layout;
use crate::planner::{PlannedSegment, SegmentPlan};
use crate::retry::{run_with_retry, RetryError};
use crate::task::TaskId;
use crate::transfer::{self, TransferOptions, TransferRequest};

/// How one segment task ended.
enum SegmentOutcome {
    Done,
    Cancelled,
    Exhausted {
        index: usize,
        attempts: u32,
        last_error: String,
    },
}

/// Fetch every segment of `plan` not already present.
///
/// At most `segment_concurrency` transfers run at once. The first segment
/// that exhausts its retries cancels its siblings; cancellation of the task
/// wins over any segment failure.
pub(crate) async fn download_segments(
    settings: &WorkerSettings,
    plan: &SegmentPlan,
    signal: &CancelSignal,
    counters: &ProgressCounters,
) -> Result<(), EngineError> {
    let stop = signal.child_token();
    let semaphore = Arc::new(Semaphore::new(settings.segment_concurrency.max(1)));
    let options = if plan.needs_merge {
        settings.segment_options
    } else {
        settings.direct_options
    };
    let mut set = JoinSet::new();

    for seg in &plan.segments {
        // Resume only applies to scratch segments; a direct download always refetches.
        if plan.needs_merge {
            if let Some(size) = layout::is_verified_segment(&seg.temp_path) {
                tracing::debug!(task_id = plan.task_id, index = seg.index, size, "segment already present");
                counters.meter.add(size);
                counters.segments_done.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        }

        let permit = tokio::select! {
            _ = stop.cancelled() => break,
            permit = Arc::clone(&semaphore).acquire_owned() => {
                permit.map_err(|e| EngineError::Worker(e.to_string()))?
            }
        };

        let job = SegmentJob {
            task_id: plan.task_id,
            segment: seg.clone(),
            request: TransferRequest {
                url: seg.url.clone(),
                headers: plan.headers.clone(),
                byte_range: seg.byte_range,
            },
            options,
            settings: settings.clone(),
            counters: counters.clone(),
            stop: stop.clone(),
        };
        set.spawn(async move {
            let _permit = permit;
            job.run().await
        });
    }

    let mut failure: Option<EngineError> = None;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(SegmentOutcome::Done) | Ok(SegmentOutcome::Cancelled) => {}
            Ok(SegmentOutcome::Exhausted {
                index,
                attempts,
                last_error,
            }) => {
                failure.get_or_insert(EngineError::SegmentFetchExhausted {
                    index,
                    attempts,
                    last_error,
                });
            }
            Err(e) => {
                stop.cancel();
                failure.get_or_insert(EngineError::Worker(format!("segment task: {}", e)));
            }
        }
    }

    if signal.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct SegmentJob {
    task_id: TaskId,
    segment: PlannedSegment,
    request: TransferRequest,
    options: TransferOptions,
    settings: WorkerSettings,
    counters: ProgressCounters,
    stop: CancellationToken,
}

impl SegmentJob {
    async fn run(self) -> SegmentOutcome {
        let SegmentJob {
            task_id,
            segment,
            request,
            options,
            settings,
            counters,
            stop,
        } = self;
        let index = segment.index;

        let result = run_with_retry(&settings.retry, &stop, |attempt| {
            if attempt > 1 {
                tracing::debug!(task_id, index, attempt, "retrying segment");
            }
            transfer::fetch_to_path(
                request.clone(),
                segment.temp_path.clone(),
                options,
                Arc::clone(&counters.meter),
                stop.clone(),
            )
        })
        .await;

        match result {
            Ok(bytes) => {
                tracing::trace!(task_id, index, bytes, "segment done");
                counters.segments_done.fetch_add(1, Ordering::Relaxed);
                SegmentOutcome::Done
            }
            Err(RetryError::Cancelled) => SegmentOutcome::Cancelled,
            Err(RetryError::Exhausted { attempts, last }) => {
                tracing::warn!(task_id, index, attempts, error = %last, "segment failed");
                stop.cancel();
                SegmentOutcome::Exhausted {
                    index,
                    attempts,
                    last_error: last.to_string(),
                }
            }
        }
    }
}

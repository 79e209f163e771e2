//! Task worker: runs one task end to end.
//!
//! `Downloading` → plan → segments → merge → cleanup → `Success`, with
//! `Failed` (reason appended to the log first) or `Stopped` on the way out.
//! Every exit from `Downloading` attempts a persisted terminal status.

mod progress;
mod segments;
mod status;

use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use crate::cancel::{AckGuard, CancelSignal};
use crate::checksum;
use crate::config::VdlConfig;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::gateway::StatusGateway;
use crate::merger;
use crate::planner::{PlanError, SegmentPlan, SegmentPlanner};
use crate::retry::RetryPolicy;
use crate::status::DownloadStatus;
use crate::storage;
use crate::task::{Task, TaskId};
use crate::transfer::{TransferMeter, TransferOptions};

use progress::{ProgressCounters, ProgressReporter};
use status::StatusTracker;

/// Per-worker tuning, fixed at engine construction.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub segment_concurrency: usize,
    pub retry: RetryPolicy,
    pub segment_options: TransferOptions,
    pub direct_options: TransferOptions,
    pub progress_interval: Duration,
}

impl WorkerSettings {
    pub fn from_config(cfg: &VdlConfig) -> Self {
        Self {
            segment_concurrency: cfg.segment_concurrency.max(1),
            retry: cfg.retry_policy(),
            segment_options: cfg.segment_transfer_options(),
            direct_options: cfg.direct_transfer_options(),
            progress_interval: cfg.progress_interval(),
        }
    }
}

/// Everything a worker needs; shared by all workers of one engine.
pub struct WorkerContext {
    pub gateway: Arc<dyn StatusGateway>,
    pub events: EventBus,
    pub planner: SegmentPlanner,
    pub settings: WorkerSettings,
}

/// How a run ended. `status` is the last status actually persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub status: DownloadStatus,
    pub error: Option<String>,
}

struct Completed {
    output: PathBuf,
    bytes: u64,
    segments: usize,
}

/// Run `task`, which the scheduler has already persisted as `Waiting`.
pub async fn run_task(ctx: Arc<WorkerContext>, task: Task, signal: CancelSignal) -> TaskReport {
    let _ack = AckGuard(signal.clone());
    let task_id = task.id;
    let mut tracker = StatusTracker::new(
        task_id,
        DownloadStatus::Waiting,
        Arc::clone(&ctx.gateway),
        ctx.events.clone(),
        ctx.settings.retry,
    );

    if let Err(e) = tracker.advance(DownloadStatus::Downloading).await {
        return TaskReport {
            task_id,
            status: tracker.current(),
            error: Some(e.to_string()),
        };
    }
    tracing::info!(task_id, url = %task.source_url, kind = %task.kind, "download started");

    let mut plan_slot: Option<SegmentPlan> = None;
    let result = match execute(&ctx, &task, &signal, &mut plan_slot).await {
        Err(_) if signal.is_cancelled() => Err(EngineError::Cancelled),
        other => other,
    };

    let error = match result {
        Ok(done) => {
            finish_success(&ctx, &task, &mut tracker, plan_slot.as_ref(), done)
                .await
                .err()
                .map(|e| e.to_string())
        }
        Err(EngineError::Cancelled) => {
            signal.acknowledge();
            cleanup(task_id, plan_slot.as_ref());
            tracing::info!(task_id, "download stopped");
            if let Err(e) = tracker.advance(DownloadStatus::Stopped).await {
                Some(e.to_string())
            } else {
                None
            }
        }
        Err(e) => {
            cleanup(task_id, plan_slot.as_ref());
            tracing::warn!(task_id, error = %e, "download failed");
            tracker.log(&format!("failed: {}", e)).await;
            match tracker.advance(DownloadStatus::Failed).await {
                Ok(()) => Some(e.to_string()),
                Err(pe) => Some(format!("{}; {}", e, pe)),
            }
        }
    };

    TaskReport {
        task_id,
        status: tracker.current(),
        error,
    }
}

async fn execute(
    ctx: &WorkerContext,
    task: &Task,
    signal: &CancelSignal,
    plan_slot: &mut Option<SegmentPlan>,
) -> Result<Completed, EngineError> {
    let plan = ctx
        .planner
        .plan(task, signal.token())
        .await
        .map_err(|e| match e {
            PlanError::Cancelled => EngineError::Cancelled,
            e => EngineError::PlanningFailed(e),
        })?;
    tracing::info!(
        task_id = task.id,
        segments = plan.len(),
        output = %plan.output.display(),
        "planned"
    );
    let plan = plan_slot.insert(plan);

    let counters = ProgressCounters {
        meter: Arc::new(TransferMeter::new(!plan.needs_merge)),
        segments_done: Arc::new(AtomicUsize::new(0)),
        segments_total: plan.len(),
    };
    let reporter = ProgressReporter::spawn(
        task.id,
        ctx.events.clone(),
        counters.clone(),
        ctx.settings.progress_interval,
    );
    let fetched = segments::download_segments(&ctx.settings, plan, signal, &counters).await;
    reporter.finish().await;
    fetched?;

    if signal.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let bytes = if plan.needs_merge {
        let summary = merger::merge_segments_async(plan.temp_paths(), plan.output.clone()).await?;
        tracing::debug!(task_id = task.id, bytes = summary.bytes, "merged");
        summary.bytes
    } else {
        counters.meter.received()
    };

    Ok(Completed {
        output: plan.output.clone(),
        bytes,
        segments: plan.len(),
    })
}

async fn finish_success(
    ctx: &WorkerContext,
    task: &Task,
    tracker: &mut StatusTracker,
    plan: Option<&SegmentPlan>,
    done: Completed,
) -> Result<(), EngineError> {
    if let Some(plan) = plan.filter(|p| p.needs_merge && task.delete_segments_after_merge) {
        for (path, e) in merger::remove_segments(&plan.temp_paths(), plan.scratch_dir.as_deref()) {
            tracing::warn!(task_id = task.id, path = %path.display(), error = %e, "could not remove segment temp");
        }
    }

    let line = match checksum::digest_path_async(done.output.clone()).await {
        Ok(d) => format!(
            "saved {} ({} bytes, sha256 {})",
            done.output.display(),
            d.size,
            d.sha256
        ),
        Err(e) => {
            tracing::warn!(task_id = task.id, error = %format!("{:#}", e), "checksum failed");
            format!("saved {} ({} bytes)", done.output.display(), done.bytes)
        }
    };
    tracker.log(&line).await;

    tracker.advance(DownloadStatus::Success).await?;
    tracing::info!(task_id = task.id, output = %done.output.display(), bytes = done.bytes, "download finished");
    ctx.events.emit(EngineEvent::Progress(crate::events::ProgressSnapshot {
        task_id: task.id,
        bytes_done: done.bytes,
        bytes_total: Some(done.bytes),
        segments_done: done.segments,
        segments_total: done.segments,
        speed_bytes_per_sec: 0.0,
    }));
    Ok(())
}

/// Delete everything this run left behind. Direct downloads only lose their
/// `.incomplete` file; an existing artifact is never touched.
fn cleanup(task_id: TaskId, plan: Option<&SegmentPlan>) {
    let Some(plan) = plan else {
        return;
    };
    if plan.needs_merge {
        for (path, e) in merger::remove_segments(&plan.temp_paths(), plan.scratch_dir.as_deref()) {
            tracing::warn!(task_id, path = %path.display(), error = %e, "cleanup failed");
        }
    } else if let Err(e) = storage::remove_if_exists(&storage::incomplete_path(&plan.output)) {
        tracing::warn!(task_id, error = %e, "cleanup failed");
    }
}

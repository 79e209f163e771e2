//! Engine facade: explicit construction from config, gateway and extractors.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;

use crate::config::VdlConfig;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::extractor::ExtractorRegistry;
use crate::gateway::StatusGateway;
use crate::planner::SegmentPlanner;
use crate::scheduler::{CancelOutcome, Scheduler};
use crate::task::{Task, TaskDefaults, TaskId};
use crate::worker::{WorkerContext, WorkerSettings};

pub struct Engine {
    scheduler: Scheduler,
    gateway: Arc<dyn StatusGateway>,
    events: EventBus,
    defaults: TaskDefaults,
}

impl Engine {
    /// Build an engine. Configuration is read here once; later edits to the
    /// config file do not reach running or queued tasks.
    pub fn new(
        config: VdlConfig,
        gateway: Arc<dyn StatusGateway>,
        extractors: ExtractorRegistry,
    ) -> Result<Engine> {
        let planner = SegmentPlanner::new(
            config.segment_transfer_options(),
            config.retry_policy(),
            config.quality,
            config.scratch_root()?,
            config.segmented_extension.clone(),
            extractors,
        );
        let defaults = TaskDefaults {
            download_dir: config.effective_download_dir()?,
            delete_segments: config.delete_segments,
        };
        let events = EventBus::new();
        let ctx = Arc::new(WorkerContext {
            gateway: Arc::clone(&gateway),
            events: events.clone(),
            planner,
            settings: WorkerSettings::from_config(&config),
        });
        tracing::debug!(
            max_concurrent = config.max_concurrent,
            segment_concurrency = config.segment_concurrency,
            scratch = %ctx.planner.scratch_root().display(),
            "engine ready"
        );
        Ok(Engine {
            scheduler: Scheduler::new(ctx, config.max_concurrent),
            gateway,
            events,
            defaults,
        })
    }

    /// Build the task for record `id` from its persisted parameters and the
    /// configured defaults.
    pub async fn task_for(&self, id: TaskId) -> Result<Task, EngineError> {
        let params = self.gateway.load_task_params(id).await?;
        Ok(Task::from_params(id, params, &self.defaults))
    }

    /// Start (or restart) record `id`.
    pub async fn start(&self, id: TaskId) -> Result<(), EngineError> {
        let task = self.task_for(id).await?;
        self.scheduler.submit(task).await
    }

    pub async fn submit(&self, task: Task) -> Result<(), EngineError> {
        self.scheduler.submit(task).await
    }

    pub async fn stop(&self, id: TaskId) -> CancelOutcome {
        self.scheduler.cancel(id).await
    }

    pub fn stop_all(&self) -> usize {
        self.scheduler.cancel_all()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub async fn wait_idle(&self) {
        self.scheduler.wait_idle().await
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn defaults(&self) -> &TaskDefaults {
        &self.defaults
    }
}

//! `vdl run` – drive the engine until every started download finishes.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use vdl_core::config::{self, VdlConfig};
use vdl_core::extractor::ExtractorRegistry;
use vdl_core::store::RecordStore;
use vdl_core::{DownloadStatus, Engine, EngineEvent, ProgressSnapshot, TaskId};

use crate::cli::control_socket;

pub async fn run_scheduler(
    store: Arc<RecordStore>,
    cfg: VdlConfig,
    ids: Vec<TaskId>,
    retry_failed: bool,
) -> Result<()> {
    let recovered = store.recover_interrupted().await?;
    if recovered > 0 {
        tracing::info!("marked {} interrupted download(s) as failed", recovered);
    }

    let ids = if ids.is_empty() {
        let mut statuses = vec![DownloadStatus::Ready, DownloadStatus::Waiting];
        if retry_failed {
            statuses.extend([DownloadStatus::Failed, DownloadStatus::Stopped]);
        }
        store.ids_with_status(&statuses).await?
    } else {
        ids
    };
    drive(store, cfg, ids).await
}

/// Start `ids`, print events, wait until idle. Ctrl-C stops everything.
pub(super) async fn drive(store: Arc<RecordStore>, cfg: VdlConfig, ids: Vec<TaskId>) -> Result<()> {
    if ids.is_empty() {
        println!("No downloads to run.");
        return Ok(());
    }

    let engine = Arc::new(Engine::new(cfg, store.clone(), ExtractorRegistry::new())?);

    let socket_path = config::control_socket_path().ok();
    let listener = match socket_path.as_deref() {
        Some(path) => match control_socket::spawn_control_listener(Arc::clone(&engine), path) {
            Ok(handle) => {
                tracing::debug!(path = %path.display(), "control socket listening");
                Some(handle)
            }
            Err(e) => {
                tracing::warn!("control socket unavailable: {:#}", e);
                None
            }
        },
        None => None,
    };
    let printer = tokio::spawn(print_events(engine.subscribe()));

    for &id in &ids {
        if let Err(e) = engine.start(id).await {
            eprintln!("#{}: {}", id, e);
        }
    }

    tokio::select! {
        _ = engine.wait_idle() => {}
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => {
                    let n = engine.stop_all();
                    println!("Stopping {} download(s)...", n);
                }
                Err(e) => tracing::warn!("cannot listen for Ctrl-C: {}", e),
            }
            engine.wait_idle().await;
        }
    }

    if let Some(handle) = listener {
        handle.abort();
        if let Some(path) = &socket_path {
            let _ = std::fs::remove_file(path);
        }
    }
    printer.abort();

    println!();
    for id in ids {
        match store.find_record(id).await? {
            Some(r) => println!(
                "#{:<5} {:<11} {}",
                r.id,
                r.status.as_str(),
                r.last_log_line().unwrap_or("")
            ),
            None => println!("#{:<5} not found", id),
        }
    }
    Ok(())
}

async fn print_events(mut rx: broadcast::Receiver<EngineEvent>) {
    loop {
        match rx.recv().await {
            Ok(EngineEvent::Status { task_id, status }) => println!("#{} {}", task_id, status),
            Ok(EngineEvent::Progress(p)) => println!("{}", format_progress(&p)),
            Ok(EngineEvent::Error { task_id, message }) => {
                eprintln!("#{} error: {}", task_id, message)
            }
            Err(RecvError::Lagged(n)) => tracing::debug!(skipped = n, "event printer lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

pub(crate) fn format_progress(p: &ProgressSnapshot) -> String {
    let done_mib = p.bytes_done as f64 / 1_048_576.0;
    let rate_mib = p.speed_bytes_per_sec / 1_048_576.0;
    let eta = p
        .eta()
        .map(|d| format!("{:.0}s", d.as_secs_f64()))
        .unwrap_or_else(|| "?".to_string());
    format!(
        "  #{} {:.1}%  {}/{} segments  {:.1} MiB  {:.2} MiB/s  ETA {}",
        p.task_id,
        p.fraction() * 100.0,
        p.segments_done,
        p.segments_total,
        done_mib,
        rate_mib,
        eta
    )
}

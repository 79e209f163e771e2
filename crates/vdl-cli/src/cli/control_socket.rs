//! Control socket: server (during `vdl run`) and client (for `vdl stop`).
//! Protocol: one line per command, `stop <id>`; the server answers with one line.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use vdl_core::{CancelOutcome, Engine, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Stop(TaskId),
}

/// Parse one protocol line. Malformed lines yield None.
pub fn parse_command(line: &str) -> Option<ControlCommand> {
    let mut parts = line.split_whitespace();
    let verb = parts.next()?;
    let id = parts.next()?.parse::<TaskId>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    match verb {
        "stop" => Some(ControlCommand::Stop(id)),
        _ => None,
    }
}

pub fn describe_outcome(outcome: CancelOutcome) -> &'static str {
    match outcome {
        CancelOutcome::Dequeued => "removed from queue",
        CancelOutcome::Stopping { acknowledged: true } => "stopping",
        CancelOutcome::Stopping {
            acknowledged: false,
        } => "stop requested (not yet acknowledged)",
        CancelOutcome::NotActive => "not active",
    }
}

/// Binds `path` and spawns a task that serves stop requests against `engine`.
pub fn spawn_control_listener(
    engine: Arc<Engine>,
    path: &Path,
) -> Result<tokio::task::JoinHandle<()>> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    // A stale socket from a crashed run blocks bind.
    let _ = std::fs::remove_file(path);
    let listener = UnixListener::bind(path)
        .with_context(|| format!("bind control socket {}", path.display()))?;

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let engine = Arc::clone(&engine);
                    tokio::spawn(serve_client(engine, stream));
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn serve_client(engine: Arc<Engine>, stream: UnixStream) {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let reply = match parse_command(line.trim()) {
            Some(ControlCommand::Stop(id)) => {
                tracing::info!(task_id = id, "stop requested via control socket");
                describe_outcome(engine.stop(id).await)
            }
            None => "error: expected 'stop <id>'",
        };
        if write.write_all(format!("{}\n", reply).as_bytes()).await.is_err() {
            break;
        }
    }
}

/// Sends `stop <id>` and returns the server's reply. None if no `vdl run` is listening.
pub async fn send_stop(socket_path: &Path, id: TaskId) -> Result<Option<String>> {
    if !socket_path.exists() {
        return Ok(None);
    }
    let stream = match UnixStream::connect(socket_path).await {
        Ok(s) => s,
        // Socket file left behind by a run that is gone.
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let (read, mut write) = stream.into_split();
    write.write_all(format!("stop {}\n", id).as_bytes()).await?;
    let reply = BufReader::new(read).lines().next_line().await?;
    Ok(Some(reply.unwrap_or_default()))
}

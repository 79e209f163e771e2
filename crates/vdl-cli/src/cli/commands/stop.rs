//! `vdl stop <id>` – ask a running `vdl run` to stop a download.

use anyhow::Result;
use vdl_core::config;

use crate::cli::control_socket;

pub async fn run_stop(id: i64) -> Result<()> {
    let path = config::control_socket_path()?;
    match control_socket::send_stop(&path, id).await? {
        Some(reply) => println!("#{}: {}", id, reply),
        None => println!("No running `vdl run`; nothing to stop."),
    }
    Ok(())
}

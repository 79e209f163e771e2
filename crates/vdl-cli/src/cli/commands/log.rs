//! `vdl log <id>` – print a record's log.

use anyhow::{bail, Result};
use vdl_core::store::RecordStore;

pub async fn run_log(store: &RecordStore, id: i64) -> Result<()> {
    match store.read_log(id).await? {
        None => bail!("download {} not found", id),
        Some(log) if log.is_empty() => println!("(log is empty)"),
        Some(log) => println!("{}", log),
    }
    Ok(())
}

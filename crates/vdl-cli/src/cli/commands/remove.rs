//! `vdl remove <id>` – remove a record; optionally delete its files with --delete-files.

use anyhow::{bail, Result};
use vdl_core::config::VdlConfig;
use vdl_core::layout;
use vdl_core::store::RecordStore;

use super::record_artifact_dir;

/// Removes the record. With `delete_files`, also deletes its artifact (if it
/// can be found under the download dir) and its segment scratch directory.
pub async fn run_remove(
    store: &RecordStore,
    cfg: &VdlConfig,
    id: i64,
    delete_files: bool,
) -> Result<()> {
    if delete_files {
        if let Some(record) = store.find_record(id).await? {
            let dir = record_artifact_dir(&cfg.effective_download_dir()?, &record);
            if let Some(path) = layout::find_artifact(&dir, &record.name) {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => tracing::debug!(path = %path.display(), "deleted artifact"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => tracing::warn!(path = %path.display(), "could not delete file: {}", e),
                }
            }
            let scratch = layout::scratch_dir(&cfg.scratch_root()?, id);
            match tokio::fs::remove_dir_all(&scratch).await {
                Ok(()) => tracing::debug!(path = %scratch.display(), "deleted segment scratch dir"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path = %scratch.display(), "could not delete dir: {}", e),
            }
        }
    }

    if !store.delete_record(id).await? {
        bail!("download {} not found", id);
    }
    println!("Removed download {id}");
    Ok(())
}

//! Filesystem layout: artifact names, scratch directories and segment temp files.
//!
//! Artifacts land at `<destination>[/<subfolder>]/<display name>.<ext>`;
//! segment temporaries at `<scratch root>/<task id>/<task id>_<index>.part`.

mod name;
mod sanitize;

use std::path::{Path, PathBuf};

use crate::task::{Task, TaskId};

pub use name::{extension_from_url, name_from_url, DIRECT_FALLBACK_EXTENSION, VIDEO_EXTENSIONS};
pub use sanitize::{sanitize_display_name, sanitize_subfolder};

/// Name used when a display name sanitizes to nothing.
const DEFAULT_NAME: &str = "video";

/// Directory the artifact is written to (destination plus optional subfolder).
pub fn artifact_dir(task: &Task) -> PathBuf {
    let mut dir = task.destination_directory.clone();
    if let Some(sub) = task.subfolder.as_deref().and_then(sanitize_subfolder) {
        dir.push(sub);
    }
    dir
}

/// Final artifact path for `task` with extension `ext`.
pub fn artifact_path(task: &Task, ext: &str) -> PathBuf {
    let mut name = sanitize_display_name(&task.display_name);
    if name.is_empty() {
        name = DEFAULT_NAME.to_string();
    }
    artifact_dir(task).join(format!("{}.{}", name, ext))
}

pub fn scratch_dir(root: &Path, task_id: TaskId) -> PathBuf {
    root.join(task_id.to_string())
}

/// Stable temp name per segment index, so a restart can find finished segments.
pub fn segment_file_name(task_id: TaskId, index: usize) -> String {
    format!("{}_{}.part", task_id, index)
}

/// A segment file counts as verified when it exists under its final name and is non-empty.
/// Transfers only rename into that name after a complete body.
pub fn is_verified_segment(path: &Path) -> Option<u64> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Some(meta.len()),
        _ => None,
    }
}

/// Locate a finished artifact for `name` in `dir`, trying the known video extensions.
pub fn find_artifact(dir: &Path, name: &str) -> Option<PathBuf> {
    let base = sanitize_display_name(name);
    if base.is_empty() {
        return None;
    }
    VIDEO_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", base, ext)))
        .find(|p| p.is_file())
}

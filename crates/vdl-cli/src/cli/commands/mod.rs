//! CLI command handlers, one file per command.

mod add;
mod checksum;
mod completions;
mod edit;
mod list;
mod log;
mod remove;
mod run;
mod stop;

use std::path::{Path, PathBuf};

use vdl_core::layout;
use vdl_core::store::DownloadRecord;

pub use add::{run_add, run_download};
#[cfg(test)]
pub(crate) use add::{params_from_args, resolve_kind};
pub use checksum::run_checksum;
pub use completions::run_completions;
pub use edit::{run_edit, RecordEdit};
pub use list::run_list;
pub use log::run_log;
pub use remove::run_remove;
pub use run::run_scheduler;
pub use stop::run_stop;

/// Directory a record's artifact is written to.
fn record_artifact_dir(download_dir: &Path, record: &DownloadRecord) -> PathBuf {
    let mut dir = download_dir.to_path_buf();
    if let Some(sub) = record.folder.as_deref().and_then(layout::sanitize_subfolder) {
        dir.push(sub);
    }
    dir
}

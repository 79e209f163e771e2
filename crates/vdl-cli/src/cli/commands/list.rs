//! `vdl list` – paginated listing of download records.

use anyhow::Result;
use vdl_core::config::VdlConfig;
use vdl_core::layout;
use vdl_core::store::{Pagination, RecordFilter, RecordStore};
use vdl_core::DownloadStatus;

use super::record_artifact_dir;

pub async fn run_list(
    store: &RecordStore,
    cfg: &VdlConfig,
    page: u32,
    page_size: u32,
    filter: RecordFilter,
) -> Result<()> {
    let pagination = Pagination {
        page,
        page_size,
        filter,
    };
    let result = store.list_records(pagination).await?;
    if result.list.is_empty() {
        println!("No downloads.");
        return Ok(());
    }

    let download_dir = cfg.effective_download_dir()?;
    println!(
        "{:<6} {:<11} {:<10} {:<5} {:<24} {}",
        "ID", "STATUS", "KIND", "FILE", "NAME", "URL"
    );
    for r in &result.list {
        // Successful downloads whose artifact was deleted or moved show as "gone".
        let file = if r.status == DownloadStatus::Success {
            let dir = record_artifact_dir(&download_dir, r);
            if layout::find_artifact(&dir, &r.name).is_some() {
                "yes"
            } else {
                "gone"
            }
        } else {
            "-"
        };
        println!(
            "{:<6} {:<11} {:<10} {:<5} {:<24} {}",
            r.id,
            r.status.as_str(),
            r.kind.as_str(),
            file,
            r.name,
            r.url
        );
    }
    let page_size = page_size.max(1) as i64;
    let pages = (result.total + page_size - 1) / page_size;
    println!("page {} of {} ({} total)", page.max(1), pages.max(1), result.total);
    Ok(())
}

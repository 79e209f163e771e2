//! `vdl add <url>` and `vdl download <url>`.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use vdl_core::config::VdlConfig;
use vdl_core::layout;
use vdl_core::store::{DownloadRecord, RecordStore};
use vdl_core::{TaskKind, TaskParams};

use super::run::drive;
use crate::cli::SourceArgs;

/// Kind from an explicit name, else from the URL (`.m3u8` → segmented).
pub(crate) fn resolve_kind(kind: Option<&str>, url: &str) -> TaskKind {
    if let Some(kind) = kind {
        return TaskKind::parse(kind);
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    if path.to_ascii_lowercase().ends_with(".m3u8") {
        TaskKind::Segmented
    } else {
        TaskKind::Direct
    }
}

pub(crate) fn params_from_args(args: &SourceArgs) -> TaskParams {
    let name = args
        .name
        .clone()
        .or_else(|| layout::name_from_url(&args.url))
        .unwrap_or_else(|| "video".to_string());
    TaskParams {
        name,
        url: args.url.clone(),
        headers: args.headers.iter().cloned().collect::<HashMap<_, _>>(),
        kind: resolve_kind(args.kind.as_deref(), &args.url),
        folder: args.folder.clone(),
        variant: args.variant,
    }
}

pub async fn run_add(store: &RecordStore, args: &SourceArgs) -> Result<DownloadRecord> {
    let record = store.add_record(&params_from_args(args)).await?;
    println!(
        "Added download {} ({}, {}): {}",
        record.id, record.name, record.kind, record.url
    );
    Ok(record)
}

/// Add, then run the new record until it finishes.
pub async fn run_download(store: Arc<RecordStore>, cfg: VdlConfig, args: &SourceArgs) -> Result<()> {
    let record = run_add(&store, args).await?;
    drive(store, cfg, vec![record.id]).await
}

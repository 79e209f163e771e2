//! `vdl edit <id>` – change a record's source fields, optionally starting it.

use anyhow::{Context, Result};
use std::sync::Arc;
use vdl_core::config::VdlConfig;
use vdl_core::planner::VariantPreference;
use vdl_core::store::RecordStore;

use super::add::resolve_kind;
use super::run::drive;

/// Fields to replace; `None` (or no headers) keeps the stored value.
#[derive(Debug, Default)]
pub struct RecordEdit {
    pub url: Option<String>,
    pub name: Option<String>,
    pub kind: Option<String>,
    pub headers: Vec<(String, String)>,
    pub folder: Option<String>,
    pub variant: Option<VariantPreference>,
}

pub async fn run_edit(
    store: Arc<RecordStore>,
    cfg: VdlConfig,
    id: i64,
    edit: RecordEdit,
    now: bool,
) -> Result<()> {
    let record = store
        .find_record(id)
        .await?
        .with_context(|| format!("download {} not found", id))?;

    let mut params = record.params();
    if let Some(url) = edit.url {
        // A new URL may imply a new kind unless one is given.
        if edit.kind.is_none() {
            params.kind = resolve_kind(None, &url);
        }
        params.url = url;
    }
    if let Some(kind) = edit.kind.as_deref() {
        params.kind = resolve_kind(Some(kind), &params.url);
    }
    if let Some(name) = edit.name {
        params.name = name;
    }
    if !edit.headers.is_empty() {
        params.headers = edit.headers.into_iter().collect();
    }
    if let Some(folder) = edit.folder {
        params.folder = Some(folder).filter(|f| !f.trim().is_empty());
    }
    if let Some(variant) = edit.variant {
        params.variant = Some(variant);
    }

    let updated = store.edit_record(id, &params).await?;
    println!("Updated download {} ({}, {})", updated.id, updated.name, updated.kind);

    if now {
        drive(store, cfg, vec![id]).await?;
    }
    Ok(())
}

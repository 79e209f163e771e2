//! Types used by the record store.

use std::collections::HashMap;

use crate::planner::VariantPreference;
use crate::status::DownloadStatus;
use crate::task::{TaskId, TaskKind, TaskParams};

/// One persisted download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub id: TaskId,
    pub name: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub kind: TaskKind,
    pub folder: Option<String>,
    pub variant: Option<VariantPreference>,
    pub status: DownloadStatus,
    /// Newline-separated, append-only.
    pub log: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DownloadRecord {
    pub fn params(&self) -> TaskParams {
        TaskParams {
            name: self.name.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            kind: self.kind.clone(),
            folder: self.folder.clone(),
            variant: self.variant,
        }
    }

    /// Most recent log line, if any.
    pub fn last_log_line(&self) -> Option<&str> {
        self.log.lines().last().filter(|l| !l.is_empty())
    }
}

/// Listing filter: `Done` is `success`, `Unfinished` is everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordFilter {
    #[default]
    All,
    Unfinished,
    Done,
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub filter: RecordFilter,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            filter: RecordFilter::All,
        }
    }
}

impl Pagination {
    pub(crate) fn limit_offset(&self) -> (i64, i64) {
        let size = self.page_size.max(1) as i64;
        let page = self.page.max(1) as i64;
        (size, (page - 1) * size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPage {
    /// Matching records across all pages.
    pub total: i64,
    pub list: Vec<DownloadRecord>,
}

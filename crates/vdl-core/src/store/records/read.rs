//! Record read operations: find, list, log.

use std::collections::HashMap;

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::super::db::RecordStore;
use super::super::types::{DownloadRecord, Pagination, RecordFilter, RecordPage};
use crate::planner::VariantPreference;
use crate::status::DownloadStatus;
use crate::task::{TaskId, TaskKind};

const RECORD_COLUMNS: &str =
    "id, name, url, headers_json, kind, folder, variant, status, log, created_at, updated_at";

pub(crate) fn row_to_record(row: &SqliteRow) -> Result<DownloadRecord> {
    let id: i64 = row.get("id");
    let headers_json: String = row.get("headers_json");
    let headers: HashMap<String, String> = if headers_json.trim().is_empty() {
        HashMap::new()
    } else {
        serde_json::from_str(&headers_json)
            .with_context(|| format!("record {}: bad headers_json", id))?
    };
    let status_str: String = row.get("status");
    let status: DownloadStatus = status_str
        .parse()
        .with_context(|| format!("record {}", id))?;
    let kind: String = row.get("kind");
    let variant = match row.get::<Option<String>, _>("variant") {
        Some(v) => Some(
            VariantPreference::parse(&v)
                .with_context(|| format!("record {}: bad variant '{}'", id, v))?,
        ),
        None => None,
    };

    Ok(DownloadRecord {
        id,
        name: row.get("name"),
        url: row.get("url"),
        headers,
        kind: TaskKind::parse(&kind),
        folder: row.get("folder"),
        variant,
        status,
        log: row.get("log"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn filter_clause(filter: RecordFilter) -> &'static str {
    match filter {
        RecordFilter::All => "",
        RecordFilter::Unfinished => "WHERE status <> 'success'",
        RecordFilter::Done => "WHERE status = 'success'",
    }
}

impl RecordStore {
    pub async fn find_record(&self, id: TaskId) -> Result<Option<DownloadRecord>> {
        let sql = format!("SELECT {} FROM downloads WHERE id = ?1", RECORD_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    /// One page of records, newest first, plus the total matching count.
    pub async fn list_records(&self, pagination: Pagination) -> Result<RecordPage> {
        let clause = filter_clause(pagination.filter);
        let (limit, offset) = pagination.limit_offset();

        let count_sql = format!("SELECT COUNT(*) AS n FROM downloads {}", clause);
        let total: i64 = sqlx::query(&count_sql)
            .fetch_one(&self.pool)
            .await?
            .get("n");

        let sql = format!(
            "SELECT {} FROM downloads {} ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
            RECORD_COLUMNS, clause
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::with_capacity(rows.len());
        for row in &rows {
            list.push(row_to_record(row)?);
        }
        Ok(RecordPage { total, list })
    }

    /// Ids in any of `statuses`, oldest first (start order for `vdl run`).
    pub async fn ids_with_status(&self, statuses: &[DownloadStatus]) -> Result<Vec<TaskId>> {
        let rows = sqlx::query("SELECT id, status FROM downloads ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        let mut out = Vec::new();
        for row in rows {
            let status: String = row.get("status");
            if status
                .parse::<DownloadStatus>()
                .is_ok_and(|s| statuses.contains(&s))
            {
                out.push(row.get("id"));
            }
        }
        Ok(out)
    }

    pub async fn read_log(&self, id: TaskId) -> Result<Option<String>> {
        let row = sqlx::query("SELECT log FROM downloads WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("log")))
    }

    pub(crate) async fn status_of(&self, id: TaskId) -> Result<Option<DownloadStatus>> {
        let row = sqlx::query("SELECT status FROM downloads WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            None => Ok(None),
            Some(r) => {
                let s: String = r.get("status");
                s.parse::<DownloadStatus>()
                    .map(Some)
                    .with_context(|| format!("record {}", id))
            }
        }
    }
}

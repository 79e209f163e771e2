//! Record write operations: add, edit, status, log, delete, recovery.

use anyhow::{Context, Result};
use sqlx::{Sqlite, Transaction};

use super::super::db::{unix_timestamp, RecordStore};
use super::super::types::DownloadRecord;
use crate::status::DownloadStatus;
use crate::task::{TaskId, TaskParams};

/// Log line written for records found in `downloading` at startup.
pub(crate) const INTERRUPTED_LOG: &str = "interrupted: the process exited while downloading";

async fn insert_record(
    tx: &mut Transaction<'_, Sqlite>,
    params: &TaskParams,
    now: i64,
) -> Result<TaskId> {
    let headers_json = serde_json::to_string(&params.headers)?;
    let id = sqlx::query(
        r#"
        INSERT INTO downloads (
            name, url, headers_json, kind, folder, variant, status, log, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, '', ?8, ?9)
        "#,
    )
    .bind(&params.name)
    .bind(&params.url)
    .bind(headers_json)
    .bind(params.kind.as_str())
    .bind(&params.folder)
    .bind(params.variant.map(|v| v.to_string()))
    .bind(DownloadStatus::Ready.as_str())
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await?
    .last_insert_rowid();
    Ok(id)
}

impl RecordStore {
    /// Insert a new record in `ready`.
    pub async fn add_record(&self, params: &TaskParams) -> Result<DownloadRecord> {
        let mut records = self.add_records(std::slice::from_ref(params)).await?;
        records.pop().context("insert returned no record")
    }

    /// Insert several records in one transaction; all or nothing.
    pub async fn add_records(&self, params: &[TaskParams]) -> Result<Vec<DownloadRecord>> {
        let now = unix_timestamp();
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(params.len());
        for p in params {
            ids.push(insert_record(&mut tx, p, now).await?);
        }
        tx.commit().await?;

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            out.push(
                self.find_record(id)
                    .await?
                    .with_context(|| format!("record {} vanished after insert", id))?,
            );
        }
        Ok(out)
    }

    /// Replace the user-editable fields. Status and log are untouched.
    pub async fn edit_record(&self, id: TaskId, params: &TaskParams) -> Result<DownloadRecord> {
        let now = unix_timestamp();
        let headers_json = serde_json::to_string(&params.headers)?;
        let r = sqlx::query(
            r#"
            UPDATE downloads
            SET name = ?1,
                url = ?2,
                headers_json = ?3,
                kind = ?4,
                folder = ?5,
                variant = ?6,
                updated_at = ?7
            WHERE id = ?8
            "#,
        )
        .bind(&params.name)
        .bind(&params.url)
        .bind(headers_json)
        .bind(params.kind.as_str())
        .bind(&params.folder)
        .bind(params.variant.map(|v| v.to_string()))
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if r.rows_affected() == 0 {
            anyhow::bail!("record {} not found", id);
        }
        self.find_record(id)
            .await?
            .with_context(|| format!("record {} not found", id))
    }

    /// Write a status. Returns false if the record does not exist.
    pub async fn set_status(&self, id: TaskId, status: DownloadStatus) -> Result<bool> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE downloads
            SET status = ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(status.as_str())
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }

    /// Append one line to the record's log. Returns false if the record does not exist.
    pub async fn append_log(&self, id: TaskId, text: &str) -> Result<bool> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE downloads
            SET log = CASE WHEN log = '' THEN ?1 ELSE log || char(10) || ?1 END,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(text)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }

    /// Permanently remove a record. Files are handled by the caller.
    pub async fn delete_record(&self, id: TaskId) -> Result<bool> {
        let r = sqlx::query("DELETE FROM downloads WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected() > 0)
    }

    /// Mark records left in `downloading` (crashed or killed process) as `failed`
    /// with an explanatory log line. Call on startup before running anything.
    /// Returns the number of records recovered.
    pub async fn recover_interrupted(&self) -> Result<u64> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE downloads
            SET status = ?1,
                log = CASE WHEN log = '' THEN ?2 ELSE log || char(10) || ?2 END,
                updated_at = ?3
            WHERE status = ?4
            "#,
        )
        .bind(DownloadStatus::Failed.as_str())
        .bind(INTERRUPTED_LOG)
        .bind(now)
        .bind(DownloadStatus::Downloading.as_str())
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }
}

//! SQLite connection, migrations and timestamp helpers. CRUD lives in `records`.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the download record database.
///
/// Default location: `~/.local/state/vdl/downloads.db`.
#[derive(Clone)]
pub struct RecordStore {
    pub(crate) pool: Pool<Sqlite>,
}

impl RecordStore {
    pub fn default_path() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("vdl")?;
        Ok(xdg_dirs.get_state_home().join("downloads.db"))
    }

    /// Open (or create) the default database and run migrations.
    pub async fn open_default() -> Result<Self> {
        Self::open_at(Self::default_path()?).await
    }

    /// Open (or create) the database at `path`, creating parent dirs.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;
        let store = RecordStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory database (single connection so every query sees the same data).
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = RecordStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        // - `headers_json` holds the request headers as a JSON object.
        // - `log` is append-only, newline separated.
        // - `variant` is NULL or the CLI form (`highest`, `lowest`, bandwidth).
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS downloads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                headers_json TEXT NOT NULL DEFAULT '{}',
                kind TEXT NOT NULL,
                folder TEXT,
                variant TEXT,
                status TEXT NOT NULL,
                log TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Databases created before per-task variants lack the column.
        let has_variant: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('downloads') WHERE name = 'variant'",
        )
        .fetch_one(&self.pool)
        .await?;
        if has_variant == 0 {
            sqlx::query("ALTER TABLE downloads ADD COLUMN variant TEXT")
                .execute(&self.pool)
                .await?;
        }

        sqlx::query("CREATE INDEX IF NOT EXISTS downloads_status ON downloads (status);")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Close the pool (waits for in-flight queries).
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Current time as Unix seconds.
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

//! Connection, schema and timestamp helpers. Row operations live in `missions`.

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Percent-encode a path for use in a sqlite:// URI; spaces and special chars
/// would otherwise break parsing.
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

/// Handle to the mission database.
///
/// The file lives under the XDG data directory: `~/.local/share/giga/missions.db`.
#[derive(Clone)]
pub struct MissionDb {
    pub(crate) pool: Pool<Sqlite>,
}

impl MissionDb {
    /// Open (or create) the default database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("giga")?;
        let db_path = xdg_dirs
            .place_data_file("missions.db")
            .context("cannot create data directory")?;
        Self::open_at(db_path).await
    }

    /// Open (or create) the database at `path`, creating parent directories.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await
            .with_context(|| format!("open mission database {}", path.display()))?;
        let db = MissionDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// In-memory database (no disk I/O); used by tests.
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = MissionDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        // `ledger_json` is the RecoveryRecord without its bitmap, which sits in
        // `bitmap` so per-block checkpoints rewrite only a few bytes.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS missions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                final_path TEXT NOT NULL,
                post_json TEXT NOT NULL,
                ledger_json TEXT NOT NULL,
                bitmap BLOB NOT NULL DEFAULT x'',
                total_size INTEGER,
                state TEXT NOT NULL,
                error_kind TEXT,
                error_message TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                settings_json TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Current time as Unix seconds.
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

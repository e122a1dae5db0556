//! SQLite-backed durable key-value store.
//!
//! One table, one row per well-known key. Values are JSON; `updated_at` is
//! unix milliseconds and drives the freshness check on restore.

mod run_state;

pub use run_state::RUN_STATE_KEY;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
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

/// A stored value with the time it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue<T> {
    pub value: T,
    pub updated_at: i64,
}

/// Handle to the state database (`~/.local/state/keycheck/state.db`).
#[derive(Clone)]
pub struct StateStore {
    pool: Pool<Sqlite>,
}

pub fn default_db_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("keycheck")?;
    Ok(xdg_dirs.get_state_home().join("keycheck").join("state.db"))
}

impl StateStore {
    /// Open (or create) the default database and run migrations.
    pub async fn open_default() -> Result<Self> {
        Self::open_at(default_db_path()?).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await
            .with_context(|| format!("open state db: {}", path.display()))?;
        let store = StateStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    #[cfg(test)]
    /// In-memory database for tests (no disk I/O).
    pub(crate) async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = StateStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or replace `key` with `value` serialized as JSON.
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T, updated_at: i64) -> Result<()> {
        let json = serde_json::to_string(value)?;
        sqlx::query(
            r#"
            INSERT INTO kv_state (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(json)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Read `key`; `None` if absent. Fails if the stored JSON does not parse as `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<StoredValue<T>>> {
        let row = sqlx::query(r#"SELECT value, updated_at FROM kv_state WHERE key = ?"#)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let json: String = row.get("value");
        let updated_at: i64 = row.get("updated_at");
        let value = serde_json::from_str(&json).with_context(|| format!("decode stored value for {key}"))?;
        Ok(Some(StoredValue { value, updated_at }))
    }

    /// Delete `key`; returns whether a row existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let res = sqlx::query(r#"DELETE FROM kv_state WHERE key = ?"#)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

/// Current time as Unix milliseconds.
pub fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

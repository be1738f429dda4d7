pub mod repository;
pub mod schema;

use rusqlite_migration::{Migrations, M};

use crate::error::{Error, Result};

/// Database wraps a single `tokio_rusqlite::Connection`. Every closure handed
/// to [`Database::conn`]`.call(..)` runs on the connection's own thread, one at
/// a time, so that thread is the one lock all cache operations share: no
/// caller ever observes another caller's half-written row.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open the database at the default path (`~/.healthdw/health_cache.db`).
    pub async fn open() -> Result<Self> {
        let dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
            .join(".healthdw");
        std::fs::create_dir_all(&dir).map_err(|e| Error::Config(e.to_string()))?;
        Self::open_at(dir.join("health_cache.db")).await
    }

    /// Open the database at the given path.
    pub async fn open_at(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Opening cache database at {}", path.display());

        let conn = tokio_rusqlite::Connection::open(&path).await?;
        Self::init(&conn, true).await?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub async fn open_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::init(&conn, false).await?;
        Ok(Self { conn })
    }

    async fn init(conn: &tokio_rusqlite::Connection, wal: bool) -> Result<()> {
        conn.call(move |conn| {
            if wal {
                conn.execute_batch("PRAGMA journal_mode=WAL;")
                    .map_err(|e| e.to_string())?;
            }
            conn.execute_batch("PRAGMA busy_timeout=5000;")
                .map_err(|e| e.to_string())?;
            let migrations = Migrations::new(vec![M::up(include_str!(
                "migrations/001_initial.sql"
            ))]);
            migrations.to_latest(conn).map_err(|e| e.to_string())?;
            let added = schema::patch_columns(conn).map_err(|e| e.to_string())?;
            if added > 0 {
                log::info!("Patched {added} missing column(s) into existing cache tables");
            }
            Ok::<(), String>(())
        })
        .await
        .map_err(|e| Error::Migration(e.to_string()))
    }

    /// The connection every cache operation goes through.
    pub fn conn(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory() {
        let db = Database::open_memory().await.unwrap();

        let tables: Vec<String> = db
            .conn()
            .call(|conn| schema::list_tables(conn))
            .await
            .unwrap();

        for expected in [
            "daily_metrics_cache",
            "sleep_cache",
            "advanced_metrics_cache",
            "cardio_fitness_cache",
            "activities_cache",
            "cache_metadata",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn test_legacy_file_is_patched_without_data_loss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");

        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE sleep_cache (
                    date TEXT PRIMARY KEY, sleep_score INTEGER, efficiency INTEGER,
                    total_sleep INTEGER, deep_minutes INTEGER, light_minutes INTEGER,
                    rem_minutes INTEGER, wake_minutes INTEGER, start_time TEXT,
                    sleep_data_json TEXT, last_updated TIMESTAMP DEFAULT CURRENT_TIMESTAMP
                 );
                 INSERT INTO sleep_cache (date, sleep_score, total_sleep)
                 VALUES ('2024-02-01', 83, 410);
                 CREATE TABLE daily_metrics_cache (date TEXT PRIMARY KEY, steps INTEGER, weight REAL);
                 INSERT INTO daily_metrics_cache (date, steps) VALUES ('2024-02-01', 12000);",
            )
            .unwrap();
        }

        let db = Database::open_at(&path).await.unwrap();
        let (score, reality, steps, body_fat): (i64, Option<i64>, i64, Option<f64>) = db
            .conn()
            .call(|conn| {
                conn.query_row(
                    "SELECT s.sleep_score, s.reality_score, d.steps, d.body_fat
                     FROM sleep_cache s JOIN daily_metrics_cache d ON d.date = s.date
                     WHERE s.date = '2024-02-01'",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
            })
            .await
            .unwrap();
        assert_eq!(score, 83);
        assert_eq!(reality, None);
        assert_eq!(steps, 12000);
        assert_eq!(body_fat, None);
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        {
            let db = Database::open_at(&path).await.unwrap();
            db.conn()
                .call(|conn| repository::set_metadata(conn, "last_sync_date", "2024-03-01"))
                .await
                .unwrap();
        }

        let db = Database::open_at(&path).await.unwrap();
        let value = db
            .conn()
            .call(|conn| repository::get_metadata(conn, "last_sync_date"))
            .await
            .unwrap();
        assert_eq!(value, Some("2024-03-01".to_string()));
    }
}

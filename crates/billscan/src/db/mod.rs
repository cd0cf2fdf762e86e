//! SQLite persistence for bill records.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

pub mod error;
pub mod migrations;
pub mod record_repo;
pub mod sink;
pub mod stats_repo;

pub use error::DatabaseError;
pub use record_repo::{NewRecord, RecordPage, TransactionRecord};
pub use sink::{RecordSink, SqliteRecordSink};
pub use stats_repo::SpendingStats;

/// Shared handle to one migrated SQLite connection; clones share the connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the file at `path`, creating parent directories and migrating the schema.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| DatabaseError::CreateDirectory {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let db = Self::migrated(conn)?;

        log::info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::migrated(Connection::open_in_memory()?)
    }

    fn migrated(mut conn: Connection) -> Result<Self, DatabaseError> {
        migrations::run_all(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::ConnectionPoisoned)
    }

    /// Runs `f` with the connection held; blocks the calling thread.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        f(&*self.lock()?)
    }

    /// Async entry point: runs `f` on the blocking pool.
    pub async fn call<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Database) -> Result<T, DatabaseError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    pub fn ping(&self) -> Result<(), DatabaseError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
    }
}

/// `~/.billscan/data/billscan.db`, when a home directory is known.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".billscan").join("data").join("billscan.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_is_migrated() {
        let db = Database::open_in_memory().unwrap();
        let version = db.with_conn(migrations::schema_version).unwrap();
        assert_eq!(version, migrations::latest_version());
        db.ping().unwrap();
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("billscan.db");
        Database::open(&path).unwrap().ping().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("billscan.db");
        Database::open(&path)
            .unwrap()
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO bill_records (record_id, payment_method, amount,
                     transaction_time, category, created_at, updated_at)
                     VALUES ('keep', '支付宝', 3.0, '2024-01-01 00:00:00', '餐饮', 'now', 'now')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let reopened = Database::open(&path).unwrap();
        assert_eq!(record_repo::count(&reopened).unwrap(), 1);
    }

    #[test]
    fn test_default_database_path() {
        let path = default_database_path().unwrap();
        assert!(path.ends_with(".billscan/data/billscan.db"));
    }

    #[tokio::test]
    async fn test_call_runs_on_blocking_pool() {
        let db = Database::open_in_memory().unwrap();
        let count = db.call(|db| record_repo::count(db)).await.unwrap();
        assert_eq!(count, 0);
    }
}

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema migration to v{version} failed: {source}")]
    Migration {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database schema v{found} is newer than this build supports (v{latest})")]
    SchemaTooNew { found: u32, latest: u32 },

    #[error("Database connection lock poisoned")]
    ConnectionPoisoned,

    #[error("Database task did not complete: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the on-device store. Always propagated to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Failed to create database directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode or decode record in '{region}': {source}")]
    Serialization {
        region: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

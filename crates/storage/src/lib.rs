//! SQLite access for parking lots and readings.
//!
//! All queries are parameterized; the only dynamic SQL is the placeholder
//! list for `lot_id IN (...)`.

pub mod error;
pub mod lots;
pub mod readings;

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Sqlite;
use tracing::info;

pub use error::StorageError;
pub use lots::upsert_lot_tx;
pub use readings::{insert_reading_tx, ReadingFilter};

/// Pooled handle to the parking database.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open an existing database file and apply pending migrations.
    ///
    /// Fails with [`StorageError::NotFound`] when the file is missing.
    pub async fn open(path: &Path, max_connections: u32) -> Result<Self, StorageError> {
        if !path.exists() {
            return Err(StorageError::NotFound(path.display().to_string()));
        }
        Self::connect(path, max_connections, false).await
    }

    /// Open a database file, creating it (and its parent directory) if missing.
    pub async fn open_or_create(path: &Path, max_connections: u32) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::Other(format!("create {}: {}", parent.display(), e)))?;
            }
        }
        Self::connect(path, max_connections, true).await
    }

    async fn connect(path: &Path, max_connections: u32, create: bool) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create)
            // readings may arrive before their lot row in hand-built databases
            .foreign_keys(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        info!("SQLite database ready: {}", path.display());
        Ok(db)
    }

    /// Private in-memory database with the schema applied.
    ///
    /// Held to a single connection that never expires, since every new
    /// `:memory:` connection is a separate empty database.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(false);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction; pass `&mut *tx` to the `*_tx` helpers.
    pub async fn begin(&self) -> Result<sqlx::Transaction<'static, Sqlite>, StorageError> {
        Ok(self.pool.begin().await?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

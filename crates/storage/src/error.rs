use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database not found at {0}")]
    NotFound(String),

    #[error("sqlite error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("core error: {0}")]
    Core(#[from] parkcast_core::ParkcastError),

    #[error("{0}")]
    Other(String),
}

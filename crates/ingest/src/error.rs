use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {status} for {url}: {body}")]
    Api { status: u16, url: String, body: String },

    #[error("storage error: {0}")]
    Storage(#[from] parkcast_storage::StorageError),
}

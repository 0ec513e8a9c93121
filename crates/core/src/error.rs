use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParkcastError {
    #[error("unrecognized timestamp: {0:?}")]
    InvalidTimestamp(String),
}

pub type Result<T> = std::result::Result<T, ParkcastError>;

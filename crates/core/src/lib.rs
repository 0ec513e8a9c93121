pub mod config;
pub mod error;
pub mod lot;
pub mod time;

pub use config::Config;
pub use error::*;
pub use lot::*;
pub use time::parse_timestamp;

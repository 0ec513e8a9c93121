//! Polls the ParkenDD API and stores lot metadata and free-space readings.

pub mod error;
pub mod ingestor;
pub mod parkendd;

pub use error::IngestError;
pub use ingestor::{Ingestor, PollSummary};
pub use parkendd::{CityInfo, CitySnapshot, Coords, LotReading, LotSnapshot, ParkenddClient, ParkingFeed, DEFAULT_BASE_URL};

//! REST API serving parking occupancy forecasts.

pub mod api;
pub mod error;
pub mod model_handle;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use model_handle::ModelHandle;
pub use router::build_router;
pub use state::AppState;

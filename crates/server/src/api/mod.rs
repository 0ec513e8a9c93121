//! API endpoint modules.

mod current;
mod forecast;
mod health;
mod lots;

pub use current::{current, CurrentQuery, CurrentStatus};
pub use forecast::{confidence_bounds, forecast_all, forecast_lot, ForecastResponse};
pub use health::{health, root, HealthResponse};
pub use lots::{lots, LotResponse};

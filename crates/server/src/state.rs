use parkcast_storage::Database;

use crate::model_handle::ModelHandle;

pub struct AppState {
    pub db: Database,
    pub model: ModelHandle,
    /// Half-width of the forecast band, in percentage points.
    pub confidence_band: f64,
}

impl AppState {
    pub fn new(db: Database, model: ModelHandle, confidence_band: f64) -> Self {
        Self {
            db,
            model,
            confidence_band,
        }
    }
}

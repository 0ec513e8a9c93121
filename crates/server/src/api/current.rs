use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use parkcast_core::OccupancyRecord;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CurrentQuery {
    pub lot_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CurrentStatus {
    pub lot_id: String,
    pub name: String,
    pub total: i64,
    pub free: i64,
    pub occupied: i64,
    /// Null for lots reporting zero capacity.
    pub occupancy_rate: Option<f64>,
    pub timestamp: DateTime<FixedOffset>,
}

impl From<OccupancyRecord> for CurrentStatus {
    fn from(r: OccupancyRecord) -> Self {
        Self {
            lot_id: r.lot_id,
            name: r.name,
            total: r.total,
            free: r.free,
            occupied: r.occupied,
            occupancy_rate: r.occupancy_rate,
            timestamp: r.timestamp,
        }
    }
}

/// Latest reading of every lot, or of `?lot_id=`.
pub async fn current(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CurrentQuery>,
) -> Result<Json<Vec<CurrentStatus>>, ApiError> {
    let lot_id = query.lot_id.as_deref().filter(|id| !id.is_empty());
    let records = state.db.load_current(lot_id).await?;
    Ok(Json(records.into_iter().map(CurrentStatus::from).collect()))
}

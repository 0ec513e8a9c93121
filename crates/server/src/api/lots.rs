use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use parkcast_core::ParkingLot;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct LotResponse {
    pub id: String,
    pub name: String,
    pub total: i64,
    pub lot_type: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<ParkingLot> for LotResponse {
    fn from(lot: ParkingLot) -> Self {
        Self {
            id: lot.id,
            name: lot.name,
            total: lot.total,
            lot_type: lot.lot_type,
            latitude: lot.latitude,
            longitude: lot.longitude,
        }
    }
}

pub async fn lots(State(state): State<Arc<AppState>>) -> Result<Json<Vec<LotResponse>>, ApiError> {
    let lots = state.db.load_parking_lots().await?;
    Ok(Json(lots.into_iter().map(LotResponse::from).collect()))
}

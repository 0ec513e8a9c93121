use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, FixedOffset, Local};
use serde::Serialize;

use parkcast_compute::FeatureFrame;
use parkcast_forecast::Forecaster;
use parkcast_storage::ReadingFilter;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub lot_id: String,
    pub name: String,
    pub predicted_occupancy_rate: f64,
    pub confidence_low: f64,
    pub confidence_high: f64,
    pub forecast_time: DateTime<FixedOffset>,
}

/// `prediction ± band`, clamped to `[0, 100]`.
pub fn confidence_bounds(prediction: f64, band: f64) -> (f64, f64) {
    ((prediction - band).max(0.0), (prediction + band).min(100.0))
}

async fn loaded_model(state: &AppState) -> Result<Arc<Forecaster>, ApiError> {
    state.model.reload_if_changed().await;
    state
        .model
        .current()
        .await
        .ok_or_else(|| ApiError::unavailable("Model not loaded"))
}

/// Predict the latest complete row of every lot in `frame`.
fn forecast_latest(model: &Forecaster, frame: &FeatureFrame, band: f64) -> Result<Vec<ForecastResponse>, ApiError> {
    let latest = frame.latest_per_lot();
    let x = model.features(&latest)?;
    let predictions = model.predict(&x)?;
    let now = Local::now().fixed_offset();

    Ok(latest
        .keys()
        .iter()
        .zip(predictions)
        .map(|(key, p)| {
            let (low, high) = confidence_bounds(p, band);
            ForecastResponse {
                lot_id: key.lot_id.clone(),
                name: key.name.clone(),
                predicted_occupancy_rate: p,
                confidence_low: low,
                confidence_high: high,
                forecast_time: now,
            }
        })
        .collect())
}

pub async fn forecast_lot(
    State(state): State<Arc<AppState>>,
    Path(lot_id): Path<String>,
) -> Result<Json<ForecastResponse>, ApiError> {
    let model = loaded_model(&state).await?;

    if state.db.time_series(&lot_id).await?.is_empty() {
        return Err(ApiError::not_found(format!("No data found for lot {lot_id}")));
    }
    if state.db.find_lot(&lot_id).await?.is_none() {
        return Err(ApiError::not_found(format!("Lot {lot_id} not found")));
    }

    let records = state.db.load_combined(&ReadingFilter::for_lot(&lot_id)).await?;
    let frame = model.pipeline().build(&records)?.complete_rows();
    if frame.is_empty() {
        return Err(ApiError::bad_request(format!(
            "Insufficient historical data for lot {lot_id}. Need at least {} recent readings.",
            model.feature_config().min_history()
        )));
    }

    forecast_latest(&model, &frame, state.confidence_band)?
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| ApiError::internal(format!("no forecast produced for lot {lot_id}")))
}

pub async fn forecast_all(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ForecastResponse>>, ApiError> {
    let model = loaded_model(&state).await?;

    let records = state.db.load_combined(&ReadingFilter::default()).await?;
    if records.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let frame = model.pipeline().build(&records)?.complete_rows();
    if frame.is_empty() {
        return Ok(Json(Vec::new()));
    }

    Ok(Json(forecast_latest(&model, &frame, state.confidence_band)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_clamped() {
        assert_eq!(confidence_bounds(50.0, 10.0), (40.0, 60.0));
        assert_eq!(confidence_bounds(5.0, 10.0), (0.0, 15.0));
        assert_eq!(confidence_bounds(95.0, 10.0), (85.0, 100.0));
        assert_eq!(confidence_bounds(-3.0, 10.0), (0.0, 7.0));
    }
}

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Parking Forecast API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "lots": "/lots",
            "current": "/current",
            "forecast": "/forecast/{lot_id}",
            "forecast_all": "/forecast",
        }
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub model_type: Option<String>,
    pub total_lots: i64,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    let total_lots = state.db.count_lots().await?;
    let model = state.model.current().await;
    Ok(Json(HealthResponse {
        status: "healthy",
        model_loaded: model.is_some(),
        model_type: model.map(|m| m.kind().to_string()),
        total_lots,
    }))
}

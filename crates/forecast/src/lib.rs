//! Occupancy forecasting models.
//!
//! Wraps a random forest (`smartcore`) or gradient-boosted trees (`gbdt`)
//! behind [`Forecaster`], which also remembers the feature layout it was
//! trained on so inference can rebuild identical inputs.

pub mod error;
pub mod kind;
pub mod metrics;
pub mod model;
pub mod report;
pub mod training;

pub use error::ForecastError;
pub use kind::{default_model_path, resolve_model_path, ModelKind};
pub use metrics::{EvalMetrics, TrainMetrics};
pub use model::{chronological_split, FeatureImportance, Forecaster, TrainingSet, FORMAT_VERSION};
pub use report::{LotSummary, PredictionReport, PredictionRow, ReportDetail};
pub use training::{TrainingReport, TrainingRun};

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, FixedOffset, TimeZone};
    use parkcast_compute::FeatureConfig;
    use parkcast_core::{NewReading, ParkingLot};
    use parkcast_storage::Database;

    use crate::{Forecaster, ModelKind, TrainingRun};

    /// `hours` hourly readings per lot with a daily-ish occupancy curve.
    pub async fn seed_history(db: &Database, lots: &[&str], hours: i64) {
        let start = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 4, 0, 0, 0)
            .unwrap();
        for (n, id) in lots.iter().enumerate() {
            db.upsert_lot(&ParkingLot {
                id: id.to_string(),
                city: "Dresden".into(),
                name: format!("Lot {id}"),
                address: None,
                lot_type: Some("Parkhaus".into()),
                total: 200,
                latitude: Some(51.05),
                longitude: Some(13.74),
                region: None,
            })
            .await
            .unwrap();

            for h in 0..hours {
                let busy = ((h % 24) as f64 / 24.0 * std::f64::consts::PI).sin();
                let free = 200 - (busy * 150.0) as i64 - (n as i64 * 10);
                db.insert_reading(&NewReading {
                    lot_id: id.to_string(),
                    city: "Dresden".into(),
                    timestamp: start + Duration::hours(h) + Duration::minutes(n as i64),
                    free,
                    state: "open".into(),
                })
                .await
                .unwrap();
            }
        }
    }

    pub async fn trained(db: &Database) -> Forecaster {
        let run = TrainingRun::new(ModelKind::GradientBoosting, FeatureConfig::default());
        run.execute(db, None).await.unwrap().0
    }
}

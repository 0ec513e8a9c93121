//! Backtest a trained model against stored readings.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tracing::info;

use parkcast_core::LotId;
use parkcast_storage::{Database, ReadingFilter};

use crate::error::{ForecastError, Result};
use crate::model::Forecaster;

const RECENT_ROWS: usize = 10;
const SUMMARY_LOTS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct PredictionRow {
    pub lot_id: LotId,
    pub name: String,
    pub timestamp: DateTime<FixedOffset>,
    pub actual: f64,
    pub predicted: f64,
    /// `actual - predicted`
    pub error: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LotSummary {
    pub lot_id: LotId,
    pub name: String,
    pub avg_actual: f64,
    pub avg_predicted: f64,
    pub mae: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ReportDetail {
    Lot {
        lot_id: LotId,
        name: String,
        total: i64,
        recent: Vec<PredictionRow>,
    },
    Summary {
        lots: Vec<LotSummary>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionReport {
    pub readings: usize,
    pub rows: usize,
    /// Mean absolute error over every predicted row.
    pub mae: f64,
    pub detail: ReportDetail,
}

impl PredictionReport {
    /// Predict every complete row of the stored history, optionally for one lot.
    pub async fn build(db: &Database, forecaster: &Forecaster, lot_id: Option<&str>) -> Result<Self> {
        let filter = match lot_id {
            Some(id) => ReadingFilter::for_lot(id),
            None => ReadingFilter::default(),
        };
        let records = db.load_combined(&filter).await?;
        info!("Loaded {} readings", records.len());

        let frame = forecaster.pipeline().build(&records)?.complete_rows();
        if frame.is_empty() {
            return Err(ForecastError::InsufficientData(match lot_id {
                Some(id) => format!("no complete feature rows for lot {id}"),
                None => "no complete feature rows".into(),
            }));
        }

        let x = forecaster.features(&frame)?;
        let predicted = forecaster.predict(&x)?;

        let rows: Vec<PredictionRow> = frame
            .keys()
            .iter()
            .zip(frame.target_vector())
            .zip(predicted)
            .map(|((key, actual), predicted)| PredictionRow {
                lot_id: key.lot_id.clone(),
                name: key.name.clone(),
                timestamp: key.timestamp,
                actual,
                predicted,
                error: actual - predicted,
            })
            .collect();

        let mae = mean_abs_error(rows.iter());
        let detail = match lot_id {
            Some(id) => {
                let key = &frame.keys()[0];
                ReportDetail::Lot {
                    lot_id: id.to_string(),
                    name: key.name.clone(),
                    total: key.total,
                    recent: rows[rows.len().saturating_sub(RECENT_ROWS)..].to_vec(),
                }
            }
            None => ReportDetail::Summary {
                lots: summarize(&rows),
            },
        };

        Ok(Self {
            readings: records.len(),
            rows: rows.len(),
            mae,
            detail,
        })
    }
}

fn mean_abs_error<'a>(rows: impl Iterator<Item = &'a PredictionRow>) -> f64 {
    let (sum, n) = rows.fold((0.0, 0usize), |(sum, n), r| (sum + r.error.abs(), n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Per-lot averages, worst MAE first.
fn summarize(rows: &[PredictionRow]) -> Vec<LotSummary> {
    let mut groups: HashMap<&str, Vec<&PredictionRow>> = HashMap::new();
    for row in rows {
        groups.entry(row.lot_id.as_str()).or_default().push(row);
    }

    let mut lots: Vec<LotSummary> = groups
        .into_values()
        .map(|group| {
            let n = group.len() as f64;
            LotSummary {
                lot_id: group[0].lot_id.clone(),
                name: group[0].name.clone(),
                avg_actual: group.iter().map(|r| r.actual).sum::<f64>() / n,
                avg_predicted: group.iter().map(|r| r.predicted).sum::<f64>() / n,
                mae: mean_abs_error(group.iter().copied()),
            }
        })
        .collect();

    lots.sort_by(|a, b| b.mae.total_cmp(&a.mae).then_with(|| a.lot_id.cmp(&b.lot_id)));
    lots.truncate(SUMMARY_LOTS);
    lots
}

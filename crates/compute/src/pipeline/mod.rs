//! Feature pipeline for occupancy forecasting.
//!
//! Turns chronologically ordered [`OccupancyRecord`]s into a numeric
//! [`FeatureFrame`] in three stages:
//!
//! - **temporal**: calendar fields plus cyclical sin/cos encodings.
//! - **lag**: the target N observations earlier, per lot.
//! - **rolling**: windowed mean/std/max/min of the target, per lot.
//!
//! The same [`FeatureConfig`] must drive training and inference; it is
//! persisted next to the model for that reason.

pub mod frame;
pub mod lag;
pub mod rolling;
pub mod temporal;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use parkcast_core::config::FeatureSettings;
use parkcast_core::OccupancyRecord;

use self::frame::FeatureFrame;
use self::temporal::TEMPORAL_COLUMNS;

/// Name of the forecast target.
pub const TARGET_COLUMN: &str = "occupancy_rate";

/// Lot capacity, carried as a plain numeric feature.
pub const CAPACITY_COLUMN: &str = "total";

#[derive(Error, Debug, PartialEq)]
pub enum PipelineError {
    #[error("unknown feature column: {0}")]
    UnknownColumn(String),

    #[error("column {name} has {actual} values, frame has {expected} rows")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// Lag periods and rolling windows used to build the frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub lags: Vec<usize>,
    pub windows: Vec<usize>,
}

impl Default for FeatureConfig {
    /// The short horizon that works with only a few readings per lot.
    fn default() -> Self {
        Self {
            lags: vec![1, 2, 3],
            windows: vec![3],
        }
    }
}

impl FeatureConfig {
    pub fn new(lags: Vec<usize>, windows: Vec<usize>) -> Self {
        Self {
            lags: dedup_positive(lags),
            windows: dedup_positive(windows),
        }
    }

    /// Hourly-and-daily horizon for databases with a long history.
    pub fn extended() -> Self {
        Self::new(vec![1, 2, 3, 6, 12, 24], vec![3, 6, 12, 24])
    }

    /// Model input columns in canonical order.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(1 + TEMPORAL_COLUMNS.len() + self.lags.len() + self.windows.len() * 4);
        names.push(CAPACITY_COLUMN.to_string());
        names.extend(TEMPORAL_COLUMNS.iter().map(|c| c.to_string()));
        names.extend(self.lags.iter().map(|&n| lag::lag_column(TARGET_COLUMN, n)));
        for &w in &self.windows {
            for stat in rolling::ROLLING_STATS {
                names.push(rolling::rolling_column(TARGET_COLUMN, stat, w));
            }
        }
        names
    }

    /// Fewest readings a lot needs before it yields one complete row.
    pub fn min_history(&self) -> usize {
        // rolling std needs two observations
        let lag = self.lags.iter().copied().max().unwrap_or(0) + 1;
        let roll = if self.windows.is_empty() { 1 } else { 2 };
        lag.max(roll)
    }
}

impl From<&FeatureSettings> for FeatureConfig {
    fn from(settings: &FeatureSettings) -> Self {
        Self::new(settings.lags.clone(), settings.windows.clone())
    }
}

fn dedup_positive(values: Vec<usize>) -> Vec<usize> {
    let mut out: Vec<usize> = Vec::with_capacity(values.len());
    for v in values {
        if v > 0 && !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

/// Runs every feature stage for a fixed [`FeatureConfig`].
#[derive(Debug, Clone, Default)]
pub struct FeaturePipeline {
    config: FeatureConfig,
}

impl FeaturePipeline {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Build the full frame. `records` must be in chronological order.
    pub fn build(&self, records: &[OccupancyRecord]) -> Result<FeatureFrame, PipelineError> {
        let mut frame = FeatureFrame::from_records(records);
        let capacity = records.iter().map(|r| Some(r.total as f64)).collect();
        frame.add_column(CAPACITY_COLUMN, capacity)?;

        temporal::add_temporal_features(&mut frame)?;
        debug!("temporal features: {} rows, {} columns", frame.len(), frame.width());

        lag::add_lag_features(&mut frame, &self.config.lags)?;
        debug!("lag features: {} rows, {} columns", frame.len(), frame.width());

        rolling::add_rolling_features(&mut frame, &self.config.windows)?;
        debug!(
            "rolling features: {} rows, {} columns, {} missing values",
            frame.len(),
            frame.width(),
            frame.missing_count()
        );

        Ok(frame)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Duration, FixedOffset, TimeZone};
    use parkcast_core::OccupancyRecord;

    pub fn start() -> DateTime<FixedOffset> {
        // Monday
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 4, 6, 0, 0)
            .unwrap()
    }

    /// One record per hour for `lot_id`, with the given occupancy rates.
    pub fn series(lot_id: &str, offset_minutes: i64, rates: &[Option<f64>]) -> Vec<OccupancyRecord> {
        rates
            .iter()
            .enumerate()
            .map(|(i, rate)| {
                let total = 100;
                let free = rate.map(|r| (100.0 - r).round() as i64).unwrap_or(0);
                OccupancyRecord {
                    reading_id: i as i64,
                    lot_id: lot_id.to_string(),
                    name: format!("Lot {lot_id}"),
                    total,
                    lot_type: None,
                    latitude: None,
                    longitude: None,
                    timestamp: start() + Duration::hours(i as i64) + Duration::minutes(offset_minutes),
                    free,
                    occupied: total - free,
                    occupancy_rate: *rate,
                }
            })
            .collect()
    }

    /// Interleave records from several lots by timestamp, as the loader returns them.
    pub fn interleave(mut parts: Vec<Vec<OccupancyRecord>>) -> Vec<OccupancyRecord> {
        let mut all: Vec<OccupancyRecord> = parts.drain(..).flatten().collect();
        all.sort_by_key(|r| r.timestamp);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn default_matches_training_horizon() {
        let cfg = FeatureConfig::default();
        assert_eq!(cfg.lags, vec![1, 2, 3]);
        assert_eq!(cfg.windows, vec![3]);
        assert_eq!(cfg.min_history(), 4);
    }

    #[test]
    fn new_drops_zero_and_duplicates() {
        let cfg = FeatureConfig::new(vec![2, 0, 1, 2], vec![3, 3]);
        assert_eq!(cfg.lags, vec![2, 1]);
        assert_eq!(cfg.windows, vec![3]);
    }

    #[test]
    fn column_names_in_canonical_order() {
        let names = FeatureConfig::default().column_names();
        assert_eq!(names.len(), 1 + 15 + 3 + 4);
        assert_eq!(names[0], "total");
        assert_eq!(names[1], "hour");
        assert_eq!(names[16], "occupancy_rate_lag_1");
        assert_eq!(names[19], "occupancy_rate_rolling_mean_3");
        assert_eq!(names[22], "occupancy_rate_rolling_min_3");
    }

    #[test]
    fn build_produces_configured_columns() {
        let records = series("a", 0, &[Some(10.0), Some(20.0), Some(30.0), Some(40.0), Some(50.0)]);
        let pipeline = FeaturePipeline::default();
        let frame = pipeline.build(&records).unwrap();

        assert_eq!(frame.len(), 5);
        assert_eq!(frame.feature_columns(), pipeline.config().column_names().as_slice());

        // rows 0..3 lack lag_3; row 3 and 4 are complete
        let complete = frame.complete_rows();
        assert_eq!(complete.len(), 2);
        assert_eq!(complete.targets(), &[Some(40.0), Some(50.0)]);
    }

    #[test]
    fn empty_input_gives_empty_frame() {
        let frame = FeaturePipeline::default().build(&[]).unwrap();
        assert!(frame.is_empty());
        assert!(frame.complete_rows().is_empty());
        assert!(frame.latest_per_lot().is_empty());
    }

    #[test]
    fn config_roundtrips_through_json() {
        let cfg = FeatureConfig::extended();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: FeatureConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}

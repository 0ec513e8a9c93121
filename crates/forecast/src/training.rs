//! End-to-end training: load, featurize, split, fit, evaluate, save.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use parkcast_compute::{FeatureConfig, FeaturePipeline};
use parkcast_storage::{Database, ReadingFilter};

use crate::error::{ForecastError, Result};
use crate::kind::ModelKind;
use crate::metrics::{EvalMetrics, TrainMetrics};
use crate::model::{FeatureImportance, Forecaster};

/// Parameters for one training run.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub kind: ModelKind,
    pub feature_config: FeatureConfig,
    pub test_fraction: f64,
    pub top_features: usize,
}

impl TrainingRun {
    pub fn new(kind: ModelKind, feature_config: FeatureConfig) -> Self {
        Self {
            kind,
            feature_config,
            test_fraction: 0.2,
            top_features: 10,
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub model_kind: ModelKind,
    pub readings: usize,
    pub lots: usize,
    pub feature_rows: usize,
    pub complete_rows: usize,
    pub feature_count: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub train_metrics: TrainMetrics,
    pub eval_metrics: EvalMetrics,
    pub top_features: Vec<FeatureImportance>,
    pub saved_to: Option<PathBuf>,
}

impl TrainingRun {
    pub async fn execute(&self, db: &Database, save_to: Option<&Path>) -> Result<(Forecaster, TrainingReport)> {
        info!("=== Training {} model ===", self.kind);

        let records = db.load_combined(&ReadingFilter::default()).await?;
        let lots = records.iter().map(|r| r.lot_id.as_str()).collect::<HashSet<_>>().len();
        info!("Loaded {} readings from {} parking lots", records.len(), lots);

        let pipeline = FeaturePipeline::new(self.feature_config.clone());
        let frame = pipeline.build(&records)?;
        info!(
            "Engineered {} rows, {} columns, {} missing values",
            frame.len(),
            frame.width(),
            frame.missing_count()
        );

        let complete = frame.complete_rows();
        info!("After dropping incomplete rows: {} rows", complete.len());
        if complete.is_empty() {
            warn!(
                "No rows left; collect more readings (each lot needs {}) or reduce lag periods",
                self.feature_config.min_history()
            );
            return Err(ForecastError::InsufficientData(
                "no complete rows after feature engineering".into(),
            ));
        }

        let mut forecaster = Forecaster::new(self.kind, self.feature_config.clone());
        let dataset = forecaster.prepare(&complete)?;
        let (train, test) = dataset.split(self.test_fraction);
        info!("Split: {} train / {} test samples", train.len(), test.len());
        if train.is_empty() {
            return Err(ForecastError::InsufficientData(format!(
                "{} complete rows is too few to split",
                dataset.len()
            )));
        }

        let train_metrics = forecaster.train(&train, Some(&test))?;
        info!(
            "Training metrics: mae={:.4} rmse={:.4} r2={:.4}",
            train_metrics.train_mae, train_metrics.train_rmse, train_metrics.train_r2
        );

        let eval_metrics = forecaster.evaluate(&test.x, &test.y)?;
        info!(
            "Test metrics: mae={:.4} rmse={:.4} r2={:.4} mape={}",
            eval_metrics.mae,
            eval_metrics.rmse,
            eval_metrics.r2,
            eval_metrics
                .mape
                .map(|m| format!("{m:.2}%"))
                .unwrap_or_else(|| "n/a".into())
        );

        let top_features = forecaster.feature_importance(&test.x, &test.y, self.top_features)?;

        let saved_to = match save_to {
            Some(path) => {
                forecaster.save(path)?;
                Some(path.to_path_buf())
            }
            None => None,
        };

        let report = TrainingReport {
            model_kind: self.kind,
            readings: records.len(),
            lots,
            feature_rows: frame.len(),
            complete_rows: complete.len(),
            feature_count: dataset.feature_columns.len(),
            train_size: train.len(),
            test_size: test.len(),
            train_metrics,
            eval_metrics,
            top_features,
            saved_to,
        };
        Ok((forecaster, report))
    }
}

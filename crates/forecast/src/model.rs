use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use gbdt::config::Config as GbdtConfig;
use gbdt::decision_tree::{Data, DataVec, ValueType};
use gbdt::gradient_boost::GBDT;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use tracing::{debug, info};

use parkcast_compute::{FeatureConfig, FeatureFrame, FeaturePipeline, TARGET_COLUMN};

use crate::error::{ForecastError, Result};
use crate::kind::ModelKind;
use crate::metrics::{mae, r2, rmse, EvalMetrics, TrainMetrics};

/// Bumped whenever the on-disk envelope changes shape.
pub const FORMAT_VERSION: u32 = 1;

const SEED: u64 = 42;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TrainedModel {
    RandomForest(Forest),
    GradientBoosting(GBDT),
}

/// Model file layout. `M` is borrowed on save and owned on load.
#[derive(Serialize, Deserialize)]
struct Envelope<M> {
    format_version: u32,
    model_kind: ModelKind,
    feature_columns: Vec<String>,
    target_column: String,
    feature_config: FeatureConfig,
    trained_at: DateTime<Utc>,
    model: M,
}

/// Feature matrix and target vector, row-aligned.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
    pub feature_columns: Vec<String>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Split off the trailing `test_fraction` as a test set, keeping row order.
    pub fn split(&self, test_fraction: f64) -> (TrainingSet, TrainingSet) {
        let (n_train, _) = chronological_split(self.len(), test_fraction);
        let part = |range: std::ops::Range<usize>| TrainingSet {
            x: self.x[range.clone()].to_vec(),
            y: self.y[range].to_vec(),
            feature_columns: self.feature_columns.clone(),
        };
        (part(0..n_train), part(n_train..self.len()))
    }
}

/// `(n_train, n_test)` with `n_test = ceil(n * test_fraction)`.
pub fn chronological_split(n: usize, test_fraction: f64) -> (usize, usize) {
    let fraction = test_fraction.clamp(0.0, 1.0);
    let n_test = ((n as f64 * fraction).ceil() as usize).min(n);
    (n - n_test, n_test)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Occupancy regressor plus the feature layout it was trained on.
pub struct Forecaster {
    kind: ModelKind,
    model: Option<TrainedModel>,
    feature_columns: Vec<String>,
    target_column: String,
    feature_config: FeatureConfig,
    trained_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for Forecaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forecaster")
            .field("kind", &self.kind)
            .field("trained", &self.model.is_some())
            .field("features", &self.feature_columns.len())
            .field("feature_config", &self.feature_config)
            .field("trained_at", &self.trained_at)
            .finish()
    }
}

impl Forecaster {
    pub fn new(kind: ModelKind, feature_config: FeatureConfig) -> Self {
        Self {
            kind,
            model: None,
            feature_columns: Vec::new(),
            target_column: TARGET_COLUMN.to_string(),
            feature_config,
            trained_at: None,
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    pub fn feature_config(&self) -> &FeatureConfig {
        &self.feature_config
    }

    pub fn trained_at(&self) -> Option<DateTime<Utc>> {
        self.trained_at
    }

    /// The pipeline that produced this model's training features.
    pub fn pipeline(&self) -> FeaturePipeline {
        FeaturePipeline::new(self.feature_config.clone())
    }

    /// Turn a feature frame into a training set. Rows without a target are
    /// dropped and missing features become 0.
    pub fn prepare(&mut self, frame: &FeatureFrame) -> Result<TrainingSet> {
        let rows: Vec<usize> = frame
            .targets()
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.map(|_| i))
            .collect();
        if rows.is_empty() {
            return Err(ForecastError::InsufficientData(
                "no rows with a known occupancy rate".into(),
            ));
        }

        let labelled = frame.select_rows(&rows);
        let feature_columns = labelled.feature_columns().to_vec();
        let x = labelled.matrix(&feature_columns)?;
        let y = labelled.target_vector();

        self.feature_columns = feature_columns.clone();
        self.target_column = TARGET_COLUMN.to_string();

        Ok(TrainingSet { x, y, feature_columns })
    }

    /// Model inputs for `frame`, in trained column order.
    pub fn features(&self, frame: &FeatureFrame) -> Result<Vec<Vec<f64>>> {
        if self.feature_columns.is_empty() {
            return Err(ForecastError::NotTrained);
        }
        Ok(frame.matrix(&self.feature_columns)?)
    }

    pub fn train(&mut self, train: &TrainingSet, validation: Option<&TrainingSet>) -> Result<TrainMetrics> {
        if train.is_empty() {
            return Err(ForecastError::InsufficientData("empty training set".into()));
        }
        check_width(&train.x, train.feature_columns.len())?;

        info!(
            "Training {} model on {} rows x {} features",
            self.kind,
            train.len(),
            train.feature_columns.len()
        );

        let model = match self.kind {
            ModelKind::RandomForest => TrainedModel::RandomForest(fit_forest(train)?),
            ModelKind::GradientBoosting => TrainedModel::GradientBoosting(fit_boosting(train)),
        };
        self.model = Some(model);
        self.feature_columns = train.feature_columns.clone();
        self.trained_at = Some(Utc::now());

        let fitted = self.predict(&train.x)?;
        let mut metrics = TrainMetrics {
            train_mae: mae(&train.y, &fitted),
            train_rmse: rmse(&train.y, &fitted),
            train_r2: r2(&train.y, &fitted),
            val_mae: None,
            val_rmse: None,
            val_r2: None,
        };

        if let Some(val) = validation.filter(|v| !v.is_empty()) {
            let predicted = self.predict(&val.x)?;
            metrics.val_mae = Some(mae(&val.y, &predicted));
            metrics.val_rmse = Some(rmse(&val.y, &predicted));
            metrics.val_r2 = Some(r2(&val.y, &predicted));
        }

        debug!("training metrics: {:?}", metrics);
        Ok(metrics)
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        let model = self.model.as_ref().ok_or(ForecastError::NotTrained)?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        check_width(rows, self.feature_columns.len())?;

        match model {
            TrainedModel::RandomForest(forest) => {
                let x = DenseMatrix::from_2d_vec(&rows.to_vec());
                forest
                    .predict(&x)
                    .map_err(|e| ForecastError::Backend(e.to_string()))
            }
            TrainedModel::GradientBoosting(gbdt) => {
                let data: DataVec = rows
                    .iter()
                    .map(|row| Data::new_test_data(to_values(row), None))
                    .collect();
                Ok(gbdt.predict(&data).into_iter().map(f64::from).collect())
            }
        }
    }

    pub fn evaluate(&self, x: &[Vec<f64>], y: &[f64]) -> Result<EvalMetrics> {
        let predicted = self.predict(x)?;
        Ok(EvalMetrics::compute(y, &predicted))
    }

    /// Permutation importance: the MAE increase when one column is shuffled.
    /// Sorted descending and truncated to `top_n`.
    pub fn feature_importance(&self, x: &[Vec<f64>], y: &[f64], top_n: usize) -> Result<Vec<FeatureImportance>> {
        let baseline = mae(y, &self.predict(x)?);

        let mut scores = (0..self.feature_columns.len())
            .into_par_iter()
            .map(|col| {
                let mut column: Vec<f64> = x.iter().map(|row| row[col]).collect();
                let mut rng = StdRng::seed_from_u64(SEED + col as u64);
                column.shuffle(&mut rng);

                let permuted: Vec<Vec<f64>> = x
                    .iter()
                    .zip(&column)
                    .map(|(row, v)| {
                        let mut row = row.clone();
                        row[col] = *v;
                        row
                    })
                    .collect();

                let score = mae(y, &self.predict(&permuted)?) - baseline;
                Ok(FeatureImportance {
                    feature: self.feature_columns[col].clone(),
                    importance: score,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        scores.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        scores.truncate(top_n);
        Ok(scores)
    }

    /// Write the model envelope as JSON via a temp file and rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let model = self.model.as_ref().ok_or(ForecastError::NotTrained)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let envelope = Envelope {
            format_version: FORMAT_VERSION,
            model_kind: self.kind,
            feature_columns: self.feature_columns.clone(),
            target_column: self.target_column.clone(),
            feature_config: self.feature_config.clone(),
            trained_at: self.trained_at.unwrap_or_else(Utc::now),
            model,
        };

        let tmp = path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, &envelope)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;

        info!("Model saved to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let value: serde_json::Value = serde_json::from_reader(reader)?;

        let version = value
            .get("format_version")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        if version != u64::from(FORMAT_VERSION) {
            return Err(ForecastError::UnsupportedFormat(version));
        }

        let envelope: Envelope<TrainedModel> = serde_json::from_value(value)?;
        info!(
            "Model loaded from {} ({}, {} features)",
            path.display(),
            envelope.model_kind,
            envelope.feature_columns.len()
        );

        Ok(Self {
            kind: envelope.model_kind,
            model: Some(envelope.model),
            feature_columns: envelope.feature_columns,
            target_column: envelope.target_column,
            feature_config: envelope.feature_config,
            trained_at: Some(envelope.trained_at),
        })
    }
}

fn check_width(rows: &[Vec<f64>], expected: usize) -> Result<()> {
    match rows.iter().find(|r| r.len() != expected) {
        Some(row) => Err(ForecastError::FeatureMismatch {
            expected,
            actual: row.len(),
        }),
        None => Ok(()),
    }
}

fn to_values(row: &[f64]) -> Vec<ValueType> {
    row.iter().map(|v| *v as ValueType).collect()
}

fn fit_forest(train: &TrainingSet) -> Result<Forest> {
    let params = RandomForestRegressorParameters::default()
        .with_n_trees(100)
        .with_max_depth(20)
        .with_min_samples_split(5)
        .with_min_samples_leaf(2)
        .with_seed(SEED);

    let x = DenseMatrix::from_2d_vec(&train.x);
    RandomForestRegressor::fit(&x, &train.y, params).map_err(|e| ForecastError::Backend(e.to_string()))
}

fn fit_boosting(train: &TrainingSet) -> GBDT {
    let mut cfg = GbdtConfig::new();
    cfg.set_feature_size(train.feature_columns.len());
    cfg.set_max_depth(6);
    cfg.set_iterations(100);
    cfg.set_shrinkage(0.1);
    cfg.set_loss("SquaredError");
    cfg.set_feature_sample_ratio(0.8);
    // tiny sets would sample to zero rows
    cfg.set_data_sample_ratio(if train.len() >= 10 { 0.8 } else { 1.0 });
    cfg.set_debug(false);

    let mut data: DataVec = train
        .x
        .iter()
        .zip(&train.y)
        .map(|(row, y)| Data::new_training_data(to_values(row), 1.0, *y as ValueType, None))
        .collect();

    let mut gbdt = GBDT::new(&cfg);
    gbdt.fit(&mut data);
    gbdt
}

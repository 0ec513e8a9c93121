use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use parkcast_core::config::ModelConfig;

use crate::error::ForecastError;

/// Regressor family backing a [`crate::Forecaster`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    #[default]
    GradientBoosting,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoosting => "gradient_boosting",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ForecastError;

    /// `xgboost` and `lightgbm` are accepted as gradient boosting.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random_forest" => Ok(ModelKind::RandomForest),
            "gradient_boosting" | "xgboost" | "lightgbm" => Ok(ModelKind::GradientBoosting),
            _ => Err(ForecastError::UnknownModelKind(s.to_string())),
        }
    }
}

/// `{dir}/parking_forecaster_{kind}.json`
pub fn default_model_path(dir: &Path, kind: ModelKind) -> PathBuf {
    dir.join(format!("parking_forecaster_{}.json", kind.as_str()))
}

/// Explicit `MODEL_PATH`, else the default file for the configured kind.
pub fn resolve_model_path(config: &ModelConfig) -> Result<PathBuf, ForecastError> {
    match &config.path {
        Some(path) => Ok(path.clone()),
        None => Ok(default_model_path(&config.dir, config.kind.parse()?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("random_forest".parse::<ModelKind>().unwrap(), ModelKind::RandomForest);
        assert_eq!("gradient_boosting".parse::<ModelKind>().unwrap(), ModelKind::GradientBoosting);
        assert_eq!("xgboost".parse::<ModelKind>().unwrap(), ModelKind::GradientBoosting);
        assert_eq!(" LightGBM ".parse::<ModelKind>().unwrap(), ModelKind::GradientBoosting);
    }

    #[test]
    fn rejects_unknown() {
        let err = "svm".parse::<ModelKind>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown model type: svm");
    }

    #[test]
    fn alias_resolves_to_canonical_file() {
        let cfg = ModelConfig {
            dir: PathBuf::from("models"),
            kind: "xgboost".into(),
            path: None,
        };
        assert_eq!(
            resolve_model_path(&cfg).unwrap(),
            PathBuf::from("models/parking_forecaster_gradient_boosting.json")
        );

        let cfg = ModelConfig {
            path: Some(PathBuf::from("/srv/m.json")),
            kind: "bogus".into(),
            ..cfg
        };
        assert_eq!(resolve_model_path(&cfg).unwrap(), PathBuf::from("/srv/m.json"));
    }
}

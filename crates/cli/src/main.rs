mod cli;
mod terminal;

use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use parkcast_compute::FeatureConfig;
use parkcast_core::config::{load_dotenv, Config};
use parkcast_forecast::{resolve_model_path, Forecaster, ModelKind, PredictionReport, TrainingRun};
use parkcast_storage::Database;

use crate::cli::{CliArgs, Command};
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    load_dotenv();
    let args = CliArgs::parse();
    let mut config = Config::from_env();
    if let Some(db) = args.db {
        config.database.path = db;
    }

    let db = Database::open(&config.database.path, config.database.max_connections)
        .await
        .with_context(|| format!("failed to open database {}", config.database.path.display()))?;

    match args.command {
        Command::Train {
            model,
            no_save,
            output,
            extended,
        } => {
            let raw_kind = model.unwrap_or_else(|| config.model.kind.clone());
            let kind: ModelKind = raw_kind.parse()?;
            config.model.kind = kind.as_str().to_string();

            let feature_config = if extended {
                FeatureConfig::extended()
            } else {
                FeatureConfig::from(&config.features)
            };

            let save_to: Option<PathBuf> = if no_save {
                None
            } else {
                Some(match output {
                    Some(path) => path,
                    None => resolve_model_path(&config.model)?,
                })
            };

            info!("Training {} model", kind);
            let (_, report) = TrainingRun::new(kind, feature_config)
                .execute(&db, save_to.as_deref())
                .await
                .context("training failed")?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                Terminal::new(io::stdout().lock()).print_training_report(&report)?;
            }
        }
        Command::Predict { model, lot_id } => {
            let path = match model {
                Some(path) => path,
                None => resolve_model_path(&config.model)?,
            };
            if !path.exists() {
                bail!(
                    "model file {} not found; run `parkcast train` first",
                    path.display()
                );
            }

            let forecaster = Forecaster::load(&path)
                .with_context(|| format!("failed to load model {}", path.display()))?;
            info!(
                "Loaded {} model with {} features from {}",
                forecaster.kind(),
                forecaster.feature_columns().len(),
                path.display()
            );

            let lot_id = lot_id.filter(|id| !id.is_empty());
            let report = PredictionReport::build(&db, &forecaster, lot_id.as_deref())
                .await
                .context("prediction failed")?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                Terminal::new(io::stdout().lock()).print_prediction_report(&report)?;
            }
        }
    }

    db.close().await;
    Ok(())
}

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Train and backtest parking occupancy forecasters.
///
/// Reads the SQLite history written by `ingest-worker`; database and model
/// locations default to the environment profile.
#[derive(Parser, Debug)]
#[command(name = "parkcast", version, about = "Parking occupancy forecasting")]
pub struct CliArgs {
    /// SQLite database file (overrides DATABASE_PATH)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Print reports as JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train a model on every stored reading and report its metrics
    Train {
        /// Model type: random_forest or gradient_boosting (defaults to MODEL_KIND)
        #[arg(long)]
        model: Option<String>,

        /// Skip writing the trained model to disk
        #[arg(long)]
        no_save: bool,

        /// Where to write the model (defaults to MODEL_PATH or the model directory)
        #[arg(long, conflicts_with = "no_save")]
        output: Option<PathBuf>,

        /// Use the long lag and rolling-window set (1-24 readings)
        #[arg(long)]
        extended: bool,
    },

    /// Backtest a saved model against stored readings
    Predict {
        /// Model file (defaults to MODEL_PATH or the model directory)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Restrict the report to one lot
        #[arg(long)]
        lot_id: Option<String>,
    },
}

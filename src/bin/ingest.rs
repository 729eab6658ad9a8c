//! Load a CSV export into the file-backed store and optionally retrain

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use load_forecaster::config::{Config, LogFormat};
use load_forecaster::controller::ForecastService;
use load_forecaster::domain::Cadence;
use load_forecaster::repo::{FileRepository, Repositories};
use load_forecaster::telemetry;

#[derive(Debug, Parser)]
#[command(name = "lf-ingest", about = "Import load observations from CSV")]
struct Args {
    /// CSV file with Timestamp and Load columns
    #[arg(long)]
    csv: PathBuf,

    /// Data directory of the file store (defaults to storage.data_dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Retrain both cadences after the import
    #[arg(long)]
    train: bool,

    /// Configuration file
    #[arg(long, default_value = load_forecaster::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Human-readable logs instead of JSON
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let cfg = Config::load_from(&args.config)?;
    telemetry::init_tracing(if args.pretty {
        LogFormat::Pretty
    } else {
        cfg.log.format
    });

    let file = std::fs::File::open(&args.csv)
        .with_context(|| format!("opening {}", args.csv.display()))?;

    let data_dir = args.data_dir.unwrap_or_else(|| cfg.storage.data_dir.clone());
    let repo = Arc::new(FileRepository::open(&data_dir).await?);
    let service = ForecastService::new(cfg, Repositories::shared(repo));

    let stored = service.import_csv(file).await?;
    info!(stored, data_dir = %data_dir.display(), "import finished");

    if args.train {
        for cadence in Cadence::ALL {
            match service.train(cadence).await {
                Ok(report) => info!(
                    %cadence,
                    model_id = %report.model_id,
                    samples = report.samples,
                    rmse = report.metrics.rmse,
                    "model trained"
                ),
                Err(e) => warn!(%cadence, error = %e, "training skipped"),
            }
        }
    }

    Ok(())
}

use anyhow::Result;
use clap::Parser;
use common::{
    client::GeckoTerminalClient,
    config::BackfillConfig,
    orchestrator::{run_batch, TokenResult},
};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "backfill", about = "Backfill GeckoTerminal OHLCV history into CSV files")]
struct Args {
    /// JSON file listing the pools and request parameters
    #[arg(short, long)]
    config: PathBuf,

    /// Overrides `output_dir` from the config file
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let mut config = BackfillConfig::from_file(&args.config)?;
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    let settings = config.resolve(chrono::Utc::now())?;
    info!(
        "Backfilling {} tokens on {} ({} x{}, limit {}) into {}",
        settings.tokens.len(),
        settings.backfill.params.network,
        settings.backfill.params.timeframe,
        settings.backfill.params.aggregate,
        settings.backfill.params.limit,
        settings.output_dir.display()
    );

    let client = GeckoTerminalClient::new(&settings.base_url, settings.request_timeout)?;
    let report = run_batch(&settings, &client).await;

    for outcome in &report.outcomes {
        match &outcome.result {
            TokenResult::Saved { path, rows, pages } => info!(
                "{}: {} rows from {} pages -> {}",
                outcome.name,
                rows,
                pages,
                path.display()
            ),
            TokenResult::Failed(reason) => error!("{}: {}", outcome.name, reason),
        }
    }

    if report.succeeded() == 0 {
        anyhow::bail!("All {} tokens failed", report.failed());
    }
    Ok(())
}

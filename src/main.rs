//! Gift Courier - CLI entry point
//!
//! Runs the transfer pipeline directly: interactive gift selection by
//! default, directed selection with `--gift-id`, or a read-only JSON gift
//! listing with `--list-gifts` (stdout stays machine-readable; all logging
//! goes to stderr and the Run's log file).

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use gift_courier::{
    AppConfig, DirectedSelector, PromptSelector, RunLog, TransferPipeline,
};
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "gift_courier", version, about = "Automated star and gift transfer tool")]
struct Cli {
    /// Path to a JSON configuration file overriding the environment
    #[arg(long)]
    config: Option<PathBuf>,

    /// Transfer this owned gift id instead of prompting for a selection
    #[arg(long)]
    gift_id: Option<String>,

    /// Print the owned gift list as JSON and exit without transferring
    #[arg(long)]
    list_gifts: bool,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Logging goes to stderr so --list-gifts can own stdout
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    let log = RunLog::create(std::path::Path::new(&config.log_dir))?;
    let cancel = CancellationToken::new();
    let config = Arc::new(config);
    let pipeline = TransferPipeline::new(config.clone(), log.clone(), cancel.clone())?;

    if cli.list_gifts {
        let gifts = pipeline.list_gifts().await?;
        println!("{}", serde_json::to_string_pretty(&gifts)?);
        return Ok(());
    }

    eprintln!("=== Gift Courier v{} ===", env!("CARGO_PKG_VERSION"));
    eprintln!("Bot token: {}", config.masked_token());
    eprintln!();

    let outcome = if let Some(gift_id) = cli.gift_id {
        let mut selector = DirectedSelector::new(gift_id);
        tokio::select! {
            result = pipeline.run(&mut selector) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        }
    } else {
        let mut selector = PromptSelector::stdin();
        tokio::select! {
            result = pipeline.run(&mut selector) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        }
    };

    match outcome {
        Some(result) => {
            result?;
            Ok(())
        }
        None => {
            cancel.cancel();
            log.warn("Operation cancelled by user");
            Ok(())
        }
    }
}

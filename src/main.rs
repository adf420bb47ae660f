use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use tradeflux::engine::simulator::{self, ProgressSink};
use tradeflux::engine::types::{StepStatistics, Trade};
use tradeflux::market_data;
use tradeflux::market_data::adapters::BitcoinchartsAdapter;
use tradeflux::market_data::rates::{HttpRateSource, RateResolver};
use tradeflux::{store, telemetry};

const REFRESH_PROGRESS_EVERY_N_CYCLES: usize = 1000;
const MAXIMUM_PROMPTS: u32 = 3;

#[derive(Parser)]
#[command(name = "tradeflux", about = "Market energy-flow simulation over historical trade data")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download trade history for every listed market into a database folder
    Fetch {
        #[arg(long, default_value = "database")]
        folder: PathBuf,
    },
    /// Run the agent simulation over a market file or a whole database folder
    Simulate {
        /// Market file (single series) or database folder (normalized merge);
        /// prompted for interactively when omitted
        #[arg(long)]
        database: Option<PathBuf>,
        /// Minimum fractional profit an agent wants before selling
        #[arg(long, default_value_t = 0.05)]
        greed: f64,
        /// Write the full response sequence as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Prints a progress line with the latest accuracy snapshot every
/// [`REFRESH_PROGRESS_EVERY_N_CYCLES`] steps.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn report(&mut self, processed: usize, total: usize, statistics: &StepStatistics) {
        if processed % REFRESH_PROGRESS_EVERY_N_CYCLES == 0 {
            let progress_percent = processed as f64 / total as f64 * 100.0;
            println!(
                "{progress_percent:.5}%, global positives = {:.5}, global negatives = {:.5}, local positives = {:.5}, local negatives = {:.5}",
                statistics.global.global_relative_positives,
                statistics.global.global_relative_negatives,
                statistics.local.local_relative_positives,
                statistics.local.local_relative_negatives,
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env
    telemetry::init_tracing("tradeflux=info");

    let cli = Cli::parse();
    match cli.command {
        Command::Fetch { folder } => fetch(&folder).await,
        Command::Simulate { database, greed, output } => {
            simulate(database, greed, output.as_deref()).await
        }
    }
}

async fn fetch(folder: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(folder)
        .with_context(|| format!("cannot create database folder {}", folder.display()))?;

    BitcoinchartsAdapter::new().build_database(folder).await?;
    println!("Database saved to {}", folder.display());
    Ok(())
}

async fn simulate(
    database: Option<PathBuf>,
    greed: f64,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let path = match database {
        Some(path) => path,
        None => prompt_for_database()?,
    };

    let trades = load_trade_stream(&path).await?;
    println!("Simulating {} trades with greed {greed}", trades.len());

    let responses = simulator::simulate(&trades, greed, &mut ConsoleProgress)?;

    if let Some(last) = responses.last() {
        println!(
            "Done: {} steps, global positives = {:.5}, global negatives = {:.5}",
            responses.len(),
            last.statistics.global.global_relative_positives,
            last.statistics.global.global_relative_negatives,
        );
    } else {
        println!("Not enough trades to simulate anything");
    }

    if let Some(output) = output {
        let file = File::create(output)
            .with_context(|| format!("cannot create output file {}", output.display()))?;
        serde_json::to_writer(BufWriter::new(file), &responses)?;
        println!("Responses written to {}", output.display());
    }

    Ok(())
}

/// A folder goes through the full normalize-and-merge pipeline; a single
/// market file is taken as one already-normalized series.
async fn load_trade_stream(path: &Path) -> anyhow::Result<Vec<Trade>> {
    if path.is_dir() {
        let files = store::list_market_files(path)?;
        let mut resolver = RateResolver::new(HttpRateSource::new());
        return market_data::build_stream(&files, &mut resolver).await;
    }

    let market_file = store::market_and_currency(path)?;
    let raw = store::load_market_trades(path)?;
    Ok(raw
        .into_iter()
        .map(|t| Trade {
            timestamp: t.timestamp,
            price: t.price,
            volume: t.volume,
            market: market_file.market.clone(),
        })
        .collect())
}

/// Ask for a database path on stdin. A mistyped path gets a bounded number of
/// re-prompts before giving up.
fn prompt_for_database() -> anyhow::Result<PathBuf> {
    for _ in 0..MAXIMUM_PROMPTS {
        print!("Path to market data you wish to simulate: ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let path = PathBuf::from(input.trim());

        if path.exists() {
            return Ok(path);
        }
        println!("No such file or folder: {}", path.display());
    }

    anyhow::bail!("no readable database path provided")
}

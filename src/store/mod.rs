// On-disk JSON database of per-market trade files.
pub mod types;
pub use types::*;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::market_data::RawTrade;

/// Currencies whose markets are excluded from simulation databases. These are
/// virtual units with no FX rate against the base currency.
pub const VIRTUAL_CURRENCIES: [&str; 3] = ["LTC", "SLL", "WMZ"];

/// Market name and currency derived from a trade file path. The market name
/// is the file stem; the currency is its last three characters (aggregator
/// symbols end in the quote currency, e.g. `mtgoxEUR`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketFile {
    pub market: String,
    pub currency: String,
}

pub fn market_and_currency(path: &Path) -> StoreResult<MarketFile> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| StoreError::BadFileName { path: path.to_path_buf() })?;

    let currency = stem
        .len()
        .checked_sub(3)
        .and_then(|at| stem.get(at..))
        .ok_or_else(|| StoreError::BadFileName { path: path.to_path_buf() })?;

    Ok(MarketFile {
        market: stem.to_string(),
        currency: currency.to_string(),
    })
}

/// Serialize a market's trades to JSON. An empty trade list is not worth a
/// file and is skipped with a warning.
pub fn save_market_trades(path: &Path, trades: &[RawTrade]) -> StoreResult<()> {
    if trades.is_empty() {
        warn!(path = %path.display(), "no data in container, file will not be saved");
        return Ok(());
    }

    info!(path = %path.display(), trades = trades.len(), "saving market data");
    let file = File::create(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer(BufWriter::new(file), trades).map_err(|source| StoreError::Format {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

pub fn load_market_trades(path: &Path) -> StoreResult<Vec<RawTrade>> {
    debug!(path = %path.display(), "loading market data");
    let file = File::open(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Format {
        path: path.to_path_buf(),
        source,
    })
}

/// List the trade files of a database folder, excluding virtual-currency
/// markets. Sorted for a deterministic merge order.
pub fn list_market_files(folder: &Path) -> StoreResult<Vec<PathBuf>> {
    info!(folder = %folder.display(), "listing database files");

    let entries = fs::read_dir(folder).map_err(|source| StoreError::Io {
        path: folder.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| StoreError::Io {
            path: folder.to_path_buf(),
            source,
        })?;
        let path = entry.path();

        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let market_file = market_and_currency(&path)?;
        if VIRTUAL_CURRENCIES.contains(&market_file.currency.as_str()) {
            debug!(market = %market_file.market, "excluding virtual currency market");
            continue;
        }
        files.push(path);
    }

    files.sort();
    Ok(files)
}

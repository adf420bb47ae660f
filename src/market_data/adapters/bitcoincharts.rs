// Bitcoincharts aggregator adapter with CONCRETE endpoints.
//
// The aggregator serves a JSON index of every market it tracks and the full
// trade history per market as CSV lines of `timestamp,price,amount`.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::market_data::RawTrade;
use crate::store;

/// Pause between per-market downloads so the server's rate limiting never
/// kicks in.
pub const PAUSE_BETWEEN_DOWNLOADS: Duration = Duration::from_secs(3);

pub struct BitcoinchartsAdapter {
    client: reqwest::Client,
    pub markets_url: String, // "http://api.bitcoincharts.com/v1/markets.json"
    pub trades_url: String,  // "http://api.bitcoincharts.com/v1/trades.csv"
}

#[derive(Debug, Deserialize)]
struct MarketInfo {
    symbol: String,
}

impl BitcoinchartsAdapter {
    pub fn new() -> Self {
        Self::with_urls(
            "http://api.bitcoincharts.com/v1/markets.json",
            "http://api.bitcoincharts.com/v1/trades.csv",
        )
    }

    pub fn with_urls(markets_url: impl Into<String>, trades_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            markets_url: markets_url.into(),
            trades_url: trades_url.into(),
        }
    }

    /// Retrieve the symbols of all markets the aggregator tracks.
    pub async fn fetch_markets(&self) -> anyhow::Result<Vec<String>> {
        info!(url = %self.markets_url, "retrieving available markets");

        let markets: Vec<MarketInfo> = self
            .client
            .get(&self.markets_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("malformed markets index")?;

        Ok(markets.into_iter().map(|m| m.symbol).collect())
    }

    /// Download a market's full trade history, from the beginning of the
    /// market's existence.
    pub async fn fetch_trades(&self, market: &str) -> anyhow::Result<Vec<RawTrade>> {
        info!(market, "retrieving trade data");

        let body = self
            .client
            .get(&self.trades_url)
            .query(&[("symbol", market), ("start", "0")])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_trades_csv(&body).with_context(|| format!("malformed trade data for {market}"))
    }

    /// Download trade history for every listed market into `folder`, one
    /// JSON file per market.
    pub async fn build_database(&self, folder: &Path) -> anyhow::Result<()> {
        let markets = self.fetch_markets().await?;
        self.download_markets(folder, &markets).await
    }

    /// Download the given markets one by one. A market whose download fails
    /// is logged and skipped so one flaky endpoint cannot sink the whole
    /// build; markets without trades are skipped by the store. Disk errors
    /// still abort.
    pub async fn download_markets(&self, folder: &Path, markets: &[String]) -> anyhow::Result<()> {
        info!(markets = markets.len(), "building database");

        for market in markets {
            println!("Retrieving data for market: {market}");
            match self.fetch_trades(market).await {
                Ok(trades) => {
                    debug!(market, trades = trades.len(), "downloaded market history");
                    let file_path = folder.join(format!("{market}.json"));
                    store::save_market_trades(&file_path, &trades)?;
                }
                Err(err) => {
                    warn!(market, error = %err, "failed to download market history, skipping");
                }
            }

            // don't get banned by the server
            tokio::time::sleep(PAUSE_BETWEEN_DOWNLOADS).await;
        }

        Ok(())
    }
}

impl Default for BitcoinchartsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the aggregator's trades CSV body. Blank lines are skipped; any
/// malformed record fails the whole download.
pub fn parse_trades_csv(body: &str) -> anyhow::Result<Vec<RawTrade>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut trades = Vec::new();
    for record in reader.deserialize::<(i64, f64, f64)>() {
        let (timestamp, price, volume) = record?;
        trades.push(RawTrade { timestamp, price, volume });
    }

    Ok(trades)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trades_csv() {
        let body = "1340234323,5.407670000000,0.990600000000\n1340236726,5.407670000000,3.000000000000\n";
        let trades = parse_trades_csv(body).unwrap();
        assert_eq!(
            trades,
            vec![
                RawTrade { timestamp: 1340234323, price: 5.40767, volume: 0.9906 },
                RawTrade { timestamp: 1340236726, price: 5.40767, volume: 3.0 },
            ]
        );
    }

    #[test]
    fn test_parse_empty_body() {
        assert!(parse_trades_csv("").unwrap().is_empty());
        assert!(parse_trades_csv("\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed_record() {
        assert!(parse_trades_csv("1340234323,not-a-price,1.0\n").is_err());
        assert!(parse_trades_csv("1340234323,5.4\n").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_market_is_skipped() {
        // Port 1 refuses the connection outright, so every per-market fetch
        // fails. The build must finish anyway, writing nothing.
        let adapter = BitcoinchartsAdapter::with_urls(
            "http://127.0.0.1:1/markets.json",
            "http://127.0.0.1:1/trades.csv",
        );
        let dir = tempfile::tempdir().unwrap();
        let markets = vec!["mtgoxUSD".to_string(), "bitstampEUR".to_string()];

        adapter.download_markets(dir.path(), &markets).await.unwrap();

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

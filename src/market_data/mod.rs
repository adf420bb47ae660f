// Market data module entrypoint
pub mod adapters;   // aggregator-specific fetchers (bitcoincharts)
pub mod merge;      // binary-heap k-way merge of per-market series
pub mod normaliser; // converts foreign-currency prices to the base currency
pub mod rates;      // cached exchange-rate resolution with bounded retries

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::types::Trade;
use crate::market_data::rates::{RateResolver, RateSource};
use crate::store;

/// One trade as parsed off the wire or loaded from a market file, before
/// normalization and market tagging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawTrade {
    pub timestamp: i64,
    pub price: f64,
    pub volume: f64,
}

/// A market's trade list tagged with its market name.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSeries {
    pub market: String,
    pub trades: Vec<RawTrade>,
}

/// Load every market file, normalize its prices to the base currency and
/// merge everything into one time-ordered stream.
///
/// Markets whose currency cannot be resolved are excluded and the run
/// continues; each distinct currency is resolved at most once.
pub async fn build_stream<S: RateSource>(
    files: &[PathBuf],
    resolver: &mut RateResolver<S>,
) -> anyhow::Result<Vec<Trade>> {
    let mut series = Vec::with_capacity(files.len());

    for path in files {
        let market_file = store::market_and_currency(path)?;
        info!(market = %market_file.market, "processing market file");

        let exchange_rate = resolver.resolve(&market_file.currency).await;
        if exchange_rate == 0.0 {
            warn!(market = %market_file.market, currency = %market_file.currency,
                "no valid exchange rate, market excluded from the merge");
            continue;
        }

        let trades = store::load_market_trades(path)?;
        series.push(MarketSeries {
            market: market_file.market,
            trades: normaliser::normalise(trades, exchange_rate),
        });
    }

    Ok(merge::merge_series(&series))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::rates::RateQuote;
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::tempdir;

    /// A rate source whose upstream is down: every lookup fails outright.
    struct DeadRateSource;

    #[async_trait]
    impl RateSource for DeadRateSource {
        async fn fetch_rate(&self, currency: &str) -> anyhow::Result<RateQuote> {
            anyhow::bail!("connection refused while converting {currency}")
        }
    }

    fn write_market(folder: &Path, market: &str, trades: &[(i64, f64, f64)]) -> PathBuf {
        let path = folder.join(format!("{market}.json"));
        let trades: Vec<RawTrade> = trades
            .iter()
            .map(|&(timestamp, price, volume)| RawTrade { timestamp, price, volume })
            .collect();
        store::save_market_trades(&path, &trades).unwrap();
        path
    }

    #[tokio::test]
    async fn test_unresolvable_market_is_dropped_from_merged_stream() {
        let dir = tempdir().unwrap();
        let usd = write_market(dir.path(), "mtgoxUSD", &[(1, 10.0, 1.0), (3, 11.0, 2.0)]);
        let eur = write_market(dir.path(), "bitstampEUR", &[(2, 8.0, 1.5)]);

        // USD needs no lookup, EUR hits the dead source and resolves to 0.0
        let mut resolver = RateResolver::new(DeadRateSource);
        let merged = build_stream(&[usd, eur], &mut resolver).await.unwrap();

        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|trade| trade.market == "mtgoxUSD"));
        let timestamps: Vec<i64> = merged.iter().map(|trade| trade.timestamp).collect();
        assert_eq!(timestamps, vec![1, 3]);
    }
}

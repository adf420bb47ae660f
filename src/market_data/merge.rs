use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::debug;

use crate::engine::types::Trade;
use crate::market_data::{MarketSeries, RawTrade};

/// Entry in the merge heap. The key is `(timestamp, source index)` so the
/// ordering never has to compare float fields; reverse comparison turns
/// `BinaryHeap` into a min-heap.
struct MergeEntry {
    key: (i64, usize),
    source: usize,
    trade: RawTrade,
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for MergeEntry {}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        other.key.cmp(&self.key)
    }
}

/// K-way merge of per-market trade series into one stream ascending by
/// timestamp, each trade tagged with its originating market.
///
/// The heap holds one head per non-exhausted source: prime with the first
/// trade of each series, then pop the minimum and refill from the source it
/// came from. Timestamp ties resolve by source index, so the merge is
/// deterministic and each source's own order is preserved.
pub fn merge_series(series: &[MarketSeries]) -> Vec<Trade> {
    let mut heap: BinaryHeap<MergeEntry> = BinaryHeap::with_capacity(series.len());
    let mut cursors = vec![0usize; series.len()];

    for (source, market) in series.iter().enumerate() {
        if let Some(&trade) = market.trades.first() {
            heap.push(MergeEntry {
                key: (trade.timestamp, source),
                source,
                trade,
            });
            cursors[source] = 1;
        }
    }

    let total: usize = series.iter().map(|s| s.trades.len()).sum();
    let mut merged = Vec::with_capacity(total);

    while let Some(entry) = heap.pop() {
        let source = entry.source;
        merged.push(Trade {
            timestamp: entry.trade.timestamp,
            price: entry.trade.price,
            volume: entry.trade.volume,
            market: series[source].market.clone(),
        });

        if let Some(&next) = series[source].trades.get(cursors[source]) {
            heap.push(MergeEntry {
                key: (next.timestamp, source),
                source,
                trade: next,
            });
            cursors[source] += 1;
        }
    }

    debug!(sources = series.len(), trades = merged.len(), "merged market streams");
    merged
}

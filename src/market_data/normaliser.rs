use tracing::debug;

use crate::market_data::RawTrade;

/// Rescale a market's prices into the base currency. The caller owns the
/// returned list; timestamps and volumes pass through untouched.
pub fn normalise(mut trades: Vec<RawTrade>, exchange_rate: f64) -> Vec<RawTrade> {
    debug!(trades = trades.len(), exchange_rate, "normalising market data");

    for trade in &mut trades {
        trade.price *= exchange_rate;
    }

    trades
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prices_scaled_by_rate() {
        let trades = vec![
            RawTrade { timestamp: 1, price: 4.0, volume: 2.0 },
            RawTrade { timestamp: 2, price: 5.5, volume: 1.0 },
        ];
        let normalised = normalise(trades, 1.25);
        assert_eq!(normalised[0].price, 5.0);
        assert_eq!(normalised[1].price, 6.875);
        // everything else is untouched
        assert_eq!(normalised[0].timestamp, 1);
        assert_eq!(normalised[1].volume, 1.0);
    }

    #[test]
    fn test_unit_rate_is_identity() {
        let trades = vec![RawTrade { timestamp: 1, price: 4.0, volume: 2.0 }];
        assert_eq!(normalise(trades.clone(), 1.0), trades);
    }
}

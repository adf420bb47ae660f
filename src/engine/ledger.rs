use ordered_float::OrderedFloat;
use tracing::{debug, trace, warn};

use crate::engine::types::{LedgerError, Lot, FEE};

/// Residual tolerance when observed volume drains the ledger completely.
/// Absorbs accumulated float error; anything above it is a model violation.
pub const VOLUME_EPSILON: f64 = 0.001;

/// Inventory of simulated "bought" positions, kept ascending by price.
///
/// A buy is recognised when a trade does not precede a price drop; a sell
/// consumes lots cheapest-first. One mutable ledger lives for a whole
/// simulation run.
#[derive(Debug, Default)]
pub struct LotLedger {
    lots: Vec<Lot>,
}

impl LotLedger {
    pub fn new() -> Self {
        Self { lots: Vec::new() }
    }

    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    /// Record a buy event when the current trade price holds or rises into the
    /// next trade. The lot is inserted at its price position so the ledger
    /// stays sorted without re-sorting the whole sequence.
    pub fn record_buy(&mut self, trade_price: f64, future_trade_price: f64, volume: f64) {
        if trade_price <= future_trade_price {
            let at = self
                .lots
                .partition_point(|lot| OrderedFloat(lot.price) <= OrderedFloat(trade_price));
            self.lots.insert(at, Lot { price: trade_price, volume });
            debug!(price = trade_price, volume, position = at, "recorded buy event");
        }
    }

    /// Cumulative volume the simulated agents would sell at `current_price`.
    ///
    /// An agent holding a lot sells once the price covers the bought price, a
    /// `greed` fraction of profit and the fees on both sides of the round
    /// trip. Lots are price-ascending, so the first unprofitable lot ends the
    /// scan: every costlier lot is unprofitable too.
    pub fn forecast_sellable(&self, current_price: f64, greed: f64) -> f64 {
        let mut forecasted_sold_volume = 0.0;

        for lot in &self.lots {
            let margin = lot.price * greed;
            let fee = current_price * FEE + lot.price * FEE;
            let anticipated_target = lot.price + margin + fee;
            trace!(anticipated_target, bought = lot.price, "evaluating lot");

            if anticipated_target <= current_price {
                forecasted_sold_volume += lot.volume;
            } else {
                break;
            }
        }

        forecasted_sold_volume
    }

    /// Absorb externally observed sold volume into the ledger, consuming lots
    /// cheapest-first. A lot reduced to exactly zero is removed.
    ///
    /// If the ledger empties while more than [`VOLUME_EPSILON`] remains
    /// unabsorbed, more volume left the system than the model ever put into
    /// it, which is fatal for the run.
    pub fn reconcile(&mut self, observed_volume: f64) -> Result<(), LedgerError> {
        let mut remaining = observed_volume;

        loop {
            let Some(front) = self.lots.first().copied() else {
                break;
            };

            let leftover = front.volume - remaining;
            trace!(leftover, "absorbing observed volume");

            if leftover == 0.0 {
                self.lots.remove(0);
                break;
            } else if leftover > 0.0 {
                self.lots[0].volume = leftover;
                break;
            } else {
                remaining -= front.volume;
                self.lots.remove(0);

                if self.lots.is_empty() && (remaining - VOLUME_EPSILON) > 0.0 {
                    warn!(residual = remaining, "observed volume outran the modelled inventory");
                    return Err(LedgerError::UnabsorbedVolume { residual: remaining });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ledger_with(lots: &[(f64, f64)]) -> LotLedger {
        let mut ledger = LotLedger::new();
        for &(price, volume) in lots {
            // future price above the trade price so every buy is recorded
            ledger.record_buy(price, price + 1.0, volume);
        }
        ledger
    }

    #[test]
    fn test_buy_recorded_only_when_price_holds_or_rises() {
        let mut ledger = LotLedger::new();
        ledger.record_buy(10.0, 12.0, 5.0);
        assert_eq!(ledger.lots(), &[Lot { price: 10.0, volume: 5.0 }]);

        // falling price is not a buy
        ledger.record_buy(11.0, 9.0, 3.0);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_lots_insert_in_price_order() {
        let ledger = ledger_with(&[(5.0, 1.0), (2.0, 1.0), (9.0, 1.0), (2.0, 2.0)]);
        let prices: Vec<f64> = ledger.lots().iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![2.0, 2.0, 5.0, 9.0]);
        // equal prices keep arrival order
        assert_eq!(ledger.lots()[0].volume, 1.0);
        assert_eq!(ledger.lots()[1].volume, 2.0);
    }

    #[test]
    fn test_forecast_unprofitable_lot_counts_nothing() {
        // target = 10 + 10*0.01 + (10.2 + 10)*0.0065 = 10.2326 > 10.2
        let ledger = ledger_with(&[(10.0, 5.0)]);
        assert_eq!(ledger.forecast_sellable(10.2, 0.01), 0.0);
    }

    #[test]
    fn test_forecast_counts_whole_profitable_lots() {
        let ledger = ledger_with(&[(10.0, 5.0), (11.0, 2.0)]);
        // 10.4 clears the 10.0 lot (target 10.2326) but not the 11.0 one
        let sellable = ledger.forecast_sellable(10.4, 0.01);
        assert_eq!(sellable, 5.0);
    }

    #[test]
    fn test_forecast_stops_at_first_failing_lot() {
        let ledger = ledger_with(&[(1.0, 1.0), (50.0, 100.0), (2.0, 3.0)]);
        // only the 1.0 and 2.0 lots are profitable at 4.0; the scan never
        // reaches past the 50.0 lot once it fails
        let sellable = ledger.forecast_sellable(4.0, 0.01);
        assert_eq!(sellable, 4.0);
    }

    #[test]
    fn test_reconcile_zero_is_noop() {
        let mut ledger = ledger_with(&[(3.0, 2.0), (5.0, 1.0)]);
        let before = ledger.lots().to_vec();
        ledger.reconcile(0.0).unwrap();
        assert_eq!(ledger.lots(), before.as_slice());
    }

    #[test]
    fn test_reconcile_exact_volume_removes_lot() {
        let mut ledger = ledger_with(&[(3.0, 2.0), (5.0, 1.0)]);
        ledger.reconcile(2.0).unwrap();
        assert_eq!(ledger.lots(), &[Lot { price: 5.0, volume: 1.0 }]);
    }

    #[test]
    fn test_reconcile_partial_volume_shrinks_cheapest_lot() {
        let mut ledger = ledger_with(&[(3.0, 2.0), (5.0, 1.0)]);
        ledger.reconcile(0.5).unwrap();
        assert_eq!(ledger.lots()[0], Lot { price: 3.0, volume: 1.5 });
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_reconcile_spans_lots() {
        let mut ledger = ledger_with(&[(3.0, 2.0), (5.0, 1.0), (7.0, 4.0)]);
        ledger.reconcile(3.5).unwrap();
        assert_eq!(ledger.lots(), &[Lot { price: 7.0, volume: 3.5 }]);
    }

    #[test]
    fn test_reconcile_large_residual_is_fatal() {
        let mut ledger = ledger_with(&[(3.0, 2.0)]);
        let err = ledger.reconcile(2.002).unwrap_err();
        match err {
            LedgerError::UnabsorbedVolume { residual } => {
                assert!((residual - 0.002).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_reconcile_tiny_residual_is_tolerated() {
        let mut ledger = ledger_with(&[(3.0, 2.0)]);
        ledger.reconcile(2.0005).unwrap();
        assert!(ledger.is_empty());
    }

    proptest! {
        #[test]
        fn prop_lots_stay_sorted(buys in proptest::collection::vec((0.01f64..1000.0, 0.01f64..100.0), 0..64)) {
            let mut ledger = LotLedger::new();
            for (price, volume) in buys {
                ledger.record_buy(price, price, volume);
                prop_assert!(ledger
                    .lots()
                    .windows(2)
                    .all(|pair| pair[0].price <= pair[1].price));
            }
        }

        #[test]
        fn prop_forecast_monotone_in_price(
            buys in proptest::collection::vec((0.01f64..1000.0, 0.01f64..100.0), 0..32),
            lo in 0.01f64..2000.0,
            bump in 0.0f64..500.0,
        ) {
            let mut ledger = LotLedger::new();
            for (price, volume) in buys {
                ledger.record_buy(price, price, volume);
            }
            let at_lo = ledger.forecast_sellable(lo, 0.05);
            let at_hi = ledger.forecast_sellable(lo + bump, 0.05);
            prop_assert!(at_hi >= at_lo);
        }

        #[test]
        fn prop_reconcile_never_leaves_empty_lots(
            buys in proptest::collection::vec((0.01f64..100.0, 0.01f64..10.0), 1..32),
            sold in 0.0f64..50.0,
        ) {
            let mut ledger = LotLedger::new();
            for (price, volume) in buys {
                ledger.record_buy(price, price, volume);
            }
            if ledger.reconcile(sold).is_ok() {
                prop_assert!(ledger.lots().iter().all(|lot| lot.volume > 0.0));
            }
        }
    }
}

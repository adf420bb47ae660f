use tracing::{debug, info};

use crate::engine::accuracy;
use crate::engine::ledger::LotLedger;
use crate::engine::types::{
    ConfusionCounters, Forecast, LedgerError, StepResponse, StepStatistics, Trade,
};

/// Receives a progress report after every processed step. Fire-and-forget.
pub trait ProgressSink {
    fn report(&mut self, processed: usize, total: usize, statistics: &StepStatistics);
}

/// Sink for callers that do not care about progress.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&mut self, _processed: usize, _total: usize, _statistics: &StepStatistics) {}
}

/// Evaluate the agents' sell decisions for one step.
///
/// The forecast is what the ledger says could be sold profitably right now.
/// On a strictly falling price the externally observed volume is compared
/// against it: any excess came from outside the modelled system; a shortfall
/// means agents really sold out of our inventory, so the ledger absorbs the
/// observed volume and `vol_from_outer_sys` reports the -1.0 sentinel.
pub fn evaluate_sell(
    ledger: &mut LotLedger,
    trade_price: f64,
    future_trade_price: f64,
    traded_amount: f64,
    greed: f64,
) -> Result<Forecast, LedgerError> {
    let forecasted_sell_volume = ledger.forecast_sellable(trade_price, greed);
    debug!(forecasted_sell_volume, "forecasted energy flow");

    let number_of_buy_events = ledger.len();

    // sample the four cheapest open lots for offline analysis
    let mut margins = [0.0; 4];
    let mut margin_volumes = [0.0; 4];
    if number_of_buy_events >= 4 {
        for (i, lot) in ledger.lots()[..4].iter().enumerate() {
            margins[i] = trade_price / lot.price;
            margin_volumes[i] = lot.volume;
        }
    }

    let mut vol_from_outer_sys = 0.0;

    // energy flowing in can only come from outside; only the out-flow is
    // reconciled against the inventory
    if trade_price > future_trade_price {
        vol_from_outer_sys = traded_amount - forecasted_sell_volume;

        if vol_from_outer_sys < 0.0 {
            vol_from_outer_sys = -1.0;
            ledger.reconcile(traded_amount)?;
        }
    }

    Ok(Forecast {
        forecasted_sell_volume,
        number_of_buy_events,
        margins,
        margin_volumes,
        vol_from_outer_sys,
    })
}

/// Run the agent simulation over a merged trade stream.
///
/// Walks adjacent trade pairs (the terminal trade has no future price and is
/// excluded), feeding the ledger, the sell evaluation and the accuracy
/// tracking in order and appending one response per step. The counters and
/// the ledger live exactly as long as this call.
pub fn simulate(
    trades: &[Trade],
    greed: f64,
    progress: &mut dyn ProgressSink,
) -> Result<Vec<StepResponse>, LedgerError> {
    info!(trades = trades.len(), greed, "simulating agent reactions");

    let total = trades.len();
    let mut ledger = LotLedger::new();
    let mut counters = ConfusionCounters::default();
    let mut responses: Vec<StepResponse> = Vec::with_capacity(total.saturating_sub(1));

    for pair in trades.windows(2) {
        let trade_price = pair[0].price;
        let traded_amount = pair[0].volume;
        let future_trade_price = pair[1].price;

        ledger.record_buy(trade_price, future_trade_price, traded_amount);

        let forecast = evaluate_sell(
            &mut ledger,
            trade_price,
            future_trade_price,
            traded_amount,
            greed,
        )?;

        // trade price of the response appended on the previous step
        let previous_price = responses.last().map(|r| r.trade_price).unwrap_or(0.0);

        let global = accuracy::global_statistics(
            trade_price,
            future_trade_price,
            forecast.forecasted_sell_volume,
            previous_price,
            &mut counters,
        );
        let local = accuracy::local_statistics(&responses);
        let statistics = StepStatistics { global, local };

        responses.push(StepResponse {
            trade_price,
            forecast,
            statistics,
        });

        progress.report(responses.len(), total, &statistics);
    }

    info!(
        steps = responses.len(),
        classified = counters.total(),
        "simulation finished"
    );

    Ok(responses)
}

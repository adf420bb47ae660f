use serde::{Deserialize, Serialize};

/// Average market transaction fee, charged once per side of a round trip.
pub const FEE: f64 = 0.0065;

/// One trade in the merged, USD-normalized stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: i64,
    pub price: f64,
    pub volume: f64,
    pub market: String,
}

// Open purchase position awaiting a matching sell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub price: f64,
    pub volume: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Observed sold volume outran the modelled inventory. The residual is the
    /// volume left unabsorbed after the last lot was consumed.
    #[error("sold volume exceeds the modelled inventory, {residual} left with no lots to absorb it")]
    UnabsorbedVolume { residual: f64 },
}

/// Per-step output of the sell-decision evaluation.
///
/// `margins`/`margin_volumes` sample the four cheapest open lots (current price
/// relative to each bought price, and each lot's volume) for offline analysis;
/// all zeros when fewer than four lots are open. `vol_from_outer_sys` is the
/// traded volume not explained by the ledger, or -1.0 when the forecast
/// over-predicted and no exogenous inflow is implied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub forecasted_sell_volume: f64,
    pub number_of_buy_events: usize,
    pub margins: [f64; 4],
    pub margin_volumes: [f64; 4],
    pub vol_from_outer_sys: f64,
}

/// Four-way prediction tally. Owned by one simulation run, never shared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounters {
    pub true_positive: u64,
    pub true_negative: u64,
    pub false_positive: u64,
    pub false_negative: u64,
}

impl ConfusionCounters {
    pub fn total(&self) -> u64 {
        self.true_positive + self.true_negative + self.false_positive + self.false_negative
    }
}

/// Whole-run accuracy after this step. The `predicted_*` fields carry the
/// step's classification signal: +1 correct, -1 wrong, 0 no prediction of
/// that kind this step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub predicted_energy_in: i8,
    pub predicted_energy_out: i8,
    pub global_relative_positives: f64,
    pub global_relative_negatives: f64,
}

/// Accuracy over the trailing response window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalStats {
    pub local_relative_positives: f64,
    pub local_relative_negatives: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepStatistics {
    pub global: GlobalStats,
    pub local: LocalStats,
}

/// One entry of the simulation output, appended per processed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResponse {
    pub trade_price: f64,
    pub forecast: Forecast,
    pub statistics: StepStatistics,
}

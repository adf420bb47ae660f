use tracing::debug;

use crate::engine::types::{ConfusionCounters, GlobalStats, LocalStats, StepResponse};

/// Window size for the trailing local statistics.
pub const WINDOW_SIZE: usize = 1000;

/// Classify one step's prediction against the next observed price move and
/// fold it into the whole-run counters.
///
/// A forecasted sell volume below the previous step's trade price is read as
/// "no sale, energy stays in" and is a true positive when the price holds or
/// rises. Otherwise the model predicts a sale and is a true negative when the
/// price falls. Exactly one counter is bumped per call.
pub fn global_statistics(
    trade_price: f64,
    future_trade_price: f64,
    forecasted_volume: f64,
    previous_price: f64,
    counters: &mut ConfusionCounters,
) -> GlobalStats {
    let mut predicted_energy_in = 0i8;
    let mut predicted_energy_out = 0i8;

    if forecasted_volume < previous_price {
        if trade_price <= future_trade_price {
            predicted_energy_in = 1;
            counters.true_positive += 1;
        } else {
            predicted_energy_in = -1;
            counters.false_positive += 1;
        }
    } else if trade_price > future_trade_price {
        predicted_energy_out = 1;
        counters.true_negative += 1;
    } else {
        predicted_energy_out = -1;
        counters.false_negative += 1;
    }

    let no_pos = counters.true_positive + counters.false_positive;
    let no_neg = counters.true_negative + counters.false_negative;

    let global_relative_positives = if no_pos > 0 {
        counters.true_positive as f64 / no_pos as f64
    } else {
        0.0
    };
    let global_relative_negatives = if no_neg > 0 {
        counters.true_negative as f64 / no_neg as f64
    } else {
        0.0
    };

    debug!(
        predicted_energy_in,
        predicted_energy_out, global_relative_positives, global_relative_negatives,
        "classified step"
    );

    GlobalStats {
        predicted_energy_in,
        predicted_energy_out,
        global_relative_positives,
        global_relative_negatives,
    }
}

/// Recompute the accuracy rates over the last `min(WINDOW_SIZE, len)`
/// responses, reading back the per-step classification signals.
///
/// The positive denominator is deliberately `tp + tp`, not `tp + fp`: any
/// window holding at least one true positive reports exactly 0.5 regardless
/// of the false-positive count. Consumers calibrate against runs produced
/// with this arithmetic, so it is preserved verbatim.
pub fn local_statistics(responses: &[StepResponse]) -> LocalStats {
    let window = responses.len().min(WINDOW_SIZE);
    let start = responses.len() - window;

    let mut local_true_positives = 0u64;
    let mut local_false_positives = 0u64;
    let mut local_true_negatives = 0u64;
    let mut local_false_negatives = 0u64;

    for response in &responses[start..] {
        match response.statistics.global.predicted_energy_in {
            1 => local_true_positives += 1,
            -1 => local_false_positives += 1,
            _ => {}
        }
        match response.statistics.global.predicted_energy_out {
            1 => local_true_negatives += 1,
            -1 => local_false_negatives += 1,
            _ => {}
        }
    }

    debug!(
        local_true_positives,
        local_false_positives, local_true_negatives, local_false_negatives, "windowed tallies"
    );

    let local_no_pos = local_true_positives + local_true_positives;
    let local_no_neg = local_true_negatives + local_false_negatives;

    let local_relative_positives = if local_no_pos > 0 {
        local_true_positives as f64 / local_no_pos as f64
    } else {
        0.0
    };
    let local_relative_negatives = if local_no_neg > 0 {
        local_true_negatives as f64 / local_no_neg as f64
    } else {
        0.0
    };

    LocalStats {
        local_relative_positives,
        local_relative_negatives,
    }
}

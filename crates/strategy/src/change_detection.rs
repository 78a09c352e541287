use common::models::Signal;

/// Entry-zone midpoint moves at or below this magnitude (in percent) are noise.
pub const ENTRY_MOVE_THRESHOLD_PCT: f64 = 0.01;

/// Decides whether `next` carries information worth alerting on compared to
/// `previous`. Both are expected to share the same symbol and timeframe.
///
/// A side flip always counts. The entry midpoint must move strictly more than
/// [`ENTRY_MOVE_THRESHOLD_PCT`]; when the previous midpoint is not positive the
/// move is not evaluated at all. Stop loss and take profit are compared exactly.
pub fn signal_changed(previous: &Signal, next: &Signal) -> bool {
    if previous.side != next.side {
        return true;
    }

    if let Some(pct) = entry_move_pct(previous, next) {
        if pct < -ENTRY_MOVE_THRESHOLD_PCT || pct > ENTRY_MOVE_THRESHOLD_PCT {
            return true;
        }
    }

    previous.stop_loss != next.stop_loss || previous.take_profit != next.take_profit
}

/// Percent move of the entry midpoint, `None` when the previous midpoint is
/// not positive.
pub fn entry_move_pct(previous: &Signal, next: &Signal) -> Option<f64> {
    let mid_prev = previous.entry_mid();
    if mid_prev <= 0.0 {
        return None;
    }
    let mid_next = next.entry_mid();
    Some((mid_next - mid_prev) / mid_prev * 100.0)
}

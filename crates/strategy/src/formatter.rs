use common::models::Signal;

/// Renders the alert text sent through the notification channel.
pub fn format_signal_message(signal: &Signal) -> String {
    let mut msg = format!(
        "📊 SMC Alert!\nSymbol: {}\nTimeframe: {}\nSide: {}\nEntry: {:.4}-{:.4}\nSL: {:.4}\nTP: {:.4}",
        signal.symbol,
        signal.timeframe,
        signal.side,
        signal.entry_low,
        signal.entry_high,
        signal.stop_loss,
        signal.take_profit,
    );

    if let Some(rr) = risk_reward(signal) {
        msg.push_str(&format!("\nR:R 1:{:.2}", rr));
    }
    msg
}

/// Reward over risk measured from the entry midpoint. `None` when there is no risk.
pub fn risk_reward(signal: &Signal) -> Option<f64> {
    let entry = signal.entry_mid();
    let risk = (entry - signal.stop_loss).abs();
    if risk == 0.0 {
        return None;
    }
    Some((signal.take_profit - entry).abs() / risk)
}

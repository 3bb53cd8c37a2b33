use crate::models::candle::Candle;

/// Candles needed: 4 bearish, 1 doji, 1 breakout
pub const MIN_CANDLES: usize = 6;
/// Length of the bearish run preceding the doji
pub const BEARISH_RUN: usize = 4;
/// Max body/range ratio for the indecision candle (exclusive)
pub const DOJI_BODY_RATIO: f64 = 0.1;
/// Take-profit multipliers applied to the breakout close
pub const TARGET_MULTIPLIERS: [f64; 3] = [1.03, 1.05, 1.08];
/// Stop-loss multiplier applied to the doji low
pub const STOP_LOSS_MULTIPLIER: f64 = 0.99;
pub const TREND_LABEL: &str = "bullish-breakout";

/// Match fields produced by [`detect`]; the caller stamps symbol, timeframe and time.
#[derive(Debug, Clone, PartialEq)]
pub struct ReversalSignal {
    pub price: f64,
    pub volume: f64,
    pub trend_label: &'static str,
    pub targets: [String; 3],
    pub stop_loss: String,
}

/// Detect four bearish candles, a doji, then a bullish candle breaking the doji high.
///
/// Only the last six candles matter: `[n-6, n-3)` must all be bearish, `n-2` must be a
/// doji and `n-1` the breakout. Pure; has no memory of earlier matches.
pub fn detect(candles: &[Candle]) -> Option<ReversalSignal> {
    let n = candles.len();
    if n < MIN_CANDLES {
        return None;
    }

    let run = &candles[n - MIN_CANDLES..n - 2];
    debug_assert_eq!(run.len(), BEARISH_RUN);
    if !run.iter().all(Candle::is_bearish) {
        return None;
    }

    let doji = &candles[n - 2];
    if !is_doji(doji) {
        return None;
    }

    let breakout = &candles[n - 1];
    if !breakout.is_bullish() || breakout.high <= doji.high {
        return None;
    }

    let price = breakout.close;
    Some(ReversalSignal {
        price,
        volume: breakout.volume,
        trend_label: TREND_LABEL,
        targets: calculate_targets(price),
        stop_loss: calculate_stop_loss(doji.low),
    })
}

/// Body under 10% of the range. A zero-range candle is never a doji.
pub fn is_doji(candle: &Candle) -> bool {
    let range = candle.range();
    if range <= 0.0 {
        return false;
    }
    candle.body() / range < DOJI_BODY_RATIO
}

pub fn calculate_targets(price: f64) -> [String; 3] {
    TARGET_MULTIPLIERS.map(|m| format_level(price * m))
}

pub fn calculate_stop_loss(doji_low: f64) -> String {
    format_level(doji_low * STOP_LOSS_MULTIPLIER)
}

fn format_level(value: f64) -> String {
    format!("{:.8}", value)
}

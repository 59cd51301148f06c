// =============================================================================
// Momentum Indicators
// =============================================================================
//
// RSI, Stochastic, ROC, KAMA, TSI, Ultimate Oscillator, PPO/PVO, Williams %R,
// StochRSI and the Awesome Oscillator.
//
// Numeric conventions follow the python `ta` package so results can be checked
// against it directly. Where `ta` would emit +/-inf or silently fill, each
// function documents the sentinel it returns instead.
// =============================================================================

use super::rolling::{
    ema, ewm, rolling_max, rolling_mean, rolling_min, rolling_sum, sma, true_range, wilder_alpha,
    NAN,
};
use super::SpreadLines;

// ---- RSI --------------------------------------------------------------------

/// Gain / loss split of the one-bar price change. Index 0 has no previous
/// close and contributes zero to both sides.
pub fn gains_losses(close: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut up = Vec::with_capacity(close.len());
    let mut down = Vec::with_capacity(close.len());
    for i in 0..close.len() {
        let (g, l) = if i == 0 { (0.0, 0.0) } else { split_change(close[i] - close[i - 1]) };
        up.push(g);
        down.push(l);
    }
    (up, down)
}

/// `(gain, loss)` for one price change; NaN changes count as neither.
pub fn split_change(delta: f64) -> (f64, f64) {
    let gain = if delta > 0.0 { delta } else { 0.0 };
    let loss = if delta < 0.0 { -delta } else { 0.0 };
    (gain, loss)
}

/// RSI from smoothed gain / loss. A zero average loss reads as 100.
pub fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Relative Strength Index. Gains and losses are smoothed with an EWM of
/// alpha `1 / window`; the first defined value sits at `window - 1`.
pub fn rsi(close: &[f64], window: usize) -> Vec<f64> {
    if window == 0 {
        return vec![NAN; close.len()];
    }
    let (up, down) = gains_losses(close);
    let alpha = wilder_alpha(window);
    let avg_up = ewm(&up, alpha, window);
    let avg_down = ewm(&down, alpha, window);
    avg_up
        .iter()
        .zip(&avg_down)
        .map(|(&g, &l)| if g.is_nan() || l.is_nan() { NAN } else { rsi_value(g, l) })
        .collect()
}

// ---- Stochastic ---------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StochOutput {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

/// %K position of `close` inside `[lowest, highest]`; 0 when the range is flat.
pub fn stoch_k_value(close: f64, lowest: f64, highest: f64) -> f64 {
    let range = highest - lowest;
    if range == 0.0 {
        0.0
    } else {
        100.0 * (close - lowest) / range
    }
}

pub fn stoch(high: &[f64], low: &[f64], close: &[f64], window: usize, smooth: usize) -> StochOutput {
    let lowest = rolling_min(low, window, window);
    let highest = rolling_max(high, window, window);
    let k: Vec<f64> = (0..close.len())
        .map(|i| {
            if lowest[i].is_nan() || highest[i].is_nan() {
                NAN
            } else {
                stoch_k_value(close[i], lowest[i], highest[i])
            }
        })
        .collect();
    let d = sma(&k, smooth);
    StochOutput { k, d }
}

// ---- ROC ---------------------------------------------------------------------

/// Rate of change in percent over `window` bars. A zero base price yields 0.
pub fn roc(close: &[f64], window: usize) -> Vec<f64> {
    (0..close.len())
        .map(|i| {
            if i < window || window == 0 {
                return NAN;
            }
            let base = close[i - window];
            if base == 0.0 {
                0.0
            } else {
                (close[i] - base) / base * 100.0
            }
        })
        .collect()
}

// ---- KAMA --------------------------------------------------------------------

/// Kaufman adaptive moving average.
///
/// NaN until the efficiency ratio `|c[i] - c[i-w]| / sum(|c[k] - c[k-1]|)`
/// (0 when the denominator is 0) is defined at `window`, where the close
/// seeds the average. Smoothing starts at `window + 1`.
pub fn kama(close: &[f64], window: usize, pow1: usize, pow2: usize) -> Vec<f64> {
    let n = close.len();
    let mut out = vec![NAN; n];
    if window == 0 || n <= window {
        return out;
    }
    let fast = 2.0 / (pow1 as f64 + 1.0);
    let slow = 2.0 / (pow2 as f64 + 1.0);

    let volatility: Vec<f64> = (0..n)
        .map(|i| if i == 0 { NAN } else { (close[i] - close[i - 1]).abs() })
        .collect();
    let denominators = rolling_sum(&volatility, window, window);

    let mut prev = close[window];
    out[window] = prev;
    for i in window + 1..n {
        let numerator = (close[i] - close[i - window]).abs();
        let den = denominators[i];
        let er = if den == 0.0 { 0.0 } else { numerator / den };
        let sc = (er * (fast - slow) + slow).powi(2);
        prev += sc * (close[i] - prev);
        out[i] = prev;
    }
    out
}

// ---- TSI ---------------------------------------------------------------------

/// True strength index: double-smoothed price change over double-smoothed
/// absolute change, in percent. Flat input (zero denominator) yields 0.
pub fn tsi(close: &[f64], slow: usize, fast: usize) -> Vec<f64> {
    let change: Vec<f64> = (0..close.len())
        .map(|i| if i == 0 { NAN } else { close[i] - close[i - 1] })
        .collect();
    let abs_change: Vec<f64> = change.iter().map(|d| d.abs()).collect();

    let smoothed = ema(&ema(&change, slow), fast);
    let smoothed_abs = ema(&ema(&abs_change, slow), fast);
    smoothed
        .iter()
        .zip(&smoothed_abs)
        .map(|(&s, &a)| {
            if s.is_nan() || a.is_nan() {
                NAN
            } else if a == 0.0 {
                0.0
            } else {
                s / a * 100.0
            }
        })
        .collect()
}

// ---- Ultimate Oscillator -------------------------------------------------------

#[allow(clippy::too_many_arguments)]
pub fn ultimate_oscillator(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    short: usize,
    medium: usize,
    long: usize,
    weight_short: f64,
    weight_medium: f64,
    weight_long: f64,
) -> Vec<f64> {
    let n = close.len();
    let tr = true_range(high, low, close);
    // Buying pressure needs the previous close, so index 0 is missing.
    let pressure: Vec<f64> = (0..n)
        .map(|i| if i == 0 { NAN } else { close[i] - low[i].min(close[i - 1]) })
        .collect();

    let average = |window: usize| -> Vec<f64> {
        let bp = rolling_sum(&pressure, window, window);
        let trs = rolling_sum(&tr, window, window);
        bp.iter()
            .zip(&trs)
            .map(|(&b, &t)| if b.is_nan() || t.is_nan() || t == 0.0 { NAN } else { b / t })
            .collect::<Vec<f64>>()
    };
    let avg_s = average(short);
    let avg_m = average(medium);
    let avg_l = average(long);
    let total = weight_short + weight_medium + weight_long;

    (0..n)
        .map(|i| {
            100.0 * (weight_short * avg_s[i] + weight_medium * avg_m[i] + weight_long * avg_l[i])
                / total
        })
        .collect()
}

// ---- PPO / PVO -----------------------------------------------------------------

/// Percentage spread of two EMAs; 0 when the slow EMA is 0.
pub fn percentage_spread(fast: f64, slow: f64) -> f64 {
    if slow == 0.0 {
        0.0
    } else {
        (fast - slow) / slow * 100.0
    }
}

fn percentage_oscillator(values: &[f64], slow: usize, fast: usize, signal: usize) -> SpreadLines {
    let ema_fast = ema(values, fast);
    let ema_slow = ema(values, slow);
    let line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(&f, &s)| if f.is_nan() || s.is_nan() { NAN } else { percentage_spread(f, s) })
        .collect();
    SpreadLines::from_line(line, signal)
}

/// Percentage price oscillator.
pub fn ppo(close: &[f64], slow: usize, fast: usize, signal: usize) -> SpreadLines {
    percentage_oscillator(close, slow, fast, signal)
}

/// Percentage volume oscillator.
pub fn pvo(volume: &[f64], slow: usize, fast: usize, signal: usize) -> SpreadLines {
    percentage_oscillator(volume, slow, fast, signal)
}

// ---- Williams %R ---------------------------------------------------------------

/// Williams %R in [-100, 0]; NaN when the lookback range is flat.
pub fn williams_r(high: &[f64], low: &[f64], close: &[f64], window: usize) -> Vec<f64> {
    let highest = rolling_max(high, window, window);
    let lowest = rolling_min(low, window, window);
    (0..close.len())
        .map(|i| {
            let range = highest[i] - lowest[i];
            if range.is_nan() || range == 0.0 {
                NAN
            } else {
                -100.0 * (highest[i] - close[i]) / range
            }
        })
        .collect()
}

// ---- StochRSI ------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StochRsiOutput {
    pub stoch_rsi: Vec<f64>,
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

/// Stochastic of RSI as a 0..1 fraction, with %K / %D smoothing. A flat RSI
/// range yields 0.
pub fn stoch_rsi(close: &[f64], window: usize, smooth1: usize, smooth2: usize) -> StochRsiOutput {
    let rsi_line = rsi(close, window);
    let lowest = rolling_min(&rsi_line, window, window);
    let highest = rolling_max(&rsi_line, window, window);
    let stoch_rsi: Vec<f64> = (0..close.len())
        .map(|i| {
            let range = highest[i] - lowest[i];
            if range.is_nan() {
                NAN
            } else if range == 0.0 {
                0.0
            } else {
                (rsi_line[i] - lowest[i]) / range
            }
        })
        .collect();
    let k = sma(&stoch_rsi, smooth1);
    let d = sma(&k, smooth2);
    StochRsiOutput { stoch_rsi, k, d }
}

// ---- Awesome Oscillator -------------------------------------------------------

/// SMA(short) - SMA(long) of the median price.
pub fn awesome_oscillator(high: &[f64], low: &[f64], short: usize, long: usize) -> Vec<f64> {
    let median: Vec<f64> = high.iter().zip(low).map(|(h, l)| 0.5 * (h + l)).collect();
    let fast = rolling_mean(&median, short, short);
    let slow = rolling_mean(&median, long, long);
    fast.iter().zip(&slow).map(|(f, s)| f - s).collect()
}

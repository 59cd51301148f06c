// =============================================================================
// Volume Indicators
// =============================================================================
//
// OBV, Accumulation/Distribution, Chaikin Money Flow, Force Index, Ease of
// Movement, Volume-Price Trend, Money Flow Index, Negative Volume Index,
// rolling VWAP and the Chaikin Oscillator.
//
// Zero-denominator sentinels differ per indicator and are part of each
// function's contract:
//   CMF            -> 0    (no volume in the window)
//   A/D close loc. -> 0    (flat bar)
//   EoM            -> NaN  (zero-volume bar)
//   MFI            -> 100 when there is no negative flow, NaN when no flow
//   VWAP           -> NaN  (no volume in the window)
// =============================================================================

use super::rolling::{ema, rolling_mean, rolling_sum, NAN};

/// Close location value: where the close sits inside the bar, in [-1, 1].
fn close_location(high: f64, low: f64, close: f64) -> f64 {
    let range = high - low;
    if range == 0.0 {
        0.0
    } else {
        ((close - low) - (high - close)) / range
    }
}

/// On-balance volume. A close below the previous one subtracts the bar's
/// volume; anything else (including the first bar) adds it.
pub fn obv(close: &[f64], volume: &[f64]) -> Vec<f64> {
    let mut total = 0.0;
    (0..close.len())
        .map(|i| {
            if i > 0 && close[i] < close[i - 1] {
                total -= volume[i];
            } else {
                total += volume[i];
            }
            total
        })
        .collect()
}

/// Accumulation / distribution line.
pub fn acc_dist(high: &[f64], low: &[f64], close: &[f64], volume: &[f64]) -> Vec<f64> {
    let mut total = 0.0;
    (0..close.len())
        .map(|i| {
            total += close_location(high[i], low[i], close[i]) * volume[i];
            total
        })
        .collect()
}

/// Chaikin money flow.
pub fn cmf(high: &[f64], low: &[f64], close: &[f64], volume: &[f64], window: usize) -> Vec<f64> {
    let flow: Vec<f64> = (0..close.len())
        .map(|i| close_location(high[i], low[i], close[i]) * volume[i])
        .collect();
    let flow_sum = rolling_sum(&flow, window, window);
    let volume_sum = rolling_sum(volume, window, window);
    flow_sum
        .iter()
        .zip(&volume_sum)
        .map(|(&f, &v)| if f.is_nan() || v.is_nan() { NAN } else if v == 0.0 { 0.0 } else { f / v })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ForceIndexOutput {
    /// `(close - prev_close) * volume`.
    pub raw: Vec<f64>,
    /// EMA of the raw series.
    pub smoothed: Vec<f64>,
}

pub fn force_index(close: &[f64], volume: &[f64], window: usize) -> ForceIndexOutput {
    let raw: Vec<f64> = (0..close.len())
        .map(|i| if i == 0 { NAN } else { (close[i] - close[i - 1]) * volume[i] })
        .collect();
    let smoothed = ema(&raw, window);
    ForceIndexOutput { raw, smoothed }
}

#[derive(Debug, Clone)]
pub struct EaseOfMovementOutput {
    pub eom: Vec<f64>,
    pub sma: Vec<f64>,
}

/// Ease of movement, scaled by 1e8, plus its SMA.
pub fn ease_of_movement(high: &[f64], low: &[f64], volume: &[f64], window: usize) -> EaseOfMovementOutput {
    let eom: Vec<f64> = (0..high.len())
        .map(|i| {
            if i == 0 || volume[i] == 0.0 {
                return NAN;
            }
            let distance = (high[i] - high[i - 1]) + (low[i] - low[i - 1]);
            distance * (high[i] - low[i]) / (2.0 * volume[i]) * 100_000_000.0
        })
        .collect();
    let sma = rolling_mean(&eom, window, window);
    EaseOfMovementOutput { eom, sma }
}

/// Cumulative volume-price trend starting at 0, optionally SMA-smoothed.
pub fn volume_price_trend(close: &[f64], volume: &[f64], smoothing: Option<usize>) -> Vec<f64> {
    let mut total = 0.0;
    let line: Vec<f64> = (0..close.len())
        .map(|i| {
            if i > 0 && close[i - 1] != 0.0 {
                total += volume[i] * (close[i] - close[i - 1]) / close[i - 1];
            }
            total
        })
        .collect();
    match smoothing {
        Some(window) => rolling_mean(&line, window, window),
        None => line,
    }
}

/// Money flow index.
///
/// Raw flow is signed by the typical-price direction (flat bars and the
/// first bar carry 0). 100 when the window has no negative flow; NaN when
/// it has no flow at all.
pub fn mfi(high: &[f64], low: &[f64], close: &[f64], volume: &[f64], window: usize) -> Vec<f64> {
    let n = close.len();
    let tp: Vec<f64> = (0..n).map(|i| (high[i] + low[i] + close[i]) / 3.0).collect();
    let mut positive = vec![0.0; n];
    let mut negative = vec![0.0; n];
    for i in 1..n {
        let flow = tp[i] * volume[i];
        if tp[i] > tp[i - 1] {
            positive[i] = flow;
        } else if tp[i] < tp[i - 1] {
            negative[i] = flow;
        }
    }
    let pos_sum = rolling_sum(&positive, window, window);
    let neg_sum = rolling_sum(&negative, window, window);
    (0..n)
        .map(|i| {
            let (p, m) = (pos_sum[i], neg_sum[i]);
            if p.is_nan() || m.is_nan() {
                NAN
            } else if m == 0.0 {
                if p == 0.0 {
                    NAN
                } else {
                    100.0
                }
            } else {
                100.0 - 100.0 / (1.0 + p / m)
            }
        })
        .collect()
}

/// Negative volume index. Starts at 1000 and compounds the price change only
/// on bars where volume strictly decreased.
pub fn nvi(close: &[f64], volume: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(close.len());
    let mut value = 1000.0;
    for i in 0..close.len() {
        if i > 0 && volume[i] < volume[i - 1] && close[i - 1] != 0.0 {
            value *= 1.0 + (close[i] - close[i - 1]) / close[i - 1];
        }
        out.push(value);
    }
    out
}

/// Rolling volume-weighted typical price.
pub fn vwap(high: &[f64], low: &[f64], close: &[f64], volume: &[f64], window: usize) -> Vec<f64> {
    let n = close.len();
    let pv: Vec<f64> = (0..n)
        .map(|i| (high[i] + low[i] + close[i]) / 3.0 * volume[i])
        .collect();
    let pv_sum = rolling_sum(&pv, window, window);
    let volume_sum = rolling_sum(volume, window, window);
    pv_sum
        .iter()
        .zip(&volume_sum)
        .map(|(&p, &v)| if v == 0.0 { NAN } else { p / v })
        .collect()
}

/// EMA(fast) - EMA(slow) of the accumulation / distribution line.
pub fn chaikin_oscillator(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    volume: &[f64],
    fast: usize,
    slow: usize,
) -> Vec<f64> {
    let ad = acc_dist(high, low, close, volume);
    let f = ema(&ad, fast);
    let s = ema(&ad, slow);
    f.iter().zip(&s).map(|(a, b)| a - b).collect()
}

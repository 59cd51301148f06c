// =============================================================================
// Volatility Indicators
// =============================================================================
//
// Bollinger Bands, ATR, Keltner Channel, Donchian Channel and Ulcer Index.
//
// ATR uses Wilder's smoothing seeded with the plain average of the first
// `window` true ranges. The first bar's true range is just high - low, so the
// first ATR value lands on index `window - 1`.
// =============================================================================

use super::rolling::{
    ema, rolling_max, rolling_mean, rolling_min, rolling_std, rolling_sum, shift, true_range,
    wilder, NAN,
};

/// Band position of `close` in `[lower, upper]`; NaN when the band is flat.
fn percent_b(close: f64, lower: f64, upper: f64) -> f64 {
    let width = upper - lower;
    if width == 0.0 {
        NAN
    } else {
        (close - lower) / width
    }
}

/// Band width relative to the middle line, in percent; NaN on a zero middle.
fn width_pct(lower: f64, upper: f64, middle: f64) -> f64 {
    if middle == 0.0 {
        NAN
    } else {
        (upper - lower) / middle * 100.0
    }
}

/// 1.0 / 0.0 crossing flag, NaN while the band is undefined.
fn flag(defined: f64, hit: bool) -> f64 {
    if defined.is_nan() {
        NAN
    } else if hit {
        1.0
    } else {
        0.0
    }
}

// ---- Bollinger Bands ----------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BollingerOutput {
    pub mavg: Vec<f64>,
    pub hband: Vec<f64>,
    pub lband: Vec<f64>,
    pub wband: Vec<f64>,
    pub pband: Vec<f64>,
    /// 1 where close is above the upper band.
    pub hband_indicator: Vec<f64>,
    /// 1 where close is below the lower band.
    pub lband_indicator: Vec<f64>,
}

/// Bollinger Bands with a population standard deviation.
pub fn bollinger(close: &[f64], window: usize, dev: f64) -> BollingerOutput {
    let n = close.len();
    let mavg = rolling_mean(close, window, window);
    let std = rolling_std(close, window);
    let hband: Vec<f64> = (0..n).map(|i| mavg[i] + dev * std[i]).collect();
    let lband: Vec<f64> = (0..n).map(|i| mavg[i] - dev * std[i]).collect();

    BollingerOutput {
        wband: (0..n).map(|i| width_pct(lband[i], hband[i], mavg[i])).collect(),
        pband: (0..n).map(|i| percent_b(close[i], lband[i], hband[i])).collect(),
        hband_indicator: (0..n).map(|i| flag(hband[i], close[i] > hband[i])).collect(),
        lband_indicator: (0..n).map(|i| flag(lband[i], close[i] < lband[i])).collect(),
        mavg,
        hband,
        lband,
    }
}

// ---- ATR --------------------------------------------------------------------

/// Average true range.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], window: usize) -> Vec<f64> {
    wilder(&true_range(high, low, close), window)
}

// ---- Keltner Channel --------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ChannelOutput {
    pub mband: Vec<f64>,
    pub hband: Vec<f64>,
    pub lband: Vec<f64>,
    pub wband: Vec<f64>,
    pub pband: Vec<f64>,
}

/// Keltner Channel.
///
/// `original`: SMA of the typical price with bands at the SMA of
/// `(4h - 2l + c) / 3` and `(-2h + 4l + c) / 3`. Otherwise EMA(close) with
/// bands at `multiplier * ATR(atr_window)`.
pub fn keltner(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    window: usize,
    atr_window: usize,
    multiplier: f64,
    original: bool,
) -> ChannelOutput {
    let n = close.len();
    let (mband, hband, lband) = if original {
        let tp: Vec<f64> = (0..n).map(|i| (high[i] + low[i] + close[i]) / 3.0).collect();
        let upper: Vec<f64> = (0..n)
            .map(|i| (4.0 * high[i] - 2.0 * low[i] + close[i]) / 3.0)
            .collect();
        let lower: Vec<f64> = (0..n)
            .map(|i| (-2.0 * high[i] + 4.0 * low[i] + close[i]) / 3.0)
            .collect();
        (
            rolling_mean(&tp, window, window),
            rolling_mean(&upper, window, window),
            rolling_mean(&lower, window, window),
        )
    } else {
        let mid = ema(close, window);
        let range = atr(high, low, close, atr_window);
        let upper = (0..n).map(|i| mid[i] + multiplier * range[i]).collect();
        let lower = (0..n).map(|i| mid[i] - multiplier * range[i]).collect();
        (mid, upper, lower)
    };

    ChannelOutput {
        wband: (0..n).map(|i| width_pct(lband[i], hband[i], mband[i])).collect(),
        pband: (0..n).map(|i| percent_b(close[i], lband[i], hband[i])).collect(),
        mband,
        hband,
        lband,
    }
}

// ---- Donchian Channel --------------------------------------------------------

/// Donchian Channel. The width is measured against the close SMA; every
/// output is shifted forward by `offset` bars.
pub fn donchian(high: &[f64], low: &[f64], close: &[f64], window: usize, offset: usize) -> ChannelOutput {
    let n = close.len();
    let hband = rolling_max(high, window, window);
    let lband = rolling_min(low, window, window);
    let mband: Vec<f64> = (0..n).map(|i| (hband[i] - lband[i]) / 2.0 + lband[i]).collect();
    let mavg = rolling_mean(close, window, window);
    let wband: Vec<f64> = (0..n).map(|i| width_pct(lband[i], hband[i], mavg[i])).collect();
    let pband: Vec<f64> = (0..n).map(|i| percent_b(close[i], lband[i], hband[i])).collect();

    let lag = offset as isize;
    ChannelOutput {
        mband: shift(&mband, lag),
        hband: shift(&hband, lag),
        lband: shift(&lband, lag),
        wband: shift(&wband, lag),
        pband: shift(&pband, lag),
    }
}

// ---- Ulcer Index -------------------------------------------------------------

/// Root mean square of the percent drawdown from the running `window` high.
pub fn ulcer_index(close: &[f64], window: usize) -> Vec<f64> {
    let running_max = rolling_max(close, window, 1);
    let squared: Vec<f64> = close
        .iter()
        .zip(&running_max)
        .map(|(&c, &m)| {
            if m == 0.0 {
                NAN
            } else {
                let drawdown = 100.0 * (c - m) / m;
                drawdown * drawdown
            }
        })
        .collect();
    rolling_sum(&squared, window, window)
        .into_iter()
        .map(|s| (s / window as f64).sqrt())
        .collect()
}

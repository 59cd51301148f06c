// =============================================================================
// Trend Indicators
// =============================================================================
//
// MACD, ADX/DI, CCI, TRIX, Mass Index, Ichimoku, STC, DPO, KST, Aroon,
// Vortex and Parabolic SAR. SMA / EMA / WMA come straight from `rolling`.
//
// Where `ta` fills a shifted series with the series mean (TRIX, DPO, KST) the
// shifted-in positions are NaN here instead, so warmup is never filled with a
// made-up value.
// =============================================================================

use super::rolling::{
    ema, rolling_arg_extreme, rolling_max, rolling_mean, rolling_min, rolling_sum, shift, true_range,
    Extreme, NAN,
};
use super::SpreadLines;

// ---- MACD -------------------------------------------------------------------

/// MACD line (fast EMA - slow EMA), signal EMA over the line, histogram.
pub fn macd(close: &[f64], slow: usize, fast: usize, signal: usize) -> SpreadLines {
    let ema_fast = ema(close, fast);
    let ema_slow = ema(close, slow);
    let line = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();
    SpreadLines::from_line(line, signal)
}

// ---- ADX --------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AdxOutput {
    pub adx: Vec<f64>,
    pub pos: Vec<f64>,
    pub neg: Vec<f64>,
}

/// `(+DM, -DM)` for one bar against the previous bar.
fn directional_movement(high: f64, low: f64, prev_high: f64, prev_low: f64) -> (f64, f64) {
    let up = high - prev_high;
    let down = prev_low - low;
    let pos = if up > down && up > 0.0 { up } else { 0.0 };
    let neg = if down > up && down > 0.0 { down } else { 0.0 };
    (pos, neg)
}

/// Average directional index with Wilder's running sums.
///
///   S[w]  = sum(x[1..=w])
///   S[i]  = S[i-1] - S[i-1] / w + x[i]
///   DI    = 100 * S(dm) / S(tr)          (0 when S(tr) is 0)
///   DX    = 100 * |DI+ - DI-| / (DI+ + DI-)   (0 when both are 0)
///   ADX   = mean(DX[w..=2w-1]) at 2w-1, then Wilder smoothing of DX
pub fn adx(high: &[f64], low: &[f64], close: &[f64], window: usize) -> AdxOutput {
    let n = close.len();
    let mut out = AdxOutput {
        adx: vec![NAN; n],
        pos: vec![NAN; n],
        neg: vec![NAN; n],
    };
    if window == 0 || n <= window {
        return out;
    }
    let w = window as f64;
    let tr = true_range(high, low, close);

    let mut dx = vec![NAN; n];
    let (mut s_tr, mut s_pos, mut s_neg) = (0.0, 0.0, 0.0);
    for i in 1..n {
        let (p, m) = directional_movement(high[i], low[i], high[i - 1], low[i - 1]);
        if i <= window {
            s_tr += tr[i];
            s_pos += p;
            s_neg += m;
            if i < window {
                continue;
            }
        } else {
            s_tr = s_tr - s_tr / w + tr[i];
            s_pos = s_pos - s_pos / w + p;
            s_neg = s_neg - s_neg / w + m;
        }

        let (di_pos, di_neg) = if s_tr == 0.0 {
            (0.0, 0.0)
        } else {
            (100.0 * s_pos / s_tr, 100.0 * s_neg / s_tr)
        };
        out.pos[i] = di_pos;
        out.neg[i] = di_neg;
        let di_sum = di_pos + di_neg;
        dx[i] = if di_sum == 0.0 { 0.0 } else { 100.0 * (di_pos - di_neg).abs() / di_sum };
    }

    let seed_at = 2 * window - 1;
    if n > seed_at {
        let mut value = dx[window..=seed_at].iter().sum::<f64>() / w;
        out.adx[seed_at] = value;
        for i in seed_at + 1..n {
            value = (value * (w - 1.0) + dx[i]) / w;
            out.adx[i] = value;
        }
    }
    out
}

// ---- CCI --------------------------------------------------------------------

/// Commodity channel index over the typical price, 0 when the mean absolute
/// deviation is 0.
pub fn cci(high: &[f64], low: &[f64], close: &[f64], window: usize, constant: f64) -> Vec<f64> {
    let n = close.len();
    let tp: Vec<f64> = (0..n).map(|i| (high[i] + low[i] + close[i]) / 3.0).collect();
    let mean = rolling_mean(&tp, window, window);
    (0..n)
        .map(|i| {
            if mean[i].is_nan() {
                return NAN;
            }
            let win = &tp[i + 1 - window..=i];
            let mad = win.iter().map(|x| (x - mean[i]).abs()).sum::<f64>() / window as f64;
            if mad == 0.0 {
                0.0
            } else {
                (tp[i] - mean[i]) / (constant * mad)
            }
        })
        .collect()
}

// ---- TRIX / Mass Index ------------------------------------------------------

/// One-bar percent change of a triple-smoothed EMA. Zero base yields 0.
pub fn trix(close: &[f64], window: usize) -> Vec<f64> {
    let triple = ema(&ema(&ema(close, window), window), window);
    let prev = shift(&triple, 1);
    triple
        .iter()
        .zip(&prev)
        .map(|(&cur, &base)| {
            if cur.is_nan() || base.is_nan() {
                NAN
            } else if base == 0.0 {
                0.0
            } else {
                (cur - base) / base * 100.0
            }
        })
        .collect()
}

/// Sum over `slow` bars of EMA(range) / EMA(EMA(range)).
pub fn mass_index(high: &[f64], low: &[f64], fast: usize, slow: usize) -> Vec<f64> {
    let amplitude: Vec<f64> = high.iter().zip(low).map(|(h, l)| h - l).collect();
    let single = ema(&amplitude, fast);
    let double = ema(&single, fast);
    let ratio: Vec<f64> = single
        .iter()
        .zip(&double)
        .map(|(&s, &d)| if d == 0.0 { NAN } else { s / d })
        .collect();
    rolling_sum(&ratio, slow, slow)
}

// ---- Ichimoku ---------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct IchimokuOutput {
    pub conversion: Vec<f64>,
    pub base: Vec<f64>,
    pub span_a: Vec<f64>,
    pub span_b: Vec<f64>,
    /// Spans shifted forward by `base` periods, as plotted.
    pub span_a_visual: Vec<f64>,
    pub span_b_visual: Vec<f64>,
    /// Close shifted back by `base` periods.
    pub chikou: Vec<f64>,
}

fn midpoint(high: &[f64], low: &[f64], window: usize) -> Vec<f64> {
    let hi = rolling_max(high, window, window);
    let lo = rolling_min(low, window, window);
    hi.iter().zip(&lo).map(|(h, l)| 0.5 * (h + l)).collect()
}

pub fn ichimoku(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    conversion: usize,
    base: usize,
    span: usize,
) -> IchimokuOutput {
    let conv = midpoint(high, low, conversion);
    let base_line = midpoint(high, low, base);
    let span_a: Vec<f64> = conv.iter().zip(&base_line).map(|(c, b)| 0.5 * (c + b)).collect();
    let span_b = midpoint(high, low, span);
    let lead = base as isize;
    IchimokuOutput {
        span_a_visual: shift(&span_a, lead),
        span_b_visual: shift(&span_b, lead),
        chikou: shift(close, -lead),
        conversion: conv,
        base: base_line,
        span_a,
        span_b,
    }
}

// ---- STC --------------------------------------------------------------------

fn stochastic_of(values: &[f64], window: usize) -> Vec<f64> {
    let lo = rolling_min(values, window, window);
    let hi = rolling_max(values, window, window);
    (0..values.len())
        .map(|i| {
            let range = hi[i] - lo[i];
            if range.is_nan() {
                NAN
            } else if range == 0.0 {
                0.0
            } else {
                100.0 * (values[i] - lo[i]) / range
            }
        })
        .collect()
}

/// Schaff trend cycle: a doubly smoothed stochastic of the MACD line.
pub fn stc(
    close: &[f64],
    slow: usize,
    fast: usize,
    cycle: usize,
    smooth1: usize,
    smooth2: usize,
) -> Vec<f64> {
    let ema_fast = ema(close, fast);
    let ema_slow = ema(close, slow);
    let line: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();
    let stoch_k = stochastic_of(&line, cycle);
    let stoch_d = ema(&stoch_k, smooth1);
    let stoch_kd = stochastic_of(&stoch_d, cycle);
    ema(&stoch_kd, smooth2)
}

// ---- DPO / KST --------------------------------------------------------------

/// Detrended price oscillator: close `window/2 + 1` bars back minus SMA.
pub fn dpo(close: &[f64], window: usize) -> Vec<f64> {
    let lagged = shift(close, (window / 2 + 1) as isize);
    let mean = rolling_mean(close, window, window);
    lagged.iter().zip(&mean).map(|(c, m)| c - m).collect()
}

#[derive(Debug, Clone)]
pub struct KstOutput {
    pub kst: Vec<f64>,
    pub signal: Vec<f64>,
    pub diff: Vec<f64>,
}

fn smoothed_roc(close: &[f64], roc_window: usize, sma_window: usize) -> Vec<f64> {
    let base = shift(close, roc_window as isize);
    let change: Vec<f64> = close
        .iter()
        .zip(&base)
        .map(|(&c, &b)| if b.is_nan() { NAN } else if b == 0.0 { 0.0 } else { (c - b) / b })
        .collect();
    rolling_mean(&change, sma_window, sma_window)
}

/// Know Sure Thing: weighted sum of four smoothed ROCs, plus signal.
pub fn kst(close: &[f64], rocs: [usize; 4], windows: [usize; 4], signal: usize) -> KstOutput {
    let parts: Vec<Vec<f64>> = rocs
        .iter()
        .zip(&windows)
        .map(|(&r, &w)| smoothed_roc(close, r, w))
        .collect();
    let kst: Vec<f64> = (0..close.len())
        .map(|i| 100.0 * (parts[0][i] + 2.0 * parts[1][i] + 3.0 * parts[2][i] + 4.0 * parts[3][i]))
        .collect();
    let sig = rolling_mean(&kst, signal, signal);
    let diff = kst.iter().zip(&sig).map(|(k, s)| k - s).collect();
    KstOutput { kst, signal: sig, diff }
}

// ---- Aroon / Vortex ---------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AroonOutput {
    pub up: Vec<f64>,
    pub down: Vec<f64>,
    pub indicator: Vec<f64>,
}

/// Aroon over a `window + 1` bar lookback. The position of the extreme
/// (first occurrence on ties) is scaled so that "extreme on the latest bar"
/// reads 100.
pub fn aroon(high: &[f64], low: &[f64], window: usize) -> AroonOutput {
    let scale = 100.0 / window as f64;
    let up: Vec<f64> = rolling_arg_extreme(high, window + 1, Extreme::Highest)
        .into_iter()
        .map(|pos| pos * scale)
        .collect();
    let down: Vec<f64> = rolling_arg_extreme(low, window + 1, Extreme::Lowest)
        .into_iter()
        .map(|pos| pos * scale)
        .collect();
    let indicator = up.iter().zip(&down).map(|(u, d)| u - d).collect();
    AroonOutput { up, down, indicator }
}

#[derive(Debug, Clone)]
pub struct VortexOutput {
    pub pos: Vec<f64>,
    pub neg: Vec<f64>,
    pub diff: Vec<f64>,
}

pub fn vortex(high: &[f64], low: &[f64], close: &[f64], window: usize) -> VortexOutput {
    let n = close.len();
    let tr_sum = rolling_sum(&true_range(high, low, close), window, window);
    let vm_pos: Vec<f64> = (0..n)
        .map(|i| if i == 0 { NAN } else { (high[i] - low[i - 1]).abs() })
        .collect();
    let vm_neg: Vec<f64> = (0..n)
        .map(|i| if i == 0 { NAN } else { (low[i] - high[i - 1]).abs() })
        .collect();
    let sum_pos = rolling_sum(&vm_pos, window, window);
    let sum_neg = rolling_sum(&vm_neg, window, window);

    let ratio = |sums: &[f64]| -> Vec<f64> {
        sums.iter()
            .zip(&tr_sum)
            .map(|(&s, &t)| if t == 0.0 { NAN } else { s / t })
            .collect()
    };
    let pos = ratio(&sum_pos);
    let neg = ratio(&sum_neg);
    let diff = pos.iter().zip(&neg).map(|(p, m)| p - m).collect();
    VortexOutput { pos, neg, diff }
}

// ---- Parabolic SAR ----------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PsarOutput {
    pub psar: Vec<f64>,
    /// SAR while in an uptrend, NaN otherwise.
    pub up: Vec<f64>,
    /// SAR while in a downtrend, NaN otherwise.
    pub down: Vec<f64>,
    /// 1 on the first bar of an uptrend, else 0.
    pub up_indicator: Vec<f64>,
    pub down_indicator: Vec<f64>,
}

/// Parabolic stop-and-reverse.
///
/// The first two bars carry the close. From bar 2 the scan starts in an
/// uptrend with AF = `step`:
/// - the candidate SAR moves toward the trend extreme by AF;
/// - if the bar crosses the candidate, the trend reverses, SAR jumps to the
///   old extreme and AF resets;
/// - otherwise a new extreme bumps AF by `step` (capped at `max_step`) and the
///   SAR is clamped to the bar two back, or failing that one back.
pub fn psar(high: &[f64], low: &[f64], close: &[f64], step: f64, max_step: f64) -> PsarOutput {
    let n = close.len();
    let mut sar = close.to_vec();
    let mut up = vec![NAN; n];
    let mut down = vec![NAN; n];

    if n > 0 {
        let mut up_trend = true;
        let mut af = step;
        let mut up_trend_high = high[0];
        let mut down_trend_low = low[0];

        for i in 2..n {
            let mut reversal = false;
            let max_high = high[i];
            let min_low = low[i];

            if up_trend {
                sar[i] = sar[i - 1] + af * (up_trend_high - sar[i - 1]);
                if min_low < sar[i] {
                    reversal = true;
                    sar[i] = up_trend_high;
                    down_trend_low = min_low;
                    af = step;
                } else {
                    if max_high > up_trend_high {
                        up_trend_high = max_high;
                        af = (af + step).min(max_step);
                    }
                    if low[i - 2] < sar[i] {
                        sar[i] = low[i - 2];
                    } else if low[i - 1] < sar[i] {
                        sar[i] = low[i - 1];
                    }
                }
            } else {
                sar[i] = sar[i - 1] - af * (sar[i - 1] - down_trend_low);
                if max_high > sar[i] {
                    reversal = true;
                    sar[i] = down_trend_low;
                    up_trend_high = max_high;
                    af = step;
                } else {
                    if min_low < down_trend_low {
                        down_trend_low = min_low;
                        af = (af + step).min(max_step);
                    }
                    if high[i - 2] > sar[i] {
                        sar[i] = high[i - 2];
                    } else if high[i - 1] > sar[i] {
                        sar[i] = high[i - 1];
                    }
                }
            }

            up_trend ^= reversal;
            if up_trend {
                up[i] = sar[i];
            } else {
                down[i] = sar[i];
            }
        }
    }

    let starts = |side: &[f64]| -> Vec<f64> {
        (0..n)
            .map(|i| {
                let prev_missing = i == 0 || side[i - 1].is_nan();
                if !side[i].is_nan() && prev_missing {
                    1.0
                } else {
                    0.0
                }
            })
            .collect()
    };
    PsarOutput {
        up_indicator: starts(&up),
        down_indicator: starts(&down),
        psar: sar,
        up,
        down,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn rising(n: usize) -> Vec<f64> {
        (1..=n).map(|x| x as f64).collect()
    }

    fn sine_bars(n: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let close: Vec<f64> = (0..n).map(|i| 100.0 + 10.0 * (i as f64 * 0.15).sin()).collect();
        let high = close.iter().map(|c| c + 0.5).collect();
        let low = close.iter().map(|c| c - 0.5).collect();
        (high, low, close)
    }

    #[test]
    fn macd_flat_is_zero() {
        let out = macd(&[20.0; 60], 26, 12, 9);
        assert!(out.line[24].is_nan());
        assert_eq!(out.line[25], 0.0);
        assert!(out.signal[32].is_nan());
        assert_eq!(out.hist[33], 0.0);
    }

    #[test]
    fn macd_rising_is_positive() {
        let out = macd(&rising(80), 26, 12, 9);
        assert!(out.line[79] > 0.0);
    }

    // ---- adx ------------------------------------------------------------------

    #[test]
    fn adx_warmup_indices() {
        let (h, l, c) = sine_bars(80);
        let out = adx(&h, &l, &c, 14);
        assert!(out.pos[13].is_nan());
        assert!(!out.pos[14].is_nan());
        assert!(out.adx[26].is_nan());
        assert!(!out.adx[27].is_nan());
    }

    #[test]
    fn adx_strong_uptrend() {
        let close = rising(60);
        let high: Vec<f64> = close.iter().map(|c| c + 0.5).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 0.5).collect();
        let out = adx(&high, &low, &close, 14);
        assert_eq!(out.neg[40], 0.0);
        assert!(out.pos[40] > 50.0);
        // Pure +DM: every DX is 100.
        assert!((out.adx[59] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn adx_flat_market_is_zero() {
        let flat = vec![10.0; 40];
        let out = adx(&flat, &flat, &flat, 14);
        assert_eq!(out.pos[20], 0.0);
        assert_eq!(out.adx[30], 0.0);
    }

    #[test]
    fn adx_insufficient_data() {
        let out = adx(&[1.0; 10], &[1.0; 10], &[1.0; 10], 14);
        assert!(out.adx.iter().all(|v| v.is_nan()));
    }

    // ---- cci / trix / mass -------------------------------------------------------

    #[test]
    fn cci_flat_is_zero_and_warmup() {
        let flat = vec![5.0; 30];
        let out = cci(&flat, &flat, &flat, 20, 0.015);
        assert!(out[18].is_nan());
        assert_eq!(out[19], 0.0);
    }

    #[test]
    fn cci_linear_series() {
        let c = rising(20);
        let out = cci(&c, &c, &c, 20, 0.015);
        // tp - mean = 9.5, MAD of 1..20 = 5
        assert!((out[19] - 9.5 / (0.015 * 5.0)).abs() < 1e-9);
    }

    #[test]
    fn trix_warmup() {
        let out = trix(&rising(60), 15);
        assert!(out[42].is_nan());
        assert!(out[43] > 0.0);
    }

    #[test]
    fn mass_index_constant_range() {
        let high = vec![11.0; 60];
        let low = vec![9.0; 60];
        let out = mass_index(&high, &low, 9, 25);
        // ratio defined from 16, then 25 bars of it
        assert!(out[39].is_nan());
        assert!((out[40] - 25.0).abs() < 1e-12);
    }

    // ---- ichimoku / dpo / kst --------------------------------------------------------

    #[test]
    fn ichimoku_shifts() {
        let (h, l, c) = sine_bars(120);
        let out = ichimoku(&h, &l, &c, 9, 26, 52);
        assert!(out.conversion[7].is_nan());
        assert!(!out.conversion[8].is_nan());
        assert!(out.span_b[50].is_nan());
        assert!(!out.span_b[51].is_nan());
        assert_eq!(out.span_b_visual[51 + 26], out.span_b[51]);
        assert_eq!(out.span_a_visual[60], out.span_a[34]);
        assert_eq!(out.chikou[10], c[36]);
        assert!(out.chikou[119 - 25].is_nan());
    }

    #[test]
    fn dpo_linear() {
        let out = dpo(&rising(40), 20);
        assert!(out[18].is_nan());
        // close 11 bars back minus mean of the last 20
        let i = 30;
        let expected = (i - 11 + 1) as f64 - ((i - 19 + 1)..=(i + 1)).sum::<usize>() as f64 / 20.0;
        assert!((out[i] - expected).abs() < 1e-9);
    }

    #[test]
    fn kst_warmup() {
        let out = kst(&rising(80), [10, 15, 20, 30], [10, 10, 10, 15], 9);
        assert!(out.kst[43].is_nan());
        assert!(!out.kst[44].is_nan());
        assert!(out.signal[51].is_nan());
        assert!(!out.signal[52].is_nan());
    }

    #[test]
    fn stc_flat_is_zero() {
        let out = stc(&[7.0; 150], 50, 23, 10, 3, 3);
        assert_eq!(out[149], 0.0);
    }

    // ---- aroon / vortex ---------------------------------------------------------

    #[test]
    fn aroon_rising_series() {
        let high = rising(40);
        let low = rising(40);
        let out = aroon(&high, &low, 25);
        assert!(out.up[24].is_nan());
        assert_eq!(out.up[25], 100.0);
        assert_eq!(out.down[25], 0.0);
        assert_eq!(out.indicator[30], 100.0);
    }

    #[test]
    fn vortex_warmup_and_zero_range() {
        let (h, l, c) = sine_bars(40);
        let out = vortex(&h, &l, &c, 14);
        assert!(out.pos[13].is_nan());
        assert!(!out.pos[14].is_nan());
        let flat = vec![3.0; 20];
        assert!(vortex(&flat, &flat, &flat, 14).pos[16].is_nan());
    }

    // ---- psar -------------------------------------------------------------------

    #[test]
    fn psar_first_bars_are_close() {
        let (h, l, c) = sine_bars(10);
        let out = psar(&h, &l, &c, 0.02, 0.2);
        assert_eq!(out.psar[0], c[0]);
        assert_eq!(out.psar[1], c[1]);
        assert!(out.up[1].is_nan() && out.down[1].is_nan());
    }

    #[test]
    fn psar_reversal_puts_sar_across_price() {
        let (h, l, c) = sine_bars(400);
        let out = psar(&h, &l, &c, 0.02, 0.2);
        let mut reversals = 0;
        for i in 3..400 {
            if out.down_indicator[i] == 1.0 {
                reversals += 1;
                assert!(out.psar[i] > l[i], "bar {i}: down reversal SAR below the low");
            }
            if out.up_indicator[i] == 1.0 && i > 2 {
                reversals += 1;
                assert!(out.psar[i] < h[i], "bar {i}: up reversal SAR above the high");
            }
        }
        assert!(reversals >= 4);
    }

    #[test]
    fn psar_uptrend_stays_below_lows() {
        let close = rising(30);
        let high: Vec<f64> = close.iter().map(|c| c + 0.5).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 0.5).collect();
        let out = psar(&high, &low, &close, 0.02, 0.2);
        for i in 2..30 {
            assert!(!out.up[i].is_nan());
            assert!(out.psar[i] <= low[i]);
        }
        assert_eq!(out.up_indicator[2], 1.0);
        assert_eq!(out.up_indicator[3], 0.0);
    }
}

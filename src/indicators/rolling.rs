// =============================================================================
// Rolling Primitives
// =============================================================================
//
// Windowed building blocks shared by the batch library and the streaming
// calculators. Every function takes a full slice and returns a vector of the
// same length. Positions before warmup hold NaN. Inputs are never mutated.
//
// NaN inputs are treated as missing observations: `min_periods` counts valid
// samples only, the same way pandas' rolling/ewm windows do.
// =============================================================================

use std::collections::VecDeque;

pub const NAN: f64 = f64::NAN;

/// Samples between full re-sums in `rolling_std`.
const STD_RESYNC_EVERY: usize = 512;

/// Index of the first non-NaN sample.
pub fn first_valid(values: &[f64]) -> Option<usize> {
    values.iter().position(|v| !v.is_nan())
}

/// Shift by `periods` positions. Positive periods lag the series (value at
/// `i` comes from `i - periods`); negative periods pull future values back.
pub fn shift(values: &[f64], periods: isize) -> Vec<f64> {
    let n = values.len() as isize;
    (0..n)
        .map(|i| {
            let src = i - periods;
            if (0..n).contains(&src) {
                values[src as usize]
            } else {
                NAN
            }
        })
        .collect()
}

/// `values[i] - values[i - periods]`.
pub fn diff(values: &[f64], periods: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            if i >= periods {
                values[i] - values[i - periods]
            } else {
                NAN
            }
        })
        .collect()
}

/// Standard EMA smoothing factor, `2 / (window + 1)`.
pub fn span_alpha(window: usize) -> f64 {
    2.0 / (window as f64 + 1.0)
}

/// Wilder / RSI-style smoothing factor, `1 / window`.
pub fn wilder_alpha(window: usize) -> f64 {
    1.0 / window as f64
}

// -----------------------------------------------------------------------------
// Sums and means
// -----------------------------------------------------------------------------

/// Trailing sum over `window` samples, defined once at least `min_periods`
/// valid samples are inside the window.
pub fn rolling_sum(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    rolling_accumulate(values, window, min_periods, |sum, _| sum)
}

/// Trailing mean over the valid samples inside the window.
pub fn rolling_mean(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    rolling_accumulate(values, window, min_periods, |sum, count| sum / count as f64)
}

/// Simple moving average: full windows only.
pub fn sma(values: &[f64], window: usize) -> Vec<f64> {
    rolling_mean(values, window, window)
}

fn rolling_accumulate(
    values: &[f64],
    window: usize,
    min_periods: usize,
    finish: impl Fn(f64, usize) -> f64,
) -> Vec<f64> {
    let mut out = vec![NAN; values.len()];
    if window == 0 {
        return out;
    }
    let min_periods = min_periods.max(1);
    let mut sum = 0.0;
    let mut count = 0usize;

    for (i, &v) in values.iter().enumerate() {
        if !v.is_nan() {
            sum += v;
            count += 1;
        }
        if i >= window {
            let old = values[i - window];
            if !old.is_nan() {
                sum -= old;
                count -= 1;
            }
        }
        if count == 0 {
            sum = 0.0;
        }
        if count >= min_periods {
            out[i] = finish(sum, count);
        }
    }
    out
}

// -----------------------------------------------------------------------------
// Exponential smoothing
// -----------------------------------------------------------------------------

/// Exponentially weighted mean, adjust=false:
///   s[first] = v[first]
///   s[i]     = alpha * v[i] + (1 - alpha) * s[i-1]
/// evaluated as `s + alpha * (v - s)` so a constant input stays exact.
/// Output is defined once `min_periods` valid samples have been folded in.
pub fn ewm(values: &[f64], alpha: f64, min_periods: usize) -> Vec<f64> {
    ewm_from(values, alpha, min_periods, 0)
}

/// Same recurrence as [`ewm`], but nothing before `start` is folded in.
///
/// Used for signal lines whose input has its own warmup: the signal begins
/// accumulating at the first defined input sample.
pub fn ewm_from(values: &[f64], alpha: f64, min_periods: usize, start: usize) -> Vec<f64> {
    let mut out = vec![NAN; values.len()];
    let min_periods = min_periods.max(1);
    let mut state: Option<f64> = None;
    let mut count = 0usize;

    for i in start.min(values.len())..values.len() {
        let v = values[i];
        if v.is_nan() {
            if let Some(s) = state {
                if count >= min_periods {
                    out[i] = s;
                }
            }
            continue;
        }
        let s = match state {
            None => v,
            Some(prev) => ewm_step(prev, v, alpha),
        };
        state = Some(s);
        count += 1;
        if count >= min_periods {
            out[i] = s;
        }
    }
    out
}

/// One adjust=false EWM step. Shared with the streaming calculators so both
/// paths round identically.
#[inline]
pub fn ewm_step(prev: f64, v: f64, alpha: f64) -> f64 {
    prev + alpha * (v - prev)
}

/// EMA with span `window`, defined from the `window`-th valid sample.
pub fn ema(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 {
        return vec![NAN; values.len()];
    }
    ewm(values, span_alpha(window), window)
}

/// Wilder smoothing (RMA): seeded with the plain mean of the first `window`
/// valid samples, then `r[i] = (r[i-1] * (window - 1) + v[i]) / window`.
pub fn wilder(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![NAN; values.len()];
    let Some(start) = first_valid(values) else {
        return out;
    };
    if window == 0 || values.len() < start + window {
        return out;
    }
    let w = window as f64;
    let seed_end = start + window;
    let mut r = values[start..seed_end].iter().sum::<f64>() / w;
    out[seed_end - 1] = r;
    for i in seed_end..values.len() {
        r = (r * (w - 1.0) + values[i]) / w;
        out[i] = r;
    }
    out
}

// -----------------------------------------------------------------------------
// Monotonic deque — rolling extremes
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Highest,
    Lowest,
}

/// Deque of `(index, value)` pairs holding only the samples that can still be
/// the extreme of the trailing window.
///
/// By default ties resolve to the most recent sample (a tail entry equal to
/// the incoming value is discarded). `keeping_oldest` flips that, giving
/// first-occurrence semantics for arg-extreme lookups.
#[derive(Debug, Clone)]
pub struct MonotonicDeque {
    extreme: Extreme,
    keep_oldest: bool,
    items: VecDeque<(usize, f64)>,
}

impl MonotonicDeque {
    pub fn new(extreme: Extreme) -> Self {
        Self {
            extreme,
            keep_oldest: false,
            items: VecDeque::new(),
        }
    }

    pub fn keeping_oldest(extreme: Extreme) -> Self {
        Self {
            keep_oldest: true,
            ..Self::new(extreme)
        }
    }

    pub fn push(&mut self, index: usize, value: f64) {
        while let Some(&(_, back)) = self.items.back() {
            let discard = match (self.extreme, self.keep_oldest) {
                (Extreme::Highest, false) => back <= value,
                (Extreme::Highest, true) => back < value,
                (Extreme::Lowest, false) => back >= value,
                (Extreme::Lowest, true) => back > value,
            };
            if !discard {
                break;
            }
            self.items.pop_back();
        }
        self.items.push_back((index, value));
    }

    /// Drop every entry whose index is below `oldest`.
    pub fn expire(&mut self, oldest: usize) {
        while let Some(&(idx, _)) = self.items.front() {
            if idx >= oldest {
                break;
            }
            self.items.pop_front();
        }
    }

    pub fn peek(&self) -> Option<(usize, f64)> {
        self.items.front().copied()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn rolling_extreme(values: &[f64], window: usize, min_periods: usize, extreme: Extreme) -> Vec<f64> {
    let mut out = vec![NAN; values.len()];
    if window == 0 {
        return out;
    }
    let min_periods = min_periods.max(1);
    let mut deque = MonotonicDeque::new(extreme);
    let mut valid = 0usize;

    for (i, &v) in values.iter().enumerate() {
        if i >= window && !values[i - window].is_nan() {
            valid -= 1;
        }
        deque.expire((i + 1).saturating_sub(window));
        if !v.is_nan() {
            valid += 1;
            deque.push(i, v);
        }
        if valid >= min_periods {
            if let Some((_, best)) = deque.peek() {
                out[i] = best;
            }
        }
    }
    out
}

/// Trailing maximum, amortised O(1) per sample.
pub fn rolling_max(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    rolling_extreme(values, window, min_periods, Extreme::Highest)
}

/// Trailing minimum, amortised O(1) per sample.
pub fn rolling_min(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    rolling_extreme(values, window, min_periods, Extreme::Lowest)
}

/// Position of the extreme inside each full trailing window, counted from
/// the window start (0 = oldest). Ties resolve to the oldest sample.
pub fn rolling_arg_extreme(values: &[f64], window: usize, extreme: Extreme) -> Vec<f64> {
    let mut out = vec![NAN; values.len()];
    if window == 0 {
        return out;
    }
    let mut deque = MonotonicDeque::keeping_oldest(extreme);
    let mut nan_in_window = 0usize;

    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            nan_in_window += 1;
        }
        if i >= window && values[i - window].is_nan() {
            nan_in_window -= 1;
        }
        let window_start = (i + 1).saturating_sub(window);
        deque.expire(window_start);
        if !v.is_nan() {
            deque.push(i, v);
        }
        if i + 1 >= window && nan_in_window == 0 {
            if let Some((idx, _)) = deque.peek() {
                out[i] = (idx - window_start) as f64;
            }
        }
    }
    out
}

// -----------------------------------------------------------------------------
// Dispersion & weighting
// -----------------------------------------------------------------------------

fn mean_and_m2(window: &[f64]) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let m2 = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
    (mean, m2)
}

/// Population standard deviation (ddof = 0) over full windows.
///
/// Slides a Welford accumulator (replace oldest with newest) and re-sums the
/// window every few hundred steps to cancel accumulated drift.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![NAN; values.len()];
    if window == 0 {
        return out;
    }
    let w = window as f64;
    let mut nan_in_window = 0usize;
    let mut primed = false;
    let mut since_resync = 0usize;
    let mut mean = 0.0;
    let mut m2 = 0.0;

    for i in 0..values.len() {
        if values[i].is_nan() {
            nan_in_window += 1;
        }
        if i >= window && values[i - window].is_nan() {
            nan_in_window -= 1;
        }
        if i + 1 < window || nan_in_window > 0 {
            primed = false;
            continue;
        }
        if !primed || since_resync >= STD_RESYNC_EVERY {
            (mean, m2) = mean_and_m2(&values[i + 1 - window..=i]);
            primed = true;
            since_resync = 0;
        } else {
            let x_new = values[i];
            let x_old = values[i - window];
            let old_mean = mean;
            mean = old_mean + (x_new - x_old) / w;
            m2 += (x_new - x_old) * (x_new - mean + x_old - old_mean);
            since_resync += 1;
        }
        out[i] = (m2.max(0.0) / w).sqrt();
    }
    out
}

/// Linearly weighted moving average, weights 1..=window (newest heaviest).
///
/// Uses the numerator recurrence `N[i] = N[i-1] + window * v[i] - S[i-1]`
/// where `S` is the plain window sum. Expects a contiguous run of valid
/// samples after the first one.
pub fn wma(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![NAN; values.len()];
    let Some(start) = first_valid(values) else {
        return out;
    };
    if window == 0 || values.len() < start + window {
        return out;
    }
    let w = window as f64;
    let norm = 2.0 / (w * (w + 1.0));
    let first_end = start + window;

    let mut numerator: f64 = values[start..first_end]
        .iter()
        .enumerate()
        .map(|(k, v)| (k + 1) as f64 * v)
        .sum();
    let mut sum: f64 = values[start..first_end].iter().sum();
    out[first_end - 1] = numerator * norm;

    for i in first_end..values.len() {
        numerator = numerator + w * values[i] - sum;
        sum = sum + values[i] - values[i - window];
        out[i] = numerator * norm;
    }
    out
}

/// True range: `max(h - l, |h - prev_close|, |l - prev_close|)`. The first
/// bar has no previous close, so it is just `h - l`.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    (0..close.len())
        .map(|i| {
            let hl = high[i] - low[i];
            if i == 0 {
                hl
            } else {
                let pc = close[i - 1];
                hl.max((high[i] - pc).abs()).max((low[i] - pc).abs())
            }
        })
        .collect()
}

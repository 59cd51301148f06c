// =============================================================================
// Streaming EMA
// =============================================================================
//
// `EmaCalc` holds `{alpha, value, count}` and folds one sample per call with
// the same step as `indicators::rolling::ewm`, so the value after the i-th
// update equals the batch EWM at index i.
//
// `EmaFromCalc` stays idle until the caller says its input is live. Signal
// lines over MACD / PPO / PVO use it so the signal starts accumulating at the
// first defined line value, exactly like the batch signal.
// =============================================================================

use crate::indicators::rolling::{ewm_step, span_alpha, NAN};

#[derive(Debug, Clone)]
pub struct EmaCalc {
    alpha: f64,
    min_periods: usize,
    value: Option<f64>,
    count: usize,
}

impl EmaCalc {
    /// Standard EMA with span `window`, defined from the `window`-th sample.
    pub fn new(window: usize) -> Self {
        Self::with_alpha(span_alpha(window), window)
    }

    pub fn with_alpha(alpha: f64, min_periods: usize) -> Self {
        Self {
            alpha,
            min_periods: min_periods.max(1),
            value: None,
            count: 0,
        }
    }

    /// Fold one sample. NaN samples are skipped and leave the state as is.
    pub fn update(&mut self, v: f64) -> f64 {
        if !v.is_nan() {
            let next = match self.value {
                None => v,
                Some(prev) => ewm_step(prev, v, self.alpha),
            };
            self.value = Some(next);
            self.count += 1;
        }
        self.current()
    }

    pub fn current(&self) -> f64 {
        match self.value {
            Some(v) if self.count >= self.min_periods => v,
            _ => NAN,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

#[derive(Debug, Clone)]
pub struct EmaFromCalc {
    inner: EmaCalc,
    started: bool,
}

impl EmaFromCalc {
    pub fn new(window: usize) -> Self {
        Self {
            inner: EmaCalc::new(window),
            started: false,
        }
    }

    /// Fold `v` once `can_start` has been true at least once.
    pub fn update(&mut self, v: f64, can_start: bool) -> f64 {
        if !self.started {
            if !can_start {
                return NAN;
            }
            self.started = true;
        }
        self.inner.update(v)
    }

    pub fn current(&self) -> f64 {
        self.inner.current()
    }
}

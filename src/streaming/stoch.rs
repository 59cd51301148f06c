// =============================================================================
// Streaming Stochastic
// =============================================================================
//
// Two monotonic deques bounded by the lookback window give the rolling high
// and low in amortised O(1); a small SMA ring turns %K into %D.
// =============================================================================

use super::sma::SmaCalc;
use crate::indicators::momentum::stoch_k_value;
use crate::indicators::rolling::{Extreme, MonotonicDeque, NAN};

#[derive(Debug, Clone, Copy)]
pub struct StochValue {
    pub k: f64,
    pub d: f64,
}

#[derive(Debug, Clone)]
pub struct StochCalc {
    window: usize,
    seen: usize,
    highs: MonotonicDeque,
    lows: MonotonicDeque,
    d: SmaCalc,
}

impl StochCalc {
    pub fn new(window: usize, smooth: usize) -> Self {
        Self {
            window,
            seen: 0,
            highs: MonotonicDeque::new(Extreme::Highest),
            lows: MonotonicDeque::new(Extreme::Lowest),
            d: SmaCalc::new(smooth),
        }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> StochValue {
        let idx = self.seen;
        self.seen += 1;
        let oldest = self.seen.saturating_sub(self.window);
        self.highs.expire(oldest);
        self.lows.expire(oldest);
        self.highs.push(idx, high);
        self.lows.push(idx, low);

        if self.window == 0 || self.seen < self.window {
            return StochValue { k: NAN, d: NAN };
        }
        let k = match (self.highs.peek(), self.lows.peek()) {
            (Some((_, hi)), Some((_, lo))) => stoch_k_value(close, lo, hi),
            _ => NAN,
        };
        let d = if k.is_nan() { NAN } else { self.d.update(k) };
        StochValue { k, d }
    }
}

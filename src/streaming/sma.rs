// =============================================================================
// Streaming SMA: ring buffer plus running sum.
// =============================================================================

use std::collections::VecDeque;

use crate::indicators::rolling::NAN;

#[derive(Debug, Clone)]
pub struct SmaCalc {
    window: usize,
    ring: VecDeque<f64>,
    sum: f64,
    /// Non-NaN samples currently in the ring.
    valid: usize,
}

impl SmaCalc {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            ring: VecDeque::with_capacity(window + 1),
            sum: 0.0,
            valid: 0,
        }
    }

    /// Push one sample; NaN until the ring holds `window` valid samples.
    /// NaN samples occupy a slot but never enter the sum.
    pub fn update(&mut self, v: f64) -> f64 {
        self.ring.push_back(v);
        if !v.is_nan() {
            self.sum += v;
            self.valid += 1;
        }
        if self.ring.len() > self.window {
            if let Some(old) = self.ring.pop_front() {
                if !old.is_nan() {
                    self.sum -= old;
                    self.valid -= 1;
                }
            }
        }
        if self.valid == 0 {
            self.sum = 0.0;
        }
        if self.window > 0 && self.valid == self.window {
            self.sum / self.window as f64
        } else {
            NAN
        }
    }
}

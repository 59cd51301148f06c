// =============================================================================
// Streaming VWAP: rolling sums of typical price * volume and volume.
// =============================================================================

use std::collections::VecDeque;

use crate::indicators::rolling::NAN;

#[derive(Debug, Clone)]
pub struct VwapCalc {
    window: usize,
    ring: VecDeque<(f64, f64)>,
    sum_pv: f64,
    sum_v: f64,
}

impl VwapCalc {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            ring: VecDeque::with_capacity(window + 1),
            sum_pv: 0.0,
            sum_v: 0.0,
        }
    }

    /// Push one bar's typical price and volume. NaN until the window is
    /// full, and whenever it holds no volume.
    pub fn update(&mut self, typical: f64, volume: f64) -> f64 {
        let pv = typical * volume;
        self.ring.push_back((pv, volume));
        self.sum_pv += pv;
        self.sum_v += volume;
        if self.ring.len() > self.window {
            if let Some((old_pv, old_v)) = self.ring.pop_front() {
                self.sum_pv -= old_pv;
                self.sum_v -= old_v;
            }
        }
        if self.window == 0 || self.ring.len() < self.window || self.sum_v == 0.0 {
            NAN
        } else {
            self.sum_pv / self.sum_v
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::volume::vwap;
    use crate::types::Candle;

    #[test]
    fn matches_batch() {
        let close: Vec<f64> = (0..80).map(|i| 30.0 + (i as f64 * 0.5).sin()).collect();
        let high: Vec<f64> = close.iter().map(|c| c + 0.4).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 0.4).collect();
        let volume: Vec<f64> = (0..80).map(|i| 100.0 + (i % 7) as f64 * 13.0).collect();
        let batch = vwap(&high, &low, &close, &volume, 14);
        let mut calc = VwapCalc::new(14);
        for i in 0..close.len() {
            let bar = Candle::new(i as i64, close[i], high[i], low[i], close[i], volume[i]);
            let out = calc.update(bar.typical_price(), bar.v);
            if batch[i].is_nan() {
                assert!(out.is_nan());
            } else {
                assert!((out - batch[i]).abs() < 1e-9, "index {i}");
            }
        }
    }

    #[test]
    fn zero_volume_window_is_nan() {
        let mut calc = VwapCalc::new(2);
        calc.update(1.0, 0.0);
        assert!(calc.update(1.0, 0.0).is_nan());
    }
}

// =============================================================================
// Streaming ATR
// =============================================================================
//
// Sums the first `window` true ranges, seeds with their mean, then applies
// Wilder's recurrence. The first sample has no previous close, so its true
// range is high - low.
// =============================================================================

use crate::indicators::rolling::NAN;

#[derive(Debug, Clone)]
pub struct AtrCalc {
    window: usize,
    prev_close: Option<f64>,
    seen: usize,
    sum_tr: f64,
    atr: Option<f64>,
}

impl AtrCalc {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            prev_close: None,
            seen: 0,
            sum_tr: 0.0,
            atr: None,
        }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> f64 {
        let hl = high - low;
        let tr = match self.prev_close {
            Some(pc) => hl.max((high - pc).abs()).max((low - pc).abs()),
            None => hl,
        };
        self.prev_close = Some(close);

        let w = self.window as f64;
        match self.atr {
            Some(prev) => {
                let next = (prev * (w - 1.0) + tr) / w;
                self.atr = Some(next);
                next
            }
            None => {
                self.sum_tr += tr;
                self.seen += 1;
                if self.window > 0 && self.seen == self.window {
                    let seed = self.sum_tr / w;
                    self.atr = Some(seed);
                    seed
                } else {
                    NAN
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::volatility::atr;

    #[test]
    fn matches_batch() {
        let close: Vec<f64> = (0..100).map(|i| 20.0 + (i as f64 * 0.4).cos() * 2.0).collect();
        let high: Vec<f64> = close.iter().enumerate().map(|(i, c)| c + 0.3 + (i % 5) as f64 * 0.1).collect();
        let low: Vec<f64> = close.iter().enumerate().map(|(i, c)| c - 0.2 - (i % 3) as f64 * 0.1).collect();
        let batch = atr(&high, &low, &close, 14);
        let mut calc = AtrCalc::new(14);
        for i in 0..close.len() {
            let out = calc.update(high[i], low[i], close[i]);
            if batch[i].is_nan() {
                assert!(out.is_nan());
            } else {
                assert!((out - batch[i]).abs() < 1e-10, "index {i}");
            }
        }
    }
}

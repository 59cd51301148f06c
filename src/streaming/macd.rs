// =============================================================================
// Streaming spread oscillators: MACD, PPO, PVO
// =============================================================================
//
// Fast and slow EMA states, a spread line once both are defined, and a signal
// EMA that only starts when the line does. The histogram is line - signal.
// =============================================================================

use super::ema::{EmaCalc, EmaFromCalc};
use crate::indicators::momentum::percentage_spread;
use crate::indicators::rolling::NAN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadKind {
    /// fast - slow (MACD)
    Absolute,
    /// (fast - slow) / slow * 100 (PPO, PVO)
    Percentage,
}

#[derive(Debug, Clone, Copy)]
pub struct SpreadValue {
    pub line: f64,
    pub signal: f64,
    pub hist: f64,
}

#[derive(Debug, Clone)]
pub struct SpreadCalc {
    kind: SpreadKind,
    fast: EmaCalc,
    slow: EmaCalc,
    signal: EmaFromCalc,
}

impl SpreadCalc {
    pub fn new(kind: SpreadKind, slow: usize, fast: usize, signal: usize) -> Self {
        Self {
            kind,
            fast: EmaCalc::new(fast),
            slow: EmaCalc::new(slow),
            signal: EmaFromCalc::new(signal),
        }
    }

    pub fn macd(slow: usize, fast: usize, signal: usize) -> Self {
        Self::new(SpreadKind::Absolute, slow, fast, signal)
    }

    pub fn percentage(slow: usize, fast: usize, signal: usize) -> Self {
        Self::new(SpreadKind::Percentage, slow, fast, signal)
    }

    pub fn update(&mut self, v: f64) -> SpreadValue {
        let f = self.fast.update(v);
        let s = self.slow.update(v);
        let line = if f.is_nan() || s.is_nan() {
            NAN
        } else {
            match self.kind {
                SpreadKind::Absolute => f - s,
                SpreadKind::Percentage => percentage_spread(f, s),
            }
        };
        let signal = self.signal.update(line, !line.is_nan());
        SpreadValue {
            line,
            signal,
            hist: line - signal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::momentum::ppo;
    use crate::indicators::trend::macd;

    fn wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| 50.0 + (i as f64 * 0.21).sin() * 6.0 + i as f64 * 0.05).collect()
    }

    fn assert_close(out: f64, expected: f64, tol: f64, what: &str, i: usize) {
        if expected.is_nan() {
            assert!(out.is_nan(), "{what} at {i}: expected NaN, got {out}");
        } else {
            assert!((out - expected).abs() < tol, "{what} at {i}: {out} vs {expected}");
        }
    }

    #[test]
    fn macd_matches_batch() {
        let closes = wave(150);
        let batch = macd(&closes, 26, 12, 9);
        let mut calc = SpreadCalc::macd(26, 12, 9);
        for (i, &c) in closes.iter().enumerate() {
            let out = calc.update(c);
            assert_close(out.line, batch.line[i], 1e-9, "line", i);
            assert_close(out.signal, batch.signal[i], 1e-9, "signal", i);
            assert_close(out.hist, batch.hist[i], 1e-9, "hist", i);
        }
    }

    #[test]
    fn ppo_matches_batch() {
        let closes = wave(150);
        let batch = ppo(&closes, 26, 12, 9);
        let mut calc = SpreadCalc::percentage(26, 12, 9);
        for (i, &c) in closes.iter().enumerate() {
            let out = calc.update(c);
            assert_close(out.line, batch.line[i], 1e-9, "ppo", i);
            assert_close(out.signal, batch.signal[i], 1e-9, "ppo signal", i);
        }
    }

    #[test]
    fn signal_waits_for_line() {
        let mut calc = SpreadCalc::macd(5, 2, 3);
        for i in 0..6 {
            let out = calc.update(10.0 + i as f64);
            if i < 4 {
                assert!(out.line.is_nan() && out.signal.is_nan());
            }
        }
    }
}

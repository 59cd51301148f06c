// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free batch implementations over full price / volume
// arrays. Every function returns series as long as its input, with NaN where
// there is not yet enough history. The streaming calculators in
// `crate::streaming` are checked against these values.

pub mod momentum;
pub mod returns;
pub mod rolling;
pub mod trend;
pub mod volatility;
pub mod volume;

use rolling::{ewm, span_alpha};

/// A spread line with its EMA signal and histogram (MACD, PPO, PVO).
#[derive(Debug, Clone)]
pub struct SpreadLines {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub hist: Vec<f64>,
}

impl SpreadLines {
    /// Build the signal as an EMA over `line` that starts at the line's first
    /// defined value, and the histogram as `line - signal`.
    pub fn from_line(line: Vec<f64>, signal_window: usize) -> Self {
        let signal = ewm(&line, span_alpha(signal_window), signal_window);
        let hist = line.iter().zip(&signal).map(|(l, s)| l - s).collect();
        Self { line, signal, hist }
    }
}

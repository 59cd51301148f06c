// =============================================================================
// Streaming RSI
// =============================================================================
//
// Two EMA states (alpha = 1 / window) over the split price change. The first
// sample has no previous close and feeds zero gain / zero loss, as the batch
// series does at index 0.
// =============================================================================

use super::ema::EmaCalc;
use crate::indicators::momentum::{rsi_value, split_change};
use crate::indicators::rolling::{wilder_alpha, NAN};

#[derive(Debug, Clone)]
pub struct RsiCalc {
    prev_close: Option<f64>,
    gains: EmaCalc,
    losses: EmaCalc,
}

impl RsiCalc {
    pub fn new(window: usize) -> Self {
        let alpha = wilder_alpha(window);
        Self {
            prev_close: None,
            gains: EmaCalc::with_alpha(alpha, window),
            losses: EmaCalc::with_alpha(alpha, window),
        }
    }

    pub fn update(&mut self, close: f64) -> f64 {
        let (gain, loss) = match self.prev_close {
            Some(prev) => split_change(close - prev),
            None => (0.0, 0.0),
        };
        self.prev_close = Some(close);
        let g = self.gains.update(gain);
        let l = self.losses.update(loss);
        if g.is_nan() || l.is_nan() {
            NAN
        } else {
            rsi_value(g, l)
        }
    }
}

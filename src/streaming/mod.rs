// =============================================================================
// Streaming Calculators
// =============================================================================
//
// One small `Clone` state struct per indicator per series. Each `update`
// consumes exactly one sample and returns the value the batch library gives
// at the same index (NaN before warmup).

pub mod atr;
pub mod ema;
pub mod macd;
pub mod pipeline;
pub mod rsi;
pub mod sma;
pub mod stoch;
pub mod vwap;

pub use atr::AtrCalc;
pub use ema::{EmaCalc, EmaFromCalc};
pub use macd::{SpreadCalc, SpreadKind, SpreadValue};
pub use pipeline::IndicatorPipeline;
pub use rsi::RsiCalc;
pub use sma::SmaCalc;
pub use stoch::{StochCalc, StochValue};
pub use vwap::VwapCalc;

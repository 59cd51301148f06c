// =============================================================================
// kline-engine — live kline / technical indicator engine
// =============================================================================
//
// Batch indicators over historical candles, incremental calculators over a
// live feed, and an orchestrator that shares one exchange connection per
// (symbol, interval) between any number of subscribers.
// =============================================================================

pub mod api;
pub mod app_state;
pub mod compute;
pub mod error;
pub mod indicators;
pub mod market_data;
pub mod orchestrator;
pub mod runtime_config;
pub mod streaming;
pub mod types;
pub mod windows;

pub use error::{EngineError, EngineResult};
pub use types::{Candle, Interval, KlineEvent, LiveCandle, SeriesKey};
pub use windows::{IndicatorWindows, Output};

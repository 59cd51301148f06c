// =============================================================================
// Market Data Source — the seam between the engine and an exchange
// =============================================================================
//
// A source answers two questions: "give me one page of historical candles"
// and "open a live kline stream for this series". Everything above it
// (pagination, reconnects, replay, fan-out) is exchange-agnostic and talks
// to `dyn MarketDataSource`, which is what lets tests drive the feed state
// machine with a scripted source.
// =============================================================================

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::EngineResult;
use crate::types::{LiveCandle, SeriesKey};

/// One REST page request. `start` / `end` are inclusive open-time bounds in
/// epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandleQuery {
    pub key: SeriesKey,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub limit: usize,
}

/// Live kline updates for one series. A `Malformed` item is a single bad
/// message; any other error means the connection is gone.
pub type LiveStream = BoxStream<'static, EngineResult<LiveCandle>>;

#[async_trait]
pub trait MarketDataSource: Send + Sync + 'static {
    /// Fetch at most `query.limit` candles in ascending open-time order.
    /// Candles whose close time has passed are marked closed.
    async fn fetch_page(&self, query: &CandleQuery) -> EngineResult<Vec<LiveCandle>>;

    /// Open a live stream of updates for `key`.
    async fn connect(&self, key: &SeriesKey) -> EngineResult<LiveStream>;
}

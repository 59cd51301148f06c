// =============================================================================
// Market Data Provider — historical ranges and live feeds over one source
// =============================================================================
//
// Range fetches are validated before any request is sent, then paginated
// forward: each page starts one millisecond after the previous page's last
// open time. Pages are stitched so the result is strictly increasing in `t`
// even if the exchange repeats a boundary candle.
//
// A request without `start` is anchored at `end` (or now): the provider
// walks back `limit` bars and pages forward from there, keeping the last
// `limit` candles.
// =============================================================================

use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::feed::{spawn_feed, FeedHandle, FeedOptions, FeedSettings, FeedSink};
use super::source::{CandleQuery, MarketDataSource};
use crate::error::{EngineError, EngineResult};
use crate::runtime_config::EngineConfig;
use crate::types::{Candle, Interval, LiveCandle, SeriesKey};

#[derive(Clone)]
pub struct MarketDataProvider {
    source: Arc<dyn MarketDataSource>,
    config: Arc<EngineConfig>,
}

impl MarketDataProvider {
    pub fn new(source: Arc<dyn MarketDataSource>, config: EngineConfig) -> Self {
        Self {
            source,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Historical candles for `symbol` / `interval`.
    ///
    /// `limit` defaults to one page, or to the request cap when a `start` is
    /// given. The last candle may still be in progress.
    #[instrument(skip(self), name = "provider::get_candles")]
    pub async fn get_candles(
        &self,
        symbol: &str,
        interval: Interval,
        start: Option<i64>,
        end: Option<i64>,
        limit: Option<usize>,
    ) -> EngineResult<Vec<Candle>> {
        let key = SeriesKey::new(symbol, interval)?;
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(EngineError::validation(format!("start {s} is after end {e}")));
            }
        }
        let max = self.config.max_candles_per_request;
        let limit = limit.unwrap_or(if start.is_some() { max } else { self.page_limit() });
        if limit == 0 {
            return Err(EngineError::validation("limit must be positive"));
        }
        if limit > max {
            return Err(EngineError::RequestTooLarge(format!(
                "limit {limit} exceeds maximum {max}"
            )));
        }

        let candles = self.fetch_range(&key, start, end, limit).await?;
        debug!(key = %key, count = candles.len(), "range fetched");
        Ok(candles.into_iter().map(|c| c.candle).collect())
    }

    /// The latest `n` closed candles, oldest first. Used to warm up new
    /// subscriptions.
    pub async fn recent_closed(&self, key: &SeriesKey, n: usize) -> EngineResult<Vec<Candle>> {
        let n = n.min(self.config.max_candles_per_request);
        if n == 0 {
            return Ok(Vec::new());
        }
        // One extra for the bar that is usually still open.
        let fetched = self.fetch_range(key, None, None, n + 1).await?;
        let mut closed: Vec<Candle> = fetched
            .into_iter()
            .filter(|c| c.closed)
            .map(|c| c.candle)
            .collect();
        let excess = closed.len().saturating_sub(n);
        closed.drain(..excess);
        Ok(closed)
    }

    /// Start a live feed for `key`, delivering into `sink` until the handle
    /// is stopped or dropped.
    pub fn open_feed(&self, key: SeriesKey, options: FeedOptions, sink: Arc<dyn FeedSink>) -> FeedHandle {
        spawn_feed(
            self.source.clone(),
            key,
            options,
            FeedSettings::from_config(&self.config),
            sink,
        )
    }

    fn page_limit(&self) -> usize {
        self.config.page_limit.max(1)
    }

    async fn fetch_range(
        &self,
        key: &SeriesKey,
        start: Option<i64>,
        end: Option<i64>,
        limit: usize,
    ) -> EngineResult<Vec<LiveCandle>> {
        let page_limit = self.page_limit();

        let Some(start) = start else {
            if limit <= page_limit {
                let query = CandleQuery { key: key.clone(), start: None, end, limit };
                return Ok(stitch(Vec::new(), self.source.fetch_page(&query).await?, None, end));
            }
            // Anchor at the end and page forward; the window may hold one
            // extra bar when the anchor falls mid-bar.
            let anchor = end.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
            let from = anchor - limit as i64 * key.interval.duration_ms();
            let mut candles = self.paginate(key, from, end, limit + 1).await?;
            let excess = candles.len().saturating_sub(limit);
            candles.drain(..excess);
            return Ok(candles);
        };

        self.paginate(key, start, end, limit).await
    }

    async fn paginate(
        &self,
        key: &SeriesKey,
        start: i64,
        end: Option<i64>,
        limit: usize,
    ) -> EngineResult<Vec<LiveCandle>> {
        let page_limit = self.page_limit();
        let mut out: Vec<LiveCandle> = Vec::with_capacity(limit.min(page_limit * 4));
        let mut cursor = start;
        let mut pages = 0usize;

        while out.len() < limit {
            let want = page_limit.min(limit - out.len());
            let query = CandleQuery { key: key.clone(), start: Some(cursor), end, limit: want };
            let page = self.source.fetch_page(&query).await?;
            pages += 1;

            let full = page.len() >= want;
            let before = out.len();
            out = stitch(out, page, Some(cursor), end);
            if out.len() > limit {
                out.truncate(limit);
            }

            let Some(last) = out.last() else {
                break;
            };
            cursor = last.t() + 1;
            if !full || out.len() == before || end.is_some_and(|e| cursor > e) {
                break;
            }
        }

        if pages > 1 {
            info!(key = %key, pages, count = out.len(), "paginated range fetch");
        }
        Ok(out)
    }
}

/// Append `page` to `out`, keeping only candles inside `[from, end]` that
/// are strictly newer than the last one already kept.
fn stitch(mut out: Vec<LiveCandle>, page: Vec<LiveCandle>, from: Option<i64>, end: Option<i64>) -> Vec<LiveCandle> {
    for candle in page {
        let t = candle.t();
        if from.is_some_and(|f| t < f) || end.is_some_and(|e| t > e) {
            continue;
        }
        if out.last().is_some_and(|last| t <= last.t()) {
            continue;
        }
        out.push(candle);
    }
    out
}

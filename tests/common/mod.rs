//! Shared fixtures for the integration tests: a scripted market data source
//! and candle generators.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use kline_engine::market_data::{CandleQuery, LiveStream, MarketDataSource};
use kline_engine::runtime_config::EngineConfig;
use kline_engine::{Candle, EngineError, EngineResult, LiveCandle, SeriesKey};

pub const MINUTE: i64 = 60_000;

/// One scripted websocket connection.
pub enum Session {
    /// Yield these items, then end the stream (a clean close).
    Items(Vec<EngineResult<LiveCandle>>),
    /// Yield whatever the test pushes; ends when the sender is dropped.
    Channel(mpsc::UnboundedReceiver<EngineResult<LiveCandle>>),
    /// Fail the connect call.
    Fail(String),
}

/// A source whose REST history and websocket sessions are scripted by the
/// test. Once the scripted sessions run out, `connect` yields a stream that
/// never produces anything.
#[derive(Default)]
pub struct MockSource {
    history: Mutex<Vec<LiveCandle>>,
    sessions: Mutex<VecDeque<Session>>,
    queries: Mutex<Vec<CandleQuery>>,
    connects: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_history(history: Vec<LiveCandle>) -> Arc<Self> {
        let source = Self::new();
        *source.history.lock() = history;
        source
    }

    pub fn set_history(&self, history: Vec<LiveCandle>) {
        *self.history.lock() = history;
    }

    pub fn push_session(&self, session: Session) {
        self.sessions.lock().push_back(session);
    }

    /// Queue a channel-backed session and return its sender.
    pub fn push_channel(&self) -> mpsc::UnboundedSender<EngineResult<LiveCandle>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push_session(Session::Channel(rx));
        tx
    }

    pub fn queries(&self) -> Vec<CandleQuery> {
        self.queries.lock().clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataSource for MockSource {
    async fn fetch_page(&self, query: &CandleQuery) -> EngineResult<Vec<LiveCandle>> {
        self.queries.lock().push(query.clone());
        let history = self.history.lock();
        let in_range = history
            .iter()
            .filter(|c| query.start.map_or(true, |s| c.t() >= s))
            .filter(|c| query.end.map_or(true, |e| c.t() <= e));
        // Like the exchange: ascending from `start`, or the latest `limit`
        // bars when no start is given.
        let page: Vec<LiveCandle> = if query.start.is_some() {
            in_range.take(query.limit).copied().collect()
        } else {
            let all: Vec<LiveCandle> = in_range.copied().collect();
            let skip = all.len().saturating_sub(query.limit);
            all[skip..].to_vec()
        };
        Ok(page)
    }

    async fn connect(&self, _key: &SeriesKey) -> EngineResult<LiveStream> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let session = self.sessions.lock().pop_front();
        match session {
            Some(Session::Items(items)) => Ok(futures_util::stream::iter(items).boxed()),
            Some(Session::Channel(rx)) => Ok(futures_util::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed()),
            Some(Session::Fail(msg)) => Err(EngineError::Upstream(msg)),
            None => Ok(futures_util::stream::pending().boxed()),
        }
    }
}

// ---- candles ---------------------------------------------------------------

pub fn bar(i: i64, close: f64) -> Candle {
    Candle::new(i * MINUTE, close, close + 1.0, close - 1.0, close, 10.0)
}

pub fn closed(i: i64, close: f64) -> LiveCandle {
    LiveCandle::new(bar(i, close), true)
}

pub fn open(i: i64, close: f64) -> LiveCandle {
    LiveCandle::new(bar(i, close), false)
}

/// `n` closed bars at 0, 1, .. n-1 minutes.
pub fn closed_history(n: i64) -> Vec<LiveCandle> {
    (0..n).map(|i| closed(i, 100.0 + i as f64)).collect()
}

/// Seeded random walk with positive volumes and a consistent OHLC envelope.
pub fn random_walk(n: usize, seed: u64) -> Vec<Candle> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut price: f64 = 100.0;
    (0..n)
        .map(|i| {
            let open = price;
            price = (price + rng.gen_range(-1.5..1.5)).max(1.0);
            let close = price;
            let high = open.max(close) + rng.gen_range(0.0..1.0);
            let low = (open.min(close) - rng.gen_range(0.0..1.0)).max(0.5);
            let volume = rng.gen_range(1.0..500.0);
            Candle::new(i as i64 * MINUTE, open, high, low, close, volume)
        })
        .collect()
}

/// Config with quiet heartbeats and fast backoff.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        heartbeat_interval_secs: 3_600,
        backoff_base_ms: 10,
        backoff_max_ms: 50,
        replay_limit: 100,
        seed_candles: 0,
        page_limit: 1_000,
        ..EngineConfig::default()
    }
}

pub const WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// Stream Orchestrator — one live feed per series, fanned out to subscribers
// =============================================================================
//
// Each (symbol, interval) has at most one provider feed. The feed task is the
// only writer: it runs every subscriber's indicator pipeline in its sink
// callback and pushes the result into that subscriber's broadcast channel.
// Subscribers only receive.
//
// A slot that is still warming up (seeding from recent closed candles) parks
// closed candles in `pending`; they are replayed through the pipeline once
// the seed lands, and the pipeline's own time gate drops any overlap.
//
// Lock order: `feeds` then a fanout's `slots`. The feed task only ever takes
// `slots`, and releasing the last slot of a feed stops it under `feeds`.
// =============================================================================

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::market_data::{FeedEvent, FeedHandle, FeedOptions, FeedSink, MarketDataProvider};
use crate::streaming::IndicatorPipeline;
use crate::types::{Candle, Interval, KlineEvent, LiveCandle, SeriesKey};
use crate::windows::IndicatorWindows;

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    pub symbol: String,
    pub interval: Interval,
    #[serde(default)]
    pub indicators: IndicatorWindows,
    #[serde(default)]
    pub closed_only: bool,
}

/// Several symbols on one interval, multiplexed onto one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStreamRequest {
    pub symbols: Vec<String>,
    pub interval: Interval,
    #[serde(default)]
    pub indicators: IndicatorWindows,
    #[serde(default)]
    pub closed_only: bool,
}

// =============================================================================
// Subscription handle
// =============================================================================

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: Uuid,
    keys: Vec<SeriesKey>,
    indicators: IndicatorWindows,
    rx: broadcast::Receiver<KlineEvent>,
    owner: Mutex<Option<Weak<Inner>>>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn keys(&self) -> &[SeriesKey] {
        &self.keys
    }

    pub fn indicators(&self) -> &IndicatorWindows {
        &self.indicators
    }

    /// Next event. `Lagged(n)` means the `n` oldest events were dropped
    /// because this subscriber fell behind.
    pub async fn recv(&mut self) -> Result<KlineEvent, broadcast::error::RecvError> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Result<KlineEvent, broadcast::error::TryRecvError> {
        self.rx.try_recv()
    }

    /// Remove this subscription from every feed it joined. Idempotent.
    pub fn unsubscribe(&self) {
        let Some(owner) = self.owner.lock().take() else {
            return;
        };
        if let Some(inner) = owner.upgrade() {
            inner.release(self.id, &self.keys);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("keys", &self.keys)
            .finish()
    }
}

// =============================================================================
// Per-feed fan-out
// =============================================================================

struct Slot {
    pipeline: IndicatorPipeline,
    closed_only: bool,
    tx: broadcast::Sender<KlineEvent>,
    ready: bool,
    pending: Vec<LiveCandle>,
}

impl Slot {
    fn on_candle(&mut self, key: &SeriesKey, candle: LiveCandle) {
        if self.closed_only && !candle.closed {
            return;
        }
        if !self.ready {
            if candle.closed {
                self.pending.push(candle);
            }
            return;
        }
        self.emit(key, candle);
    }

    fn emit(&mut self, key: &SeriesKey, candle: LiveCandle) {
        let Some(deltas) = self.pipeline.apply(&candle) else {
            return;
        };
        // No receiver left is fine; the slot is about to be released.
        let _ = self.tx.send(KlineEvent::Kline {
            symbol: key.symbol.clone(),
            interval: key.interval,
            candle,
            deltas,
        });
    }

    /// Seed the pipeline, then replay whatever closed while seeding.
    fn finish_warmup(&mut self, key: &SeriesKey, history: &[Candle]) -> usize {
        let seeded = self.pipeline.seed(history);
        for candle in std::mem::take(&mut self.pending) {
            self.emit(key, candle);
        }
        self.ready = true;
        seeded
    }
}

struct FeedFanout {
    key: SeriesKey,
    slots: Mutex<HashMap<Uuid, Slot>>,
}

impl FeedSink for FeedFanout {
    fn deliver(&self, event: FeedEvent) {
        let mut slots = self.slots.lock();
        match event {
            FeedEvent::Candle(candle) => {
                for slot in slots.values_mut() {
                    slot.on_candle(&self.key, candle);
                }
            }
            FeedEvent::Heartbeat { ts } => {
                for slot in slots.values() {
                    let _ = slot.tx.send(KlineEvent::Heartbeat {
                        symbol: self.key.symbol.clone(),
                        interval: self.key.interval,
                        ts,
                    });
                }
            }
            FeedEvent::Status { state, detail } => {
                for slot in slots.values() {
                    let _ = slot.tx.send(KlineEvent::Status {
                        symbol: self.key.symbol.clone(),
                        interval: self.key.interval,
                        state,
                        detail: detail.clone(),
                    });
                }
            }
        }
    }
}

struct FeedEntry {
    handle: FeedHandle,
    fanout: Arc<FeedFanout>,
}

// =============================================================================
// StreamOrchestrator
// =============================================================================

struct Inner {
    provider: MarketDataProvider,
    feeds: Mutex<HashMap<SeriesKey, FeedEntry>>,
}

impl Inner {
    fn release(&self, id: Uuid, keys: &[SeriesKey]) {
        let mut feeds = self.feeds.lock();
        for key in keys {
            let Some(entry) = feeds.get(key) else {
                continue;
            };
            let now_empty = {
                let mut slots = entry.fanout.slots.lock();
                slots.remove(&id);
                slots.is_empty()
            };
            if now_empty {
                if let Some(entry) = feeds.remove(key) {
                    entry.handle.stop();
                    info!(key = %entry.handle.key(), "last subscriber left, feed released");
                }
            }
        }
        debug!(%id, "subscription released");
    }
}

#[derive(Clone)]
pub struct StreamOrchestrator {
    inner: Arc<Inner>,
}

impl StreamOrchestrator {
    pub fn new(provider: MarketDataProvider) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                feeds: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn provider(&self) -> &MarketDataProvider {
        &self.inner.provider
    }

    /// Series with a running feed.
    pub fn active_feeds(&self) -> Vec<SeriesKey> {
        self.inner.feeds.lock().keys().cloned().collect()
    }

    /// Slots across all feeds (a batch subscription counts once per symbol).
    pub fn subscription_count(&self) -> usize {
        self.inner
            .feeds
            .lock()
            .values()
            .map(|entry| entry.fanout.slots.lock().len())
            .sum()
    }

    /// Subscribe to one series.
    #[instrument(skip(self, request), name = "orchestrator::subscribe", fields(symbol = %request.symbol, interval = %request.interval))]
    pub async fn subscribe(&self, request: StreamRequest) -> EngineResult<Subscription> {
        let config = self.inner.provider.config();
        let key = SeriesKey::new(&request.symbol, request.interval)?;
        request.indicators.validate_streaming(config.max_window)?;
        let pipeline = IndicatorPipeline::new(&request.indicators)?;

        let (tx, rx) = broadcast::channel(config.subscriber_buffer.max(1));
        let subscription = self.register(
            vec![key.clone()],
            &pipeline,
            request.closed_only,
            request.indicators,
            tx,
            rx,
        );

        let history = self.seed_history(&key).await;
        self.finish_warmup(&key, subscription.id, &history);
        info!(id = %subscription.id, key = %key, "subscribed");
        Ok(subscription)
    }

    /// Subscribe to many symbols on one interval through a single channel.
    #[instrument(skip(self, request), name = "orchestrator::subscribe_batch", fields(count = request.symbols.len(), interval = %request.interval))]
    pub async fn subscribe_batch(&self, request: BatchStreamRequest) -> EngineResult<Subscription> {
        let config = self.inner.provider.config();
        if request.symbols.is_empty() {
            return Err(EngineError::validation("symbols must not be empty"));
        }

        let max = config.max_batch_symbols;
        let mut symbols = request.symbols;
        if symbols.len() > max {
            if !config.truncate_batch {
                return Err(EngineError::TooManySymbols {
                    requested: symbols.len(),
                    max,
                });
            }
            warn!(requested = symbols.len(), max, "batch truncated to the symbol limit");
            symbols.truncate(max);
        }

        let mut seen = HashSet::new();
        let mut keys = Vec::with_capacity(symbols.len());
        for symbol in &symbols {
            if !seen.insert(symbol.as_str()) {
                return Err(EngineError::validation(format!("duplicate symbol '{symbol}'")));
            }
            keys.push(SeriesKey::new(symbol, request.interval)?);
        }
        request.indicators.validate_streaming(config.max_window)?;
        let pipeline = IndicatorPipeline::new(&request.indicators)?;

        let capacity = config.subscriber_buffer.max(1).saturating_mul(keys.len());
        let (tx, rx) = broadcast::channel(capacity);
        let subscription = self.register(
            keys.clone(),
            &pipeline,
            request.closed_only,
            request.indicators,
            tx,
            rx,
        );

        let histories =
            futures_util::future::join_all(keys.iter().map(|key| self.seed_history(key))).await;
        for (key, history) in keys.iter().zip(&histories) {
            self.finish_warmup(key, subscription.id, history);
        }
        info!(id = %subscription.id, symbols = keys.len(), "batch subscribed");
        Ok(subscription)
    }

    /// Insert one slot per key, starting feeds that are not running yet. The
    /// handle exists before any await so a cancelled caller still releases.
    fn register(
        &self,
        keys: Vec<SeriesKey>,
        pipeline: &IndicatorPipeline,
        closed_only: bool,
        indicators: IndicatorWindows,
        tx: broadcast::Sender<KlineEvent>,
        rx: broadcast::Receiver<KlineEvent>,
    ) -> Subscription {
        let id = Uuid::new_v4();
        let warm = self.inner.provider.config().seed_candles == 0;
        let mut feeds = self.inner.feeds.lock();
        for key in &keys {
            let entry = feeds.entry(key.clone()).or_insert_with(|| {
                let fanout = Arc::new(FeedFanout {
                    key: key.clone(),
                    slots: Mutex::new(HashMap::new()),
                });
                let handle = self.inner.provider.open_feed(
                    key.clone(),
                    FeedOptions { closed_only: false },
                    fanout.clone(),
                );
                FeedEntry { handle, fanout }
            });
            entry.fanout.slots.lock().insert(
                id,
                Slot {
                    pipeline: pipeline.clone(),
                    closed_only,
                    tx: tx.clone(),
                    ready: warm,
                    pending: Vec::new(),
                },
            );
        }
        drop(feeds);

        Subscription {
            id,
            keys,
            indicators,
            rx,
            owner: Mutex::new(Some(Arc::downgrade(&self.inner))),
        }
    }

    async fn seed_history(&self, key: &SeriesKey) -> Vec<Candle> {
        let n = self.inner.provider.config().seed_candles;
        if n == 0 {
            return Vec::new();
        }
        match self.inner.provider.recent_closed(key, n).await {
            Ok(history) => history,
            Err(e) => {
                warn!(key = %key, error = %e, "seeding failed, starting cold");
                Vec::new()
            }
        }
    }

    fn finish_warmup(&self, key: &SeriesKey, id: Uuid, history: &[Candle]) {
        let fanout = match self.inner.feeds.lock().get(key) {
            Some(entry) => entry.fanout.clone(),
            None => return,
        };
        let mut slots = fanout.slots.lock();
        if let Some(slot) = slots.get_mut(&id) {
            if !slot.ready {
                let seeded = slot.finish_warmup(key, history);
                debug!(key = %key, %id, seeded, "subscription warmed up");
            }
        }
    }
}

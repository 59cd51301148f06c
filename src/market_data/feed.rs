// =============================================================================
// Live Feed — reconnecting kline stream for one (symbol, interval)
// =============================================================================
//
// One tokio task per feed drives an explicit state machine:
//
//   Disconnected -> Connecting -> Open -> (Closed | Errored)
//        -> BackoffWait -> replay -> Connecting -> ...
//
// Every transition is reported to the sink as a `Status` event. Heartbeats
// are emitted on a fixed interval in every state, including while connecting
// and while waiting out a backoff, so consumers can tell a stalled feed from
// a quiet one.
//
// Watermark: the open time of the last closed candle forwarded. Closed
// candles at or before it are dropped, as are in-progress updates for a bar
// that has already closed. Replay after an outage goes through the same
// gate, so candles are forwarded in strictly increasing time with no
// duplicates.
// =============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::backoff::BackoffPolicy;
use super::source::{CandleQuery, LiveStream, MarketDataSource};
use crate::error::EngineError;
use crate::runtime_config::EngineConfig;
use crate::types::{FeedState, LiveCandle, SeriesKey};

// =============================================================================
// Public surface
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedOptions {
    /// Forward closed candles only.
    pub closed_only: bool,
}

/// What a feed reports to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Candle(LiveCandle),
    Heartbeat { ts: i64 },
    Status { state: FeedState, detail: Option<String> },
}

/// Receives feed events on the feed task. Implementations must not block.
pub trait FeedSink: Send + Sync + 'static {
    fn deliver(&self, event: FeedEvent);
}

impl FeedSink for mpsc::UnboundedSender<FeedEvent> {
    fn deliver(&self, event: FeedEvent) {
        // A closed receiver just means nobody is listening any more.
        let _ = self.send(event);
    }
}

/// Timing knobs for a feed task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedSettings {
    pub heartbeat: Duration,
    pub backoff: BackoffPolicy,
    pub replay_limit: usize,
}

impl FeedSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            heartbeat: Duration::from_secs(config.heartbeat_interval_secs.max(1)),
            backoff: BackoffPolicy::from_config(config),
            replay_limit: config.replay_limit,
        }
    }
}

/// Owner of a running feed task. Stopping aborts the task, which drops the
/// socket and the heartbeat timer with it.
pub struct FeedHandle {
    key: SeriesKey,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FeedHandle {
    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    /// Idempotent.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            info!(key = %self.key, "feed stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn the feed task for `key`. Must be called inside a tokio runtime.
pub fn spawn_feed(
    source: Arc<dyn MarketDataSource>,
    key: SeriesKey,
    options: FeedOptions,
    settings: FeedSettings,
    sink: Arc<dyn FeedSink>,
) -> FeedHandle {
    let mut heartbeat = interval_at(Instant::now() + settings.heartbeat, settings.heartbeat);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let task = FeedTask {
        source,
        key: key.clone(),
        options,
        settings,
        sink,
        heartbeat,
        state: FeedState::Disconnected,
        watermark: None,
        attempt: 0,
        rng: StdRng::from_entropy(),
    };
    info!(key = %key, closed_only = options.closed_only, "feed starting");

    FeedHandle {
        key,
        task: Mutex::new(Some(tokio::spawn(task.run()))),
    }
}

// =============================================================================
// Feed task
// =============================================================================

/// Why an open connection ended.
enum Exit {
    Closed,
    Errored(String),
}

struct FeedTask {
    source: Arc<dyn MarketDataSource>,
    key: SeriesKey,
    options: FeedOptions,
    settings: FeedSettings,
    sink: Arc<dyn FeedSink>,
    heartbeat: Interval,
    state: FeedState,
    watermark: Option<i64>,
    attempt: u32,
    rng: StdRng,
}

impl FeedTask {
    async fn run(mut self) {
        loop {
            self.transition(FeedState::Connecting, None);
            let connected =
                with_heartbeat(&mut self.heartbeat, &*self.sink, self.source.connect(&self.key)).await;

            let exit = match connected {
                Ok(stream) => {
                    self.transition(FeedState::Open, None);
                    self.pump(stream).await
                }
                Err(e) => Exit::Errored(e.to_string()),
            };

            match exit {
                Exit::Closed => self.transition(FeedState::Closed, None),
                Exit::Errored(detail) => self.transition(FeedState::Errored, Some(detail)),
            }

            self.wait_backoff().await;
            self.replay().await;
        }
    }

    fn transition(&mut self, state: FeedState, detail: Option<String>) {
        match (&detail, state) {
            (Some(d), FeedState::Errored) => warn!(key = %self.key, from = %self.state, to = %state, detail = %d, "feed state"),
            _ => info!(key = %self.key, from = %self.state, to = %state, "feed state"),
        }
        self.state = state;
        self.sink.deliver(FeedEvent::Status { state, detail });
    }

    async fn pump(&mut self, mut stream: LiveStream) -> Exit {
        loop {
            tokio::select! {
                item = stream.next() => match item {
                    Some(Ok(candle)) => {
                        self.attempt = 0;
                        self.forward(candle);
                    }
                    Some(Err(EngineError::Malformed(msg))) => {
                        warn!(key = %self.key, error = %msg, "dropping malformed kline message");
                    }
                    Some(Err(e)) => return Exit::Errored(e.to_string()),
                    None => return Exit::Closed,
                },
                _ = self.heartbeat.tick() => beat(&*self.sink),
            }
        }
    }

    async fn wait_backoff(&mut self) {
        let delay = self.settings.backoff.delay(self.attempt, &mut self.rng);
        self.attempt = self.attempt.saturating_add(1);
        self.transition(
            FeedState::BackoffWait,
            Some(format!("attempt {} in {} ms", self.attempt, delay.as_millis())),
        );
        with_heartbeat(&mut self.heartbeat, &*self.sink, tokio::time::sleep(delay)).await;
    }

    /// Fetch closed candles missed since the watermark. Nothing to recover
    /// before the first closed candle has been forwarded.
    async fn replay(&mut self) {
        let Some(last) = self.watermark else {
            return;
        };
        if self.settings.replay_limit == 0 {
            return;
        }
        let query = CandleQuery {
            key: self.key.clone(),
            start: Some(last + 1),
            end: None,
            limit: self.settings.replay_limit,
        };
        let fetched = with_heartbeat(&mut self.heartbeat, &*self.sink, self.source.fetch_page(&query)).await;
        match fetched {
            Ok(page) => {
                let forwarded = page
                    .into_iter()
                    .filter(|c| c.closed)
                    .filter(|c| self.forward(*c))
                    .count();
                debug!(key = %self.key, forwarded, "replay done");
            }
            Err(e) => warn!(key = %self.key, error = %e, "replay failed, reconnecting without it"),
        }
    }

    /// Apply the watermark and `closed_only`; returns whether the candle was
    /// delivered.
    fn forward(&mut self, candle: LiveCandle) -> bool {
        let seen = self.watermark.is_some_and(|w| candle.t() <= w);
        if seen {
            debug!(key = %self.key, t = candle.t(), "dropping candle at or before watermark");
            return false;
        }
        if candle.closed {
            self.watermark = Some(candle.t());
        } else if self.options.closed_only {
            return false;
        }
        self.sink.deliver(FeedEvent::Candle(candle));
        true
    }
}

fn beat(sink: &dyn FeedSink) {
    sink.deliver(FeedEvent::Heartbeat {
        ts: chrono::Utc::now().timestamp_millis(),
    });
}

/// Drive `fut` to completion while still emitting heartbeats.
async fn with_heartbeat<F: Future>(heartbeat: &mut Interval, sink: &dyn FeedSink, fut: F) -> F::Output {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            out = &mut fut => return out,
            _ = heartbeat.tick() => beat(sink),
        }
    }
}

// =============================================================================
// Binance Kline Source — REST /api/v3/klines + <symbol>@kline_<interval>
// =============================================================================
//
// Public market data only: no keys, no signing. Binance encodes prices and
// volumes as JSON strings, so every numeric field goes through
// `parse_string_f64`, which also accepts plain numbers.
//
// REST rows are positional arrays:
//   [openTime, open, high, low, close, volume, closeTime, quoteVolume,
//    trades, takerBuyBase, takerBuyQuote, ignore]
// Rows with fewer than 11 elements are skipped with a warning.
//
// Websocket messages arrive either bare (`/ws/<stream>`) or wrapped in the
// combined-stream envelope `{"stream": ..., "data": {...}}`; both are
// accepted.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument, warn};

use super::source::{CandleQuery, LiveStream, MarketDataSource};
use crate::error::{EngineError, EngineResult};
use crate::runtime_config::EngineConfig;
use crate::types::{Candle, Interval, LiveCandle, SeriesKey};

/// Minimum number of elements in a REST kline row.
const KLINE_ROW_LEN: usize = 11;

/// Binance spot market-data client.
#[derive(Clone)]
pub struct BinanceSource {
    rest_base_url: String,
    ws_base_url: String,
    client: reqwest::Client,
}

impl BinanceSource {
    pub fn new(rest_base_url: impl Into<String>, ws_base_url: impl Into<String>) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| EngineError::Internal(format!("failed to build http client: {e}")))?;

        let rest_base_url = rest_base_url.into().trim_end_matches('/').to_string();
        let ws_base_url = ws_base_url.into().trim_end_matches('/').to_string();
        debug!(rest = %rest_base_url, ws = %ws_base_url, "BinanceSource initialised");

        Ok(Self {
            rest_base_url,
            ws_base_url,
            client,
        })
    }

    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        Self::new(config.rest_base_url.clone(), config.ws_base_url.clone())
    }

    fn klines_url(&self, query: &CandleQuery) -> String {
        let mut url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.rest_base_url, query.key.symbol, query.key.interval, query.limit
        );
        if let Some(start) = query.start {
            url.push_str(&format!("&startTime={start}"));
        }
        if let Some(end) = query.end {
            url.push_str(&format!("&endTime={end}"));
        }
        url
    }

    fn stream_url(&self, key: &SeriesKey) -> String {
        format!(
            "{}/ws/{}@kline_{}",
            self.ws_base_url,
            key.symbol.to_lowercase(),
            key.interval
        )
    }
}

#[async_trait]
impl MarketDataSource for BinanceSource {
    #[instrument(skip(self, query), name = "binance::fetch_page", fields(key = %query.key, limit = query.limit))]
    async fn fetch_page(&self, query: &CandleQuery) -> EngineResult<Vec<LiveCandle>> {
        let url = self.klines_url(query);

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            // Error pages are not always JSON (429 / 5xx from a proxy).
            let text = resp.text().await.unwrap_or_default();
            return Err(upstream_status(status, &text));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EngineError::Malformed(format!("klines response is not JSON: {e}")))?;

        let candles = parse_rest_klines(&body, chrono::Utc::now().timestamp_millis())?;
        debug!(count = candles.len(), "klines fetched");
        Ok(candles)
    }

    #[instrument(skip(self, key), name = "binance::connect", fields(key = %key))]
    async fn connect(&self, key: &SeriesKey) -> EngineResult<LiveStream> {
        let url = self.stream_url(key);
        info!(url = %url, "connecting to kline WebSocket");

        let (ws_stream, _response) = connect_async(&url).await?;
        info!("kline WebSocket connected");

        let expected = key.clone();
        let stream = ws_stream.filter_map(move |msg| {
            let item = match msg {
                Ok(Message::Text(text)) => Some(decode_for(&expected, &text)),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "kline WebSocket close frame");
                    None
                }
                // tungstenite answers pings itself
                Ok(_) => None,
                Err(e) => Some(Err(EngineError::from(e))),
            };
            futures_util::future::ready(item)
        });
        Ok(stream.boxed())
    }
}

/// Longest slice of an error body carried into the error message.
const ERROR_BODY_PREVIEW: usize = 200;

fn upstream_status(status: reqwest::StatusCode, body: &str) -> EngineError {
    let preview: String = body.trim().chars().take(ERROR_BODY_PREVIEW).collect();
    EngineError::Upstream(format!("GET /api/v3/klines returned {status}: {preview}"))
}

fn decode_for(expected: &SeriesKey, text: &str) -> EngineResult<LiveCandle> {
    let msg = parse_kline_message(text)?;
    if msg.symbol != expected.symbol || msg.interval != expected.interval {
        return Err(EngineError::Malformed(format!(
            "kline for {}|{} on the {} stream",
            msg.symbol, msg.interval, expected
        )));
    }
    Ok(msg.candle)
}

// =============================================================================
// Payload parsing
// =============================================================================

/// A decoded websocket kline update.
#[derive(Debug, Clone, PartialEq)]
pub struct KlineMessage {
    pub symbol: String,
    pub interval: Interval,
    pub candle: LiveCandle,
}

/// Parse a REST klines body. `now_ms` decides which rows are closed.
pub fn parse_rest_klines(body: &serde_json::Value, now_ms: i64) -> EngineResult<Vec<LiveCandle>> {
    let raw = body
        .as_array()
        .ok_or_else(|| EngineError::Malformed("klines response is not an array".into()))?;

    let mut candles = Vec::with_capacity(raw.len());
    for entry in raw {
        let Some(arr) = entry.as_array() else {
            warn!("skipping kline entry that is not an array");
            continue;
        };
        if arr.len() < KLINE_ROW_LEN {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }

        let open_time = parse_i64(&arr[0], "openTime")?;
        let close_time = parse_i64(&arr[6], "closeTime")?;
        let candle = Candle::new(
            open_time,
            parse_string_f64(&arr[1], "open")?,
            parse_string_f64(&arr[2], "high")?,
            parse_string_f64(&arr[3], "low")?,
            parse_string_f64(&arr[4], "close")?,
            parse_string_f64(&arr[5], "volume")?,
        );
        candles.push(LiveCandle::new(candle, close_time < now_ms));
    }
    Ok(candles)
}

/// Parse a kline websocket message, bare or combined-stream.
pub fn parse_kline_message(text: &str) -> EngineResult<KlineMessage> {
    let root: serde_json::Value = serde_json::from_str(text)?;

    let data = if root.get("data").is_some() {
        &root["data"]
    } else {
        &root
    };

    let symbol = data["s"]
        .as_str()
        .ok_or_else(|| missing("s"))?
        .to_uppercase();

    let k = &data["k"];
    if !k.is_object() {
        return Err(missing("k"));
    }

    let interval: Interval = k["i"]
        .as_str()
        .ok_or_else(|| missing("k.i"))?
        .parse()
        .map_err(|e: EngineError| EngineError::Malformed(e.to_string()))?;

    let candle = Candle::new(
        parse_i64(&k["t"], "k.t")?,
        parse_string_f64(&k["o"], "k.o")?,
        parse_string_f64(&k["h"], "k.h")?,
        parse_string_f64(&k["l"], "k.l")?,
        parse_string_f64(&k["c"], "k.c")?,
        parse_string_f64(&k["v"], "k.v")?,
    );
    let closed = k["x"].as_bool().ok_or_else(|| missing("k.x"))?;

    Ok(KlineMessage {
        symbol,
        interval,
        candle: LiveCandle::new(candle, closed),
    })
}

fn missing(field: &str) -> EngineError {
    EngineError::Malformed(format!("missing field {field}"))
}

fn parse_i64(val: &serde_json::Value, field: &str) -> EngineResult<i64> {
    val.as_i64().ok_or_else(|| missing(field))
}

/// Parse a JSON value that is either a numeric string (`"0.001"`) or a plain
/// number.
fn parse_string_f64(val: &serde_json::Value, field: &str) -> EngineResult<f64> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| EngineError::Malformed(format!("{field}: cannot parse '{s}' as f64"))),
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| EngineError::Malformed(format!("{field}: number out of range"))),
        _ => Err(missing(field)),
    }
}

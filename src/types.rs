// =============================================================================
// Shared types used across the kline engine
// =============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::EngineError;
use crate::windows::Deltas;

// -----------------------------------------------------------------------------
// Candles
// -----------------------------------------------------------------------------

/// A single OHLCV bar. `t` is the open time in milliseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub t: i64,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    pub v: f64,
}

impl Candle {
    pub fn new(t: i64, o: f64, h: f64, l: f64, c: f64, v: f64) -> Self {
        Self { t, o, h, l, c, v }
    }

    pub fn typical_price(&self) -> f64 {
        (self.h + self.l + self.c) / 3.0
    }
}

/// A candle as seen on the live feed: values may still change until `closed`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveCandle {
    #[serde(flatten)]
    pub candle: Candle,
    pub closed: bool,
}

impl LiveCandle {
    pub fn new(candle: Candle, closed: bool) -> Self {
        Self { candle, closed }
    }

    pub fn t(&self) -> i64 {
        self.candle.t
    }
}

/// Column view over a candle series, the shape the batch library consumes.
#[derive(Debug, Clone, Default)]
pub struct Columns {
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl Columns {
    pub fn from_candles(candles: &[Candle]) -> Self {
        let mut cols = Self {
            open: Vec::with_capacity(candles.len()),
            high: Vec::with_capacity(candles.len()),
            low: Vec::with_capacity(candles.len()),
            close: Vec::with_capacity(candles.len()),
            volume: Vec::with_capacity(candles.len()),
        };
        for c in candles {
            cols.open.push(c.o);
            cols.high.push(c.h);
            cols.low.push(c.l);
            cols.close.push(c.c);
            cols.volume.push(c.v);
        }
        cols
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }
}

// -----------------------------------------------------------------------------
// Interval
// -----------------------------------------------------------------------------

/// Exchange kline intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Interval {
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H8,
    H12,
    D1,
    D3,
    W1,
    Mo1,
}

impl Interval {
    pub const ALL: [Interval; 15] = [
        Self::M1,
        Self::M3,
        Self::M5,
        Self::M15,
        Self::M30,
        Self::H1,
        Self::H2,
        Self::H4,
        Self::H6,
        Self::H8,
        Self::H12,
        Self::D1,
        Self::D3,
        Self::W1,
        Self::Mo1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M3 => "3m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H2 => "2h",
            Self::H4 => "4h",
            Self::H6 => "6h",
            Self::H8 => "8h",
            Self::H12 => "12h",
            Self::D1 => "1d",
            Self::D3 => "3d",
            Self::W1 => "1w",
            Self::Mo1 => "1M",
        }
    }

    /// Nominal bar length. The monthly interval uses 30 days.
    pub fn duration_ms(&self) -> i64 {
        const MIN: i64 = 60_000;
        const HOUR: i64 = 60 * MIN;
        const DAY: i64 = 24 * HOUR;
        match self {
            Self::M1 => MIN,
            Self::M3 => 3 * MIN,
            Self::M5 => 5 * MIN,
            Self::M15 => 15 * MIN,
            Self::M30 => 30 * MIN,
            Self::H1 => HOUR,
            Self::H2 => 2 * HOUR,
            Self::H4 => 4 * HOUR,
            Self::H6 => 6 * HOUR,
            Self::H8 => 8 * HOUR,
            Self::H12 => 12 * HOUR,
            Self::D1 => DAY,
            Self::D3 => 3 * DAY,
            Self::W1 => 7 * DAY,
            Self::Mo1 => 30 * DAY,
        }
    }
}

impl FromStr for Interval {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|iv| iv.as_str() == s)
            .ok_or_else(|| EngineError::validation(format!("unsupported interval '{s}'")))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Interval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// -----------------------------------------------------------------------------
// Series key
// -----------------------------------------------------------------------------

/// Validate an exchange symbol: 2..=30 upper-case ASCII letters or digits.
///
/// Lower-case input is rejected rather than normalised.
pub fn validate_symbol(symbol: &str) -> Result<String, EngineError> {
    let ok_len = (2..=30).contains(&symbol.len());
    let ok_chars = symbol
        .chars()
        .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit());
    if ok_len && ok_chars {
        Ok(symbol.to_string())
    } else {
        Err(EngineError::validation(format!("invalid symbol '{symbol}'")))
    }
}

/// Composite key that identifies a unique candle series.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SeriesKey {
    pub symbol: String,
    pub interval: Interval,
}

impl SeriesKey {
    pub fn new(symbol: &str, interval: Interval) -> Result<Self, EngineError> {
        Ok(Self {
            symbol: validate_symbol(symbol)?,
            interval,
        })
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.symbol, self.interval)
    }
}

// -----------------------------------------------------------------------------
// Feed state & subscriber events
// -----------------------------------------------------------------------------

/// Live feed connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedState {
    Disconnected,
    Connecting,
    Open,
    Closed,
    Errored,
    BackoffWait,
}

impl fmt::Display for FeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Errored => "errored",
            Self::BackoffWait => "backoff_wait",
        };
        f.write_str(s)
    }
}

/// The unit delivered to a stream subscriber.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum KlineEvent {
    Kline {
        symbol: String,
        interval: Interval,
        candle: LiveCandle,
        deltas: Deltas,
    },
    Heartbeat {
        symbol: String,
        interval: Interval,
        ts: i64,
    },
    Status {
        symbol: String,
        interval: Interval,
        state: FeedState,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl KlineEvent {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Kline { symbol, .. }
            | Self::Heartbeat { symbol, .. }
            | Self::Status { symbol, .. } => symbol,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_parse_roundtrip() {
        for iv in Interval::ALL {
            assert_eq!(iv.as_str().parse::<Interval>().unwrap(), iv);
        }
        assert!("2m".parse::<Interval>().is_err());
        // Month and minute differ only by case.
        assert_eq!("1M".parse::<Interval>().unwrap(), Interval::Mo1);
        assert_eq!("1m".parse::<Interval>().unwrap(), Interval::M1);
    }

    #[test]
    fn interval_durations() {
        assert_eq!(Interval::M1.duration_ms(), 60_000);
        assert_eq!(Interval::H4.duration_ms(), 4 * 3_600_000);
        assert_eq!(Interval::W1.duration_ms(), 7 * 86_400_000);
    }

    #[test]
    fn symbol_validation_is_strict() {
        assert!(validate_symbol("BTCUSDT").is_ok());
        assert!(validate_symbol("1000PEPEUSDT").is_ok());
        assert!(validate_symbol("btcusdt").is_err());
        assert!(validate_symbol("BTC-USDT").is_err());
        assert!(validate_symbol("B").is_err());
        assert!(validate_symbol("").is_err());
    }

    #[test]
    fn series_key_display() {
        let key = SeriesKey::new("ETHUSDT", Interval::M5).unwrap();
        assert_eq!(key.to_string(), "ETHUSDT|5m");
    }

    #[test]
    fn live_candle_serialises_flat() {
        let live = LiveCandle::new(Candle::new(1_000, 1.0, 2.0, 0.5, 1.5, 10.0), true);
        let json = serde_json::to_value(live).unwrap();
        assert_eq!(json["t"], 1_000);
        assert_eq!(json["c"], 1.5);
        assert_eq!(json["closed"], true);
    }

    #[test]
    fn heartbeat_event_is_tagged() {
        let ev = KlineEvent::Heartbeat {
            symbol: "BTCUSDT".into(),
            interval: Interval::M1,
            ts: 42,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "heartbeat");
        assert_eq!(json["interval"], "1m");
    }

    #[test]
    fn typical_price_is_hlc_mean() {
        let bar = Candle::new(0, 1.0, 12.0, 6.0, 9.0, 5.0);
        assert_eq!(bar.typical_price(), 9.0);
    }

    #[test]
    fn every_event_kind_names_its_symbol() {
        let status = KlineEvent::Status {
            symbol: "SOLUSDT".into(),
            interval: Interval::H1,
            state: FeedState::Open,
            detail: None,
        };
        assert_eq!(status.symbol(), "SOLUSDT");
        let kline = KlineEvent::Kline {
            symbol: "ETHUSDT".into(),
            interval: Interval::M1,
            candle: LiveCandle::new(Candle::new(0, 1.0, 1.0, 1.0, 1.0, 1.0), true),
            deltas: Deltas::new(),
        };
        assert_eq!(kline.symbol(), "ETHUSDT");
    }

    #[test]
    fn columns_from_candles() {
        let candles = vec![
            Candle::new(0, 1.0, 2.0, 0.0, 1.5, 3.0),
            Candle::new(60_000, 1.5, 2.5, 1.0, 2.0, 4.0),
        ];
        let cols = Columns::from_candles(&candles);
        assert_eq!(cols.len(), 2);
        assert_eq!(cols.close, vec![1.5, 2.0]);
        assert_eq!(cols.volume, vec![3.0, 4.0]);
    }
}

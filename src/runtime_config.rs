// =============================================================================
// Engine Configuration — upstream endpoints, feed tuning and request limits
// =============================================================================
//
// Loaded once at startup from a JSON file. Every field carries a serde
// default so an empty object (or a file written by an older build) still
// loads. `KLINE_ENGINE_*` environment variables override individual fields
// after the file is read.
//
// Saving uses an atomic tmp + rename so a crash mid-write never leaves a
// truncated file behind.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_rest_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_ws_base_url() -> String {
    "wss://stream.binance.com:9443".to_string()
}

fn default_heartbeat_interval_secs() -> u64 {
    15
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_replay_limit() -> usize {
    500
}

fn default_max_batch_symbols() -> usize {
    50
}

fn default_subscriber_buffer() -> usize {
    256
}

fn default_seed_candles() -> usize {
    500
}

fn default_max_candles_per_request() -> usize {
    5_000
}

fn default_page_limit() -> usize {
    1_000
}

fn default_max_window() -> usize {
    1_000
}

// =============================================================================
// EngineConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    // --- Transport ----------------------------------------------------------

    /// Address the HTTP / websocket API listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    // --- Upstream -----------------------------------------------------------

    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,

    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,

    /// REST page size; Binance caps klines at 1000 per call.
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,

    // --- Live feed ----------------------------------------------------------

    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// First reconnect delay before jitter.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on any single reconnect delay.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Closed candles fetched over REST before each reconnect.
    #[serde(default = "default_replay_limit")]
    pub replay_limit: usize,

    // --- Subscriptions ------------------------------------------------------

    #[serde(default = "default_max_batch_symbols")]
    pub max_batch_symbols: usize,

    /// Serve the first `max_batch_symbols` of an oversized batch instead of
    /// rejecting it.
    #[serde(default)]
    pub truncate_batch: bool,

    /// Events buffered per subscription before the oldest are dropped.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,

    /// Recent closed candles used to warm up a new subscription (0 = none).
    #[serde(default = "default_seed_candles")]
    pub seed_candles: usize,

    // --- Request limits -----------------------------------------------------

    #[serde(default = "default_max_candles_per_request")]
    pub max_candles_per_request: usize,

    /// Largest indicator window a request may ask for.
    #[serde(default = "default_max_window")]
    pub max_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            rest_base_url: default_rest_base_url(),
            ws_base_url: default_ws_base_url(),
            page_limit: default_page_limit(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            replay_limit: default_replay_limit(),
            max_batch_symbols: default_max_batch_symbols(),
            truncate_batch: false,
            subscriber_buffer: default_subscriber_buffer(),
            seed_candles: default_seed_candles(),
            max_candles_per_request: default_max_candles_per_request(),
            max_window: default_max_window(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing file is an error so the caller can fall back to defaults
    /// with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            rest = %config.rest_base_url,
            ws = %config.ws_base_url,
            "engine config loaded"
        );

        Ok(config)
    }

    /// Persist to `path` via `<path>.tmp` + rename.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise engine config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }

    /// Apply `KLINE_ENGINE_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Unparseable values are logged and
    /// ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("KLINE_ENGINE_BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = lookup("KLINE_ENGINE_REST_BASE_URL") {
            self.rest_base_url = v;
        }
        if let Some(v) = lookup("KLINE_ENGINE_WS_BASE_URL") {
            self.ws_base_url = v;
        }
        override_parsed(&lookup, "KLINE_ENGINE_PAGE_LIMIT", &mut self.page_limit);
        override_parsed(&lookup, "KLINE_ENGINE_HEARTBEAT_SECS", &mut self.heartbeat_interval_secs);
        override_parsed(&lookup, "KLINE_ENGINE_BACKOFF_BASE_MS", &mut self.backoff_base_ms);
        override_parsed(&lookup, "KLINE_ENGINE_BACKOFF_MAX_MS", &mut self.backoff_max_ms);
        override_parsed(&lookup, "KLINE_ENGINE_REPLAY_LIMIT", &mut self.replay_limit);
        override_parsed(&lookup, "KLINE_ENGINE_MAX_BATCH_SYMBOLS", &mut self.max_batch_symbols);
        override_parsed(&lookup, "KLINE_ENGINE_TRUNCATE_BATCH", &mut self.truncate_batch);
        override_parsed(&lookup, "KLINE_ENGINE_SUBSCRIBER_BUFFER", &mut self.subscriber_buffer);
        override_parsed(&lookup, "KLINE_ENGINE_SEED_CANDLES", &mut self.seed_candles);
        override_parsed(&lookup, "KLINE_ENGINE_MAX_CANDLES", &mut self.max_candles_per_request);
        override_parsed(&lookup, "KLINE_ENGINE_MAX_WINDOW", &mut self.max_window);
    }
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(v) => *slot = v,
        Err(_) => warn!(key, value = %raw, "ignoring unparseable config override"),
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.rest_base_url, "https://api.binance.com");
        assert_eq!(cfg.page_limit, 1000);
        assert_eq!(cfg.max_batch_symbols, 50);
        assert!(!cfg.truncate_batch);
        assert!(cfg.backoff_max_ms >= cfg.backoff_base_ms);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");
        assert_eq!(cfg.heartbeat_interval_secs, 15);
        assert_eq!(cfg.replay_limit, 500);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "max_batch_symbols": 10, "truncate_batch": true }"#;
        let cfg: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.max_batch_symbols, 10);
        assert!(cfg.truncate_batch);
        assert_eq!(cfg.subscriber_buffer, 256);
    }

    #[test]
    fn overrides_apply_and_bad_values_are_ignored() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("KLINE_ENGINE_WS_BASE_URL", "ws://localhost:9000"),
            ("KLINE_ENGINE_REPLAY_LIMIT", "42"),
            ("KLINE_ENGINE_MAX_WINDOW", "lots"),
        ]);
        let mut cfg = EngineConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.ws_base_url, "ws://localhost:9000");
        assert_eq!(cfg.replay_limit, 42);
        assert_eq!(cfg.max_window, 1000);
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("kline-engine-cfg-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("engine.json");
        let mut cfg = EngineConfig::default();
        cfg.seed_candles = 7;
        cfg.save(&path).unwrap();
        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.seed_candles, 7);
        assert!(!path.with_extension("json.tmp").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}

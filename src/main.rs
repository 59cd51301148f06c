// =============================================================================
// kline-engine — Main Entry Point
// =============================================================================
//
// Loads `engine_config.json` (or the file named by KLINE_ENGINE_CONFIG),
// applies KLINE_ENGINE_* overrides, wires the Binance source and serves the
// API until Ctrl-C. Live feeds start lazily with the first subscriber.
// =============================================================================

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kline_engine::api;
use kline_engine::app_state::AppState;
use kline_engine::runtime_config::EngineConfig;

const DEFAULT_CONFIG_PATH: &str = "engine_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "kline-engine starting");

    let config_path =
        std::env::var("KLINE_ENGINE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut config = EngineConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, path = %config_path, "failed to load config, using defaults");
        EngineConfig::default()
    });
    config.apply_env();

    info!(
        rest = %config.rest_base_url,
        ws = %config.ws_base_url,
        max_batch_symbols = config.max_batch_symbols,
        seed_candles = config.seed_candles,
        "engine configured"
    );

    // ── 2. Shared state ──────────────────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let state = AppState::binance(config).context("failed to build market data source")?;

    // ── 3. API server ────────────────────────────────────────────────────
    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("API server failed")?;

    info!("kline-engine stopped");
    Ok(())
}

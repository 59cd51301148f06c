//! HTTP and websocket surface over a scripted source, served on an
//! ephemeral port.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use common::*;
use kline_engine::api;
use kline_engine::app_state::AppState;
use kline_engine::market_data::MarketDataSource;

async fn serve(source: &Arc<MockSource>) -> SocketAddr {
    let source: Arc<dyn MarketDataSource> = source.clone();
    let state = AppState::with_source(test_config(), source);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, api::router(state)).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn health_reports_counts() {
    let addr = serve(&MockSource::new()).await;
    let body: Value = reqwest::get(format!("http://{addr}/api/v1/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["activeFeeds"], 0);
    assert_eq!(body["subscriptions"], 0);
}

#[tokio::test]
async fn compute_returns_aligned_series() {
    let source = MockSource::with_history(closed_history(30));
    let addr = serve(&source).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/v1/indicators"))
        .json(&json!({
            "symbol": "BTCUSDT",
            "interval": "1m",
            "start": 0,
            "windows": { "sma": { "window": 5 }, "macd": {} },
            "includeCandles": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["count"], 30);
    assert_eq!(body["warmup"], 26);
    assert_eq!(body["candles"].as_array().unwrap().len(), 30);

    let sma = body["indicators"]["sma"].as_array().unwrap();
    assert_eq!(sma.len(), 30);
    assert!(sma[3].is_null());
    assert_eq!(sma[4], json!(102.0));
    assert!(body["indicators"]["macd_signal"].is_array());
    assert!(body["indicators"].get("rsi").is_none());
}

#[tokio::test]
async fn compute_errors_map_to_statuses() {
    let addr = serve(&MockSource::new()).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/api/v1/indicators");

    let response = client
        .post(&url)
        .json(&json!({ "symbol": "btc", "interval": "1m", "windows": { "rsi": {} } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "validation");

    let response = client
        .post(&url)
        .json(&json!({ "symbol": "BTCUSDT", "interval": "1m", "limit": 100000, "windows": {} }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn websocket_streams_kline_events() {
    let source = MockSource::new();
    let feed = source.push_channel();
    let addr = serve(&source).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/v1/stream"))
        .await
        .unwrap();
    let request = json!({ "symbol": "BTCUSDT", "interval": "1m", "indicators": { "sma": { "window": 1 } } });
    ws.send(Message::Text(request.to_string())).await.unwrap();

    feed.send(Ok(closed(1, 42.0))).unwrap();

    let kline = loop {
        let frame = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
        let Message::Text(text) = frame else { continue };
        let event: Value = serde_json::from_str(&text).unwrap();
        if event["type"] == "kline" {
            break event;
        }
    };
    assert_eq!(kline["symbol"], "BTCUSDT");
    assert_eq!(kline["interval"], "1m");
    assert_eq!(kline["candle"]["closed"], true);
    assert_eq!(kline["deltas"]["sma"], json!(42.0));
}

#[tokio::test]
async fn websocket_rejects_bad_requests_with_an_error_frame() {
    let addr = serve(&MockSource::new()).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/v1/stream"))
        .await
        .unwrap();
    let request = json!({ "symbols": [], "interval": "1m" });
    ws.send(Message::Text(request.to_string())).await.unwrap();

    let frame = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
    let Message::Text(text) = frame else {
        panic!("expected an error frame, got {frame:?}");
    };
    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["type"], "error");
    assert_eq!(body["error"], "validation");
}

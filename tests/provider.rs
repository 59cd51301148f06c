mod common;

use std::sync::Arc;

use common::*;
use kline_engine::market_data::{MarketDataProvider, MarketDataSource};
use kline_engine::{EngineError, Interval, SeriesKey};

fn provider(source: &Arc<MockSource>) -> MarketDataProvider {
    let source: Arc<dyn MarketDataSource> = source.clone();
    MarketDataProvider::new(source, test_config())
}

#[tokio::test]
async fn paginates_forward_from_start() {
    let source = MockSource::with_history(closed_history(2_500));
    let candles = provider(&source)
        .get_candles("BTCUSDT", Interval::M1, Some(0), None, None)
        .await
        .unwrap();

    assert_eq!(candles.len(), 2_500);
    assert!(candles.windows(2).all(|w| w[0].t < w[1].t));

    let starts: Vec<Option<i64>> = source.queries().iter().map(|q| q.start).collect();
    assert_eq!(starts, vec![Some(0), Some(999 * MINUTE + 1), Some(1_999 * MINUTE + 1)]);
}

#[tokio::test]
async fn bounded_range_is_inclusive() {
    let source = MockSource::with_history(closed_history(100));
    let candles = provider(&source)
        .get_candles("BTCUSDT", Interval::M1, Some(10 * MINUTE), Some(20 * MINUTE), None)
        .await
        .unwrap();
    assert_eq!(candles.len(), 11);
    assert_eq!(candles.first().unwrap().t, 10 * MINUTE);
    assert_eq!(candles.last().unwrap().t, 20 * MINUTE);
}

#[tokio::test]
async fn inverted_range_fails_before_any_request() {
    let source = MockSource::with_history(closed_history(10));
    let err = provider(&source)
        .get_candles("BTCUSDT", Interval::M1, Some(5 * MINUTE), Some(MINUTE), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert!(source.queries().is_empty());
}

#[tokio::test]
async fn oversized_and_zero_limits_are_rejected() {
    let source = MockSource::new();
    let p = provider(&source);
    let max = p.config().max_candles_per_request;

    let err = p
        .get_candles("BTCUSDT", Interval::M1, None, None, Some(max + 1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RequestTooLarge(_)));

    let err = p
        .get_candles("BTCUSDT", Interval::M1, None, None, Some(0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
    assert!(source.queries().is_empty());
}

#[tokio::test]
async fn invalid_symbol_is_rejected() {
    let source = MockSource::new();
    let err = provider(&source)
        .get_candles("btc-usdt", Interval::H1, None, None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
    assert!(source.queries().is_empty());
}

#[tokio::test]
async fn latest_page_without_start() {
    let source = MockSource::with_history(closed_history(300));
    let candles = provider(&source)
        .get_candles("BTCUSDT", Interval::M1, None, None, Some(50))
        .await
        .unwrap();
    assert_eq!(candles.len(), 50);
    assert_eq!(candles.last().unwrap().t, 299 * MINUTE);
    assert_eq!(source.queries().len(), 1);
    assert_eq!(source.queries()[0].start, None);
}

#[tokio::test]
async fn derived_start_keeps_the_last_limit_candles() {
    let source = MockSource::with_history(closed_history(3_000));
    let end = 2_999 * MINUTE;
    let candles = provider(&source)
        .get_candles("BTCUSDT", Interval::M1, None, Some(end), Some(1_500))
        .await
        .unwrap();

    assert_eq!(candles.len(), 1_500);
    assert_eq!(candles.first().unwrap().t, 1_500 * MINUTE);
    assert_eq!(candles.last().unwrap().t, end);
    assert!(source.queries().len() >= 2);
}

#[tokio::test]
async fn empty_history_is_not_an_error() {
    let source = MockSource::new();
    let candles = provider(&source)
        .get_candles("BTCUSDT", Interval::M1, Some(0), None, Some(10))
        .await
        .unwrap();
    assert!(candles.is_empty());
}

#[tokio::test]
async fn recent_closed_skips_the_open_bar() {
    let mut history = closed_history(10);
    history.push(open(10, 120.0));
    let source = MockSource::with_history(history);
    let key = SeriesKey::new("BTCUSDT", Interval::M1).unwrap();

    let recent = provider(&source).recent_closed(&key, 3).await.unwrap();
    let times: Vec<i64> = recent.iter().map(|c| c.t / MINUTE).collect();
    assert_eq!(times, vec![7, 8, 9]);

    assert!(provider(&source).recent_closed(&key, 0).await.unwrap().is_empty());
}

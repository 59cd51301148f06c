//! Streaming calculators against the batch library on the same candles.

mod common;

use common::random_walk;
use kline_engine::compute::compute_indicators;
use kline_engine::streaming::IndicatorPipeline;
use kline_engine::windows::{
    AtrParams, EmaParams, RsiParams, SmaParams, SpreadParams, StochParams, VwapParams,
};
use kline_engine::{IndicatorWindows, Output};

fn streaming_windows() -> IndicatorWindows {
    IndicatorWindows {
        sma: Some(SmaParams { window: 20 }),
        ema: Some(EmaParams { window: 14 }),
        rsi: Some(RsiParams { window: 14 }),
        macd: Some(SpreadParams::default()),
        ppo: Some(SpreadParams { slow: 21, fast: 8, signal: 5 }),
        pvo: Some(SpreadParams::default()),
        atr: Some(AtrParams { window: 14 }),
        stoch: Some(StochParams::default()),
        vwap: Some(VwapParams { window: 14 }),
        ..Default::default()
    }
}

fn close_enough(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * b.abs().max(1.0)
}

#[test]
fn live_updates_match_batch_series() {
    let windows = streaming_windows();
    for seed in [7_u64, 42, 2024] {
        let candles = random_walk(400, seed);
        let batch = compute_indicators(&candles, &windows);
        let mut pipeline = IndicatorPipeline::new(&windows).unwrap();

        for (i, candle) in candles.iter().enumerate() {
            let deltas = pipeline.update(candle).expect("fresh candle");
            assert_eq!(deltas.len(), batch.len(), "output sets differ at {i}");
            for (output, live) in &deltas {
                let expected = batch[output][i];
                match (live, expected) {
                    (None, None) => {}
                    (Some(a), Some(b)) => assert!(
                        close_enough(*a, b),
                        "seed {seed} {output:?} at {i}: live {a} vs batch {b}"
                    ),
                    _ => panic!("seed {seed} {output:?} at {i}: live {live:?} vs batch {expected:?}"),
                }
            }
        }
    }
}

#[test]
fn preview_matches_what_update_would_commit() {
    let windows = streaming_windows();
    let candles = random_walk(120, 99);
    let mut pipeline = IndicatorPipeline::new(&windows).unwrap();

    for candle in &candles {
        let previewed = pipeline.preview(candle).unwrap();
        // Previewing twice must not advance anything.
        assert_eq!(pipeline.preview(candle).unwrap(), previewed);
        let committed = pipeline.update(candle).unwrap();
        assert_eq!(previewed, committed);
    }
}

#[test]
fn values_never_fall_back_to_null_after_warmup() {
    let windows = streaming_windows();
    let candles = random_walk(300, 5);
    let mut pipeline = IndicatorPipeline::new(&windows).unwrap();
    let mut warm: Vec<Output> = Vec::new();

    for (i, candle) in candles.iter().enumerate() {
        let deltas = pipeline.update(candle).unwrap();
        for output in &warm {
            assert!(deltas[output].is_some(), "{output:?} went null again at {i}");
        }
        for (output, value) in &deltas {
            if value.is_some() && !warm.contains(output) {
                warm.push(*output);
            }
        }
    }
    assert_eq!(warm.len(), pipeline_output_count(&windows));
}

fn pipeline_output_count(windows: &IndicatorWindows) -> usize {
    compute_indicators(&random_walk(1, 0), windows).len()
}

#[test]
fn seeding_equals_replaying_updates() {
    let windows = streaming_windows();
    let candles = random_walk(200, 11);
    let (history, live) = candles.split_at(150);

    let mut seeded = IndicatorPipeline::new(&windows).unwrap();
    assert_eq!(seeded.seed(history), 150);
    // Seeding again with the same history is a no-op.
    assert_eq!(seeded.seed(history), 0);

    let mut stepped = IndicatorPipeline::new(&windows).unwrap();
    for candle in history {
        stepped.update(candle);
    }
    for candle in live {
        assert_eq!(seeded.update(candle), stepped.update(candle));
    }
}

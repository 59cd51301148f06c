// =============================================================================
// Batch Compute — candles in, named indicator series out
// =============================================================================
//
// `compute_indicators` is pure: it runs every requested family over the
// candle columns and returns one series per output, aligned with the input
// (NaN and infinities become `null`). `compute` adds validation and the
// historical fetch in front of it.
// =============================================================================

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::EngineResult;
use crate::indicators::rolling::{ema, sma, wma};
use crate::indicators::{momentum, returns, trend, volatility, volume, SpreadLines};
use crate::market_data::MarketDataProvider;
use crate::types::{Candle, Columns, Interval, SeriesKey};
use crate::windows::{finite, IndicatorWindows, Output};

pub type IndicatorSeries = BTreeMap<Output, Vec<Option<f64>>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeRequest {
    pub symbol: String,
    pub interval: Interval,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
    #[serde(default)]
    pub limit: Option<usize>,
    pub windows: IndicatorWindows,
    #[serde(default)]
    pub include_candles: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeResponse {
    pub symbol: String,
    pub interval: Interval,
    pub count: usize,
    /// Largest period among the requested windows.
    pub warmup: usize,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candles: Option<Vec<Candle>>,
    pub indicators: IndicatorSeries,
}

/// Fetch the requested range and compute every requested family over it.
#[instrument(skip(provider, request), name = "compute", fields(symbol = %request.symbol, interval = %request.interval))]
pub async fn compute(provider: &MarketDataProvider, request: ComputeRequest) -> EngineResult<ComputeResponse> {
    let key = SeriesKey::new(&request.symbol, request.interval)?;
    request.windows.validate(provider.config().max_window)?;

    let candles = provider
        .get_candles(&key.symbol, key.interval, request.start, request.end, request.limit)
        .await?;
    let indicators = compute_indicators(&candles, &request.windows);
    debug!(count = candles.len(), series = indicators.len(), "indicators computed");

    Ok(ComputeResponse {
        symbol: key.symbol,
        interval: key.interval,
        count: candles.len(),
        warmup: request.windows.max_period(),
        generated_at: Utc::now(),
        candles: request.include_candles.then_some(candles),
        indicators,
    })
}

fn put(out: &mut IndicatorSeries, name: Output, series: Vec<f64>) {
    out.insert(name, series.into_iter().map(finite).collect());
}

fn put_spread(out: &mut IndicatorSeries, names: [Output; 3], lines: SpreadLines) {
    put(out, names[0], lines.line);
    put(out, names[1], lines.signal);
    put(out, names[2], lines.hist);
}

/// Run every family in `windows` over `candles`. Windows are assumed valid.
pub fn compute_indicators(candles: &[Candle], windows: &IndicatorWindows) -> IndicatorSeries {
    let cols = Columns::from_candles(candles);
    let (h, l, c, v) = (&cols.high[..], &cols.low[..], &cols.close[..], &cols.volume[..]);
    let mut out = IndicatorSeries::new();

    // ---- momentum ----
    if let Some(p) = windows.rsi {
        put(&mut out, Output::Rsi, momentum::rsi(c, p.window));
    }
    if let Some(p) = windows.stoch {
        let s = momentum::stoch(h, l, c, p.window, p.smooth);
        put(&mut out, Output::StochK, s.k);
        put(&mut out, Output::StochD, s.d);
    }
    if let Some(p) = windows.roc {
        put(&mut out, Output::Roc, momentum::roc(c, p.window));
    }
    if let Some(p) = windows.kama {
        put(&mut out, Output::Kama, momentum::kama(c, p.window, p.pow1, p.pow2));
    }
    if let Some(p) = windows.tsi {
        put(&mut out, Output::Tsi, momentum::tsi(c, p.slow, p.fast));
    }
    if let Some(p) = windows.uo {
        let uo = momentum::ultimate_oscillator(
            h, l, c, p.short, p.medium, p.long, p.weight_short, p.weight_medium, p.weight_long,
        );
        put(&mut out, Output::Uo, uo);
    }
    if let Some(p) = windows.ppo {
        put_spread(&mut out, [Output::Ppo, Output::PpoSignal, Output::PpoHist], momentum::ppo(c, p.slow, p.fast, p.signal));
    }
    if let Some(p) = windows.pvo {
        put_spread(&mut out, [Output::Pvo, Output::PvoSignal, Output::PvoHist], momentum::pvo(v, p.slow, p.fast, p.signal));
    }
    if let Some(p) = windows.williams_r {
        put(&mut out, Output::WilliamsR, momentum::williams_r(h, l, c, p.window));
    }
    if let Some(p) = windows.stoch_rsi {
        let s = momentum::stoch_rsi(c, p.window, p.smooth1, p.smooth2);
        put(&mut out, Output::StochRsi, s.stoch_rsi);
        put(&mut out, Output::StochRsiK, s.k);
        put(&mut out, Output::StochRsiD, s.d);
    }
    if let Some(p) = windows.ao {
        put(&mut out, Output::Ao, momentum::awesome_oscillator(h, l, p.short, p.long));
    }

    // ---- trend ----
    if let Some(p) = windows.sma {
        put(&mut out, Output::Sma, sma(c, p.window));
    }
    if let Some(p) = windows.ema {
        put(&mut out, Output::Ema, ema(c, p.window));
    }
    if let Some(p) = windows.wma {
        put(&mut out, Output::Wma, wma(c, p.window));
    }
    if let Some(p) = windows.macd {
        put_spread(&mut out, [Output::Macd, Output::MacdSignal, Output::MacdHist], trend::macd(c, p.slow, p.fast, p.signal));
    }
    if let Some(p) = windows.adx {
        let a = trend::adx(h, l, c, p.window);
        put(&mut out, Output::Adx, a.adx);
        put(&mut out, Output::AdxPos, a.pos);
        put(&mut out, Output::AdxNeg, a.neg);
    }
    if let Some(p) = windows.cci {
        put(&mut out, Output::Cci, trend::cci(h, l, c, p.window, p.constant));
    }
    if let Some(p) = windows.trix {
        put(&mut out, Output::Trix, trend::trix(c, p.window));
    }
    if let Some(p) = windows.mass_index {
        put(&mut out, Output::MassIndex, trend::mass_index(h, l, p.fast, p.slow));
    }
    if let Some(p) = windows.ichimoku {
        let i = trend::ichimoku(h, l, c, p.conversion, p.base, p.span);
        put(&mut out, Output::IchimokuConversion, i.conversion);
        put(&mut out, Output::IchimokuBase, i.base);
        put(&mut out, Output::IchimokuA, i.span_a);
        put(&mut out, Output::IchimokuB, i.span_b);
        put(&mut out, Output::IchimokuAVisual, i.span_a_visual);
        put(&mut out, Output::IchimokuBVisual, i.span_b_visual);
        put(&mut out, Output::IchimokuChikou, i.chikou);
    }
    if let Some(p) = windows.stc {
        put(&mut out, Output::Stc, trend::stc(c, p.slow, p.fast, p.cycle, p.smooth1, p.smooth2));
    }
    if let Some(p) = windows.dpo {
        put(&mut out, Output::Dpo, trend::dpo(c, p.window));
    }
    if let Some(p) = windows.kst {
        let k = trend::kst(
            c,
            [p.roc1, p.roc2, p.roc3, p.roc4],
            [p.window1, p.window2, p.window3, p.window4],
            p.signal,
        );
        put(&mut out, Output::Kst, k.kst);
        put(&mut out, Output::KstSignal, k.signal);
        put(&mut out, Output::KstDiff, k.diff);
    }
    if let Some(p) = windows.aroon {
        let a = trend::aroon(h, l, p.window);
        put(&mut out, Output::AroonUp, a.up);
        put(&mut out, Output::AroonDown, a.down);
        put(&mut out, Output::AroonIndicator, a.indicator);
    }
    if let Some(p) = windows.vortex {
        let vx = trend::vortex(h, l, c, p.window);
        put(&mut out, Output::VortexPos, vx.pos);
        put(&mut out, Output::VortexNeg, vx.neg);
        put(&mut out, Output::VortexDiff, vx.diff);
    }
    if let Some(p) = windows.psar {
        let s = trend::psar(h, l, c, p.step, p.max_step);
        put(&mut out, Output::Psar, s.psar);
        put(&mut out, Output::PsarUp, s.up);
        put(&mut out, Output::PsarDown, s.down);
        put(&mut out, Output::PsarUpIndicator, s.up_indicator);
        put(&mut out, Output::PsarDownIndicator, s.down_indicator);
    }

    // ---- volatility ----
    if let Some(p) = windows.bollinger {
        let b = volatility::bollinger(c, p.window, p.dev);
        put(&mut out, Output::BbMavg, b.mavg);
        put(&mut out, Output::BbHband, b.hband);
        put(&mut out, Output::BbLband, b.lband);
        put(&mut out, Output::BbWband, b.wband);
        put(&mut out, Output::BbPband, b.pband);
        put(&mut out, Output::BbHbandIndicator, b.hband_indicator);
        put(&mut out, Output::BbLbandIndicator, b.lband_indicator);
    }
    if let Some(p) = windows.atr {
        put(&mut out, Output::Atr, volatility::atr(h, l, c, p.window));
    }
    if let Some(p) = windows.keltner {
        let k = volatility::keltner(h, l, c, p.window, p.atr_window, p.multiplier, p.original);
        put(&mut out, Output::KcMband, k.mband);
        put(&mut out, Output::KcHband, k.hband);
        put(&mut out, Output::KcLband, k.lband);
        put(&mut out, Output::KcWband, k.wband);
        put(&mut out, Output::KcPband, k.pband);
    }
    if let Some(p) = windows.donchian {
        let d = volatility::donchian(h, l, c, p.window, p.offset);
        put(&mut out, Output::DcHband, d.hband);
        put(&mut out, Output::DcLband, d.lband);
        put(&mut out, Output::DcMband, d.mband);
        put(&mut out, Output::DcWband, d.wband);
        put(&mut out, Output::DcPband, d.pband);
    }
    if let Some(p) = windows.ulcer {
        put(&mut out, Output::UlcerIndex, volatility::ulcer_index(c, p.window));
    }

    // ---- volume ----
    if windows.obv.is_some() {
        put(&mut out, Output::Obv, volume::obv(c, v));
    }
    if windows.adl.is_some() {
        put(&mut out, Output::Adl, volume::acc_dist(h, l, c, v));
    }
    if let Some(p) = windows.cmf {
        put(&mut out, Output::Cmf, volume::cmf(h, l, c, v, p.window));
    }
    if let Some(p) = windows.force_index {
        let f = volume::force_index(c, v, p.window);
        put(&mut out, Output::ForceIndex, f.smoothed);
        put(&mut out, Output::ForceIndexRaw, f.raw);
    }
    if let Some(p) = windows.eom {
        let e = volume::ease_of_movement(h, l, v, p.window);
        put(&mut out, Output::Eom, e.eom);
        put(&mut out, Output::EomSma, e.sma);
    }
    if let Some(p) = windows.vpt {
        put(&mut out, Output::Vpt, volume::volume_price_trend(c, v, p.smoothing));
    }
    if let Some(p) = windows.mfi {
        put(&mut out, Output::Mfi, volume::mfi(h, l, c, v, p.window));
    }
    if windows.nvi.is_some() {
        put(&mut out, Output::Nvi, volume::nvi(c, v));
    }
    if let Some(p) = windows.vwap {
        put(&mut out, Output::Vwap, volume::vwap(h, l, c, v, p.window));
    }
    if let Some(p) = windows.chaikin_osc {
        put(&mut out, Output::ChaikinOsc, volume::chaikin_oscillator(h, l, c, v, p.fast, p.slow));
    }

    // ---- returns ----
    if windows.returns.is_some() {
        put(&mut out, Output::DailyReturn, returns::daily_return(c));
        put(&mut out, Output::DailyLogReturn, returns::daily_log_return(c));
        put(&mut out, Output::CumulativeReturn, returns::cumulative_return(c));
    }

    out
}

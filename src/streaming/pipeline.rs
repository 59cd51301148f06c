// =============================================================================
// Indicator Pipeline — one subscriber's streaming calculators
// =============================================================================
//
// Built from a validated `IndicatorWindows`, holding one calculator per
// requested family inline. A pipeline is owned by exactly one subscription
// and never shared.
//
// Closed candles are committed with `update`, which advances every
// calculator once. An in-progress candle goes through `preview`, which steps
// a scratch copy so the committed state only ever sees final values.
// Candles at or before the last committed open time are ignored, so replays
// and duplicate closes cannot advance the state twice.
// =============================================================================

use super::atr::AtrCalc;
use super::ema::EmaCalc;
use super::macd::{SpreadCalc, SpreadValue};
use super::rsi::RsiCalc;
use super::sma::SmaCalc;
use super::stoch::StochCalc;
use super::vwap::VwapCalc;
use crate::error::{EngineError, EngineResult};
use crate::types::{Candle, LiveCandle};
use crate::windows::{finite, Deltas, IndicatorWindows, Output};

#[derive(Debug, Clone)]
pub struct IndicatorPipeline {
    sma: Option<SmaCalc>,
    ema: Option<EmaCalc>,
    rsi: Option<RsiCalc>,
    macd: Option<SpreadCalc>,
    ppo: Option<SpreadCalc>,
    pvo: Option<SpreadCalc>,
    atr: Option<AtrCalc>,
    stoch: Option<StochCalc>,
    vwap: Option<VwapCalc>,
    last_committed: Option<i64>,
}

impl IndicatorPipeline {
    /// Rejects families that have no streaming calculator.
    pub fn new(windows: &IndicatorWindows) -> EngineResult<Self> {
        let unsupported = windows.streaming_unsupported();
        if !unsupported.is_empty() {
            return Err(EngineError::validation(format!(
                "no streaming calculator for: {}",
                unsupported.join(", ")
            )));
        }
        Ok(Self {
            sma: windows.sma.map(|p| SmaCalc::new(p.window)),
            ema: windows.ema.map(|p| EmaCalc::new(p.window)),
            rsi: windows.rsi.map(|p| RsiCalc::new(p.window)),
            macd: windows.macd.map(|p| SpreadCalc::macd(p.slow, p.fast, p.signal)),
            ppo: windows.ppo.map(|p| SpreadCalc::percentage(p.slow, p.fast, p.signal)),
            pvo: windows.pvo.map(|p| SpreadCalc::percentage(p.slow, p.fast, p.signal)),
            atr: windows.atr.map(|p| AtrCalc::new(p.window)),
            stoch: windows.stoch.map(|p| StochCalc::new(p.window, p.smooth)),
            vwap: windows.vwap.map(|p| VwapCalc::new(p.window)),
            last_committed: None,
        })
    }

    /// Open time of the last committed candle.
    pub fn last_committed(&self) -> Option<i64> {
        self.last_committed
    }

    fn is_stale(&self, t: i64) -> bool {
        self.last_committed.is_some_and(|last| t <= last)
    }

    /// Commit a closed candle. `None` if it is not newer than the last one.
    pub fn update(&mut self, candle: &Candle) -> Option<Deltas> {
        if self.is_stale(candle.t) {
            return None;
        }
        self.last_committed = Some(candle.t);
        Some(self.step(candle))
    }

    /// Values an in-progress candle would produce, without committing it.
    pub fn preview(&self, candle: &Candle) -> Option<Deltas> {
        if self.is_stale(candle.t) {
            return None;
        }
        let mut scratch = self.clone();
        Some(scratch.step(candle))
    }

    /// Commit when closed, preview otherwise.
    pub fn apply(&mut self, live: &LiveCandle) -> Option<Deltas> {
        if live.closed {
            self.update(&live.candle)
        } else {
            self.preview(&live.candle)
        }
    }

    /// Commit a run of historical closed candles; returns how many were used.
    pub fn seed(&mut self, candles: &[Candle]) -> usize {
        candles.iter().filter(|c| self.update(c).is_some()).count()
    }

    fn step(&mut self, c: &Candle) -> Deltas {
        let mut deltas = Deltas::new();

        if let Some(calc) = self.sma.as_mut() {
            put(&mut deltas, Output::Sma, calc.update(c.c));
        }
        if let Some(calc) = self.ema.as_mut() {
            put(&mut deltas, Output::Ema, calc.update(c.c));
        }
        if let Some(calc) = self.rsi.as_mut() {
            put(&mut deltas, Output::Rsi, calc.update(c.c));
        }
        if let Some(calc) = self.macd.as_mut() {
            put_spread(&mut deltas, [Output::Macd, Output::MacdSignal, Output::MacdHist], calc.update(c.c));
        }
        if let Some(calc) = self.ppo.as_mut() {
            put_spread(&mut deltas, [Output::Ppo, Output::PpoSignal, Output::PpoHist], calc.update(c.c));
        }
        if let Some(calc) = self.pvo.as_mut() {
            put_spread(&mut deltas, [Output::Pvo, Output::PvoSignal, Output::PvoHist], calc.update(c.v));
        }
        if let Some(calc) = self.atr.as_mut() {
            put(&mut deltas, Output::Atr, calc.update(c.h, c.l, c.c));
        }
        if let Some(calc) = self.stoch.as_mut() {
            let v = calc.update(c.h, c.l, c.c);
            put(&mut deltas, Output::StochK, v.k);
            put(&mut deltas, Output::StochD, v.d);
        }
        if let Some(calc) = self.vwap.as_mut() {
            put(&mut deltas, Output::Vwap, calc.update(c.typical_price(), c.v));
        }
        deltas
    }
}

fn put(deltas: &mut Deltas, key: Output, v: f64) {
    deltas.insert(key, finite(v));
}

fn put_spread(deltas: &mut Deltas, keys: [Output; 3], v: SpreadValue) {
    put(deltas, keys[0], v.line);
    put(deltas, keys[1], v.signal);
    put(deltas, keys[2], v.hist);
}

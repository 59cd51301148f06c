// =============================================================================
// Indicator Windows — request-side configuration and output naming
// =============================================================================
//
// `IndicatorWindows` names which indicator families a caller wants and with
// which parameters. Every family is optional; absent families are never
// computed. Parameters left out of a family object fall back to the python
// `ta` defaults, so `{"macd": {}}` is a valid request.
//
// `Output` is the closed set of series names an indicator family can emit.
// Batch results and streaming deltas are both keyed by it, which keeps the
// wire names (`macd_signal`, `bb_hband`, ...) in one place.
// =============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Per-candle indicator values pushed to a stream subscriber. NaN (warmup or
/// an undefined sentinel) is carried as `None` and serialised as `null`.
pub type Deltas = BTreeMap<Output, Option<f64>>;

/// Map a raw indicator value onto its wire form.
pub fn finite(v: f64) -> Option<f64> {
    if v.is_finite() {
        Some(v)
    } else {
        None
    }
}

// -----------------------------------------------------------------------------
// Output names
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Output {
    // momentum
    Rsi,
    StochK,
    StochD,
    Roc,
    Kama,
    Tsi,
    Uo,
    Ppo,
    PpoSignal,
    PpoHist,
    Pvo,
    PvoSignal,
    PvoHist,
    WilliamsR,
    StochRsi,
    StochRsiK,
    StochRsiD,
    Ao,
    // trend
    Sma,
    Ema,
    Wma,
    Macd,
    MacdSignal,
    MacdHist,
    Adx,
    AdxPos,
    AdxNeg,
    Cci,
    Trix,
    MassIndex,
    IchimokuConversion,
    IchimokuBase,
    IchimokuA,
    IchimokuB,
    IchimokuAVisual,
    IchimokuBVisual,
    IchimokuChikou,
    Stc,
    Dpo,
    Kst,
    KstSignal,
    KstDiff,
    AroonUp,
    AroonDown,
    AroonIndicator,
    VortexPos,
    VortexNeg,
    VortexDiff,
    Psar,
    PsarUp,
    PsarDown,
    PsarUpIndicator,
    PsarDownIndicator,
    // volatility
    BbMavg,
    BbHband,
    BbLband,
    BbWband,
    BbPband,
    BbHbandIndicator,
    BbLbandIndicator,
    Atr,
    KcMband,
    KcHband,
    KcLband,
    KcWband,
    KcPband,
    DcHband,
    DcLband,
    DcMband,
    DcWband,
    DcPband,
    UlcerIndex,
    // volume
    Obv,
    Adl,
    Cmf,
    ForceIndex,
    ForceIndexRaw,
    Eom,
    EomSma,
    Vpt,
    Mfi,
    Nvi,
    Vwap,
    ChaikinOsc,
    // returns
    DailyReturn,
    DailyLogReturn,
    CumulativeReturn,
}

// -----------------------------------------------------------------------------
// Parameter structs
// -----------------------------------------------------------------------------

macro_rules! window_params {
    ($($(#[$doc:meta])* $name:ident => $default:expr;)+) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
            #[serde(default, deny_unknown_fields)]
            pub struct $name {
                pub window: usize,
            }

            impl Default for $name {
                fn default() -> Self {
                    Self { window: $default }
                }
            }
        )+
    };
}

window_params! {
    RsiParams => 14;
    RocParams => 12;
    WilliamsRParams => 14;
    SmaParams => 20;
    EmaParams => 14;
    WmaParams => 9;
    AdxParams => 14;
    TrixParams => 15;
    DpoParams => 20;
    AroonParams => 25;
    VortexParams => 14;
    AtrParams => 14;
    UlcerParams => 14;
    CmfParams => 20;
    ForceIndexParams => 13;
    EomParams => 14;
    MfiParams => 14;
    VwapParams => 14;
}

/// Families without parameters are requested with an empty object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Enabled {}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StochParams {
    pub window: usize,
    pub smooth: usize,
}

impl Default for StochParams {
    fn default() -> Self {
        Self { window: 14, smooth: 3 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KamaParams {
    pub window: usize,
    pub pow1: usize,
    pub pow2: usize,
}

impl Default for KamaParams {
    fn default() -> Self {
        Self { window: 10, pow1: 2, pow2: 30 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TsiParams {
    pub slow: usize,
    pub fast: usize,
}

impl Default for TsiParams {
    fn default() -> Self {
        Self { slow: 25, fast: 13 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct UoParams {
    pub short: usize,
    pub medium: usize,
    pub long: usize,
    pub weight_short: f64,
    pub weight_medium: f64,
    pub weight_long: f64,
}

impl Default for UoParams {
    fn default() -> Self {
        Self {
            short: 7,
            medium: 14,
            long: 28,
            weight_short: 4.0,
            weight_medium: 2.0,
            weight_long: 1.0,
        }
    }
}

/// Fast/slow EMA spread plus signal line: MACD, PPO and PVO.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpreadParams {
    pub slow: usize,
    pub fast: usize,
    pub signal: usize,
}

impl Default for SpreadParams {
    fn default() -> Self {
        Self { slow: 26, fast: 12, signal: 9 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StochRsiParams {
    pub window: usize,
    pub smooth1: usize,
    pub smooth2: usize,
}

impl Default for StochRsiParams {
    fn default() -> Self {
        Self { window: 14, smooth1: 3, smooth2: 3 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AoParams {
    pub short: usize,
    pub long: usize,
}

impl Default for AoParams {
    fn default() -> Self {
        Self { short: 5, long: 34 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CciParams {
    pub window: usize,
    pub constant: f64,
}

impl Default for CciParams {
    fn default() -> Self {
        Self { window: 20, constant: 0.015 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MassIndexParams {
    pub fast: usize,
    pub slow: usize,
}

impl Default for MassIndexParams {
    fn default() -> Self {
        Self { fast: 9, slow: 25 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IchimokuParams {
    pub conversion: usize,
    pub base: usize,
    pub span: usize,
}

impl Default for IchimokuParams {
    fn default() -> Self {
        Self { conversion: 9, base: 26, span: 52 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StcParams {
    pub slow: usize,
    pub fast: usize,
    pub cycle: usize,
    pub smooth1: usize,
    pub smooth2: usize,
}

impl Default for StcParams {
    fn default() -> Self {
        Self { slow: 50, fast: 23, cycle: 10, smooth1: 3, smooth2: 3 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KstParams {
    pub roc1: usize,
    pub roc2: usize,
    pub roc3: usize,
    pub roc4: usize,
    pub window1: usize,
    pub window2: usize,
    pub window3: usize,
    pub window4: usize,
    pub signal: usize,
}

impl Default for KstParams {
    fn default() -> Self {
        Self {
            roc1: 10,
            roc2: 15,
            roc3: 20,
            roc4: 30,
            window1: 10,
            window2: 10,
            window3: 10,
            window4: 15,
            signal: 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct PsarParams {
    pub step: f64,
    pub max_step: f64,
}

impl Default for PsarParams {
    fn default() -> Self {
        Self { step: 0.02, max_step: 0.2 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BollingerParams {
    pub window: usize,
    pub dev: f64,
}

impl Default for BollingerParams {
    fn default() -> Self {
        Self { window: 20, dev: 2.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct KeltnerParams {
    pub window: usize,
    pub atr_window: usize,
    pub multiplier: f64,
    /// Typical-price SMA bands instead of EMA ± ATR.
    pub original: bool,
}

impl Default for KeltnerParams {
    fn default() -> Self {
        Self { window: 20, atr_window: 10, multiplier: 2.0, original: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DonchianParams {
    pub window: usize,
    pub offset: usize,
}

impl Default for DonchianParams {
    fn default() -> Self {
        Self { window: 20, offset: 0 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VptParams {
    /// SMA over the cumulative line; absent means the raw line.
    pub smoothing: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChaikinOscParams {
    pub fast: usize,
    pub slow: usize,
}

impl Default for ChaikinOscParams {
    fn default() -> Self {
        Self { fast: 3, slow: 10 }
    }
}

// -----------------------------------------------------------------------------
// IndicatorWindows
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IndicatorWindows {
    // momentum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsi: Option<RsiParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stoch: Option<StochParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roc: Option<RocParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kama: Option<KamaParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tsi: Option<TsiParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uo: Option<UoParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ppo: Option<SpreadParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pvo: Option<SpreadParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub williams_r: Option<WilliamsRParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stoch_rsi: Option<StochRsiParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ao: Option<AoParams>,
    // trend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sma: Option<SmaParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ema: Option<EmaParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wma: Option<WmaParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macd: Option<SpreadParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adx: Option<AdxParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cci: Option<CciParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trix: Option<TrixParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass_index: Option<MassIndexParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ichimoku: Option<IchimokuParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stc: Option<StcParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpo: Option<DpoParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kst: Option<KstParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aroon: Option<AroonParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vortex: Option<VortexParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psar: Option<PsarParams>,
    // volatility
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bollinger: Option<BollingerParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atr: Option<AtrParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keltner: Option<KeltnerParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donchian: Option<DonchianParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ulcer: Option<UlcerParams>,
    // volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obv: Option<Enabled>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adl: Option<Enabled>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmf: Option<CmfParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_index: Option<ForceIndexParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eom: Option<EomParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpt: Option<VptParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfi: Option<MfiParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nvi: Option<Enabled>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vwap: Option<VwapParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chaikin_osc: Option<ChaikinOscParams>,
    // returns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<Enabled>,
}

impl IndicatorWindows {
    /// Requested families with every integer period they carry.
    fn periods(&self) -> Vec<(&'static str, Vec<usize>)> {
        let mut out: Vec<(&'static str, Vec<usize>)> = Vec::new();
        macro_rules! family {
            ($field:ident, $name:literal, |$p:ident| $windows:expr) => {
                if let Some($p) = &self.$field {
                    out.push(($name, $windows));
                }
            };
        }

        family!(rsi, "rsi", |p| vec![p.window]);
        family!(stoch, "stoch", |p| vec![p.window, p.smooth]);
        family!(roc, "roc", |p| vec![p.window]);
        family!(kama, "kama", |p| vec![p.window, p.pow1, p.pow2]);
        family!(tsi, "tsi", |p| vec![p.slow, p.fast]);
        family!(uo, "uo", |p| vec![p.short, p.medium, p.long]);
        family!(ppo, "ppo", |p| vec![p.slow, p.fast, p.signal]);
        family!(pvo, "pvo", |p| vec![p.slow, p.fast, p.signal]);
        family!(williams_r, "williamsR", |p| vec![p.window]);
        family!(stoch_rsi, "stochRsi", |p| vec![p.window, p.smooth1, p.smooth2]);
        family!(ao, "ao", |p| vec![p.short, p.long]);
        family!(sma, "sma", |p| vec![p.window]);
        family!(ema, "ema", |p| vec![p.window]);
        family!(wma, "wma", |p| vec![p.window]);
        family!(macd, "macd", |p| vec![p.slow, p.fast, p.signal]);
        family!(adx, "adx", |p| vec![p.window]);
        family!(cci, "cci", |p| vec![p.window]);
        family!(trix, "trix", |p| vec![p.window]);
        family!(mass_index, "massIndex", |p| vec![p.fast, p.slow]);
        family!(ichimoku, "ichimoku", |p| vec![p.conversion, p.base, p.span]);
        family!(stc, "stc", |p| vec![p.slow, p.fast, p.cycle, p.smooth1, p.smooth2]);
        family!(dpo, "dpo", |p| vec![p.window]);
        family!(kst, "kst", |p| vec![
            p.roc1, p.roc2, p.roc3, p.roc4, p.window1, p.window2, p.window3, p.window4, p.signal,
        ]);
        family!(aroon, "aroon", |p| vec![p.window]);
        family!(vortex, "vortex", |p| vec![p.window]);
        family!(psar, "psar", |_p| vec![]);
        family!(bollinger, "bollinger", |p| vec![p.window]);
        family!(atr, "atr", |p| vec![p.window]);
        family!(keltner, "keltner", |p| vec![p.window, p.atr_window]);
        family!(donchian, "donchian", |p| vec![p.window]);
        family!(ulcer, "ulcer", |p| vec![p.window]);
        family!(obv, "obv", |_p| vec![]);
        family!(adl, "adl", |_p| vec![]);
        family!(cmf, "cmf", |p| vec![p.window]);
        family!(force_index, "forceIndex", |p| vec![p.window]);
        family!(eom, "eom", |p| vec![p.window]);
        family!(vpt, "vpt", |p| p.smoothing.into_iter().collect());
        family!(mfi, "mfi", |p| vec![p.window]);
        family!(nvi, "nvi", |_p| vec![]);
        family!(vwap, "vwap", |p| vec![p.window]);
        family!(chaikin_osc, "chaikinOsc", |p| vec![p.fast, p.slow]);
        family!(returns, "returns", |_p| vec![]);
        out
    }

    /// Names of the requested families, in declaration order.
    pub fn requested(&self) -> Vec<&'static str> {
        self.periods().into_iter().map(|(name, _)| name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.periods().is_empty()
    }

    /// The largest period among the requested windows (0 when none carry one).
    pub fn max_period(&self) -> usize {
        self.periods()
            .into_iter()
            .flat_map(|(_, windows)| windows)
            .max()
            .unwrap_or(0)
    }

    /// Reject zero, oversized and inconsistent parameters.
    pub fn validate(&self, max_window: usize) -> EngineResult<()> {
        for (name, windows) in self.periods() {
            for w in windows {
                if w == 0 {
                    return Err(EngineError::validation(format!("{name}: window must be positive")));
                }
                if w > max_window {
                    return Err(EngineError::RequestTooLarge(format!(
                        "{name}: window {w} exceeds maximum {max_window}"
                    )));
                }
            }
        }

        for (name, spread) in [("macd", &self.macd), ("ppo", &self.ppo), ("pvo", &self.pvo)] {
            if let Some(p) = spread {
                if p.fast >= p.slow {
                    return Err(EngineError::validation(format!(
                        "{name}: fast window {} must be below slow window {}",
                        p.fast, p.slow
                    )));
                }
            }
        }
        if let Some(p) = &self.kama {
            if p.pow1 >= p.pow2 {
                return Err(EngineError::validation("kama: pow1 must be below pow2"));
            }
        }
        if let Some(p) = &self.bollinger {
            check_positive("bollinger.dev", p.dev)?;
        }
        if let Some(p) = &self.keltner {
            check_positive("keltner.multiplier", p.multiplier)?;
        }
        if let Some(p) = &self.cci {
            check_positive("cci.constant", p.constant)?;
        }
        if let Some(p) = &self.uo {
            check_positive("uo.weightShort", p.weight_short)?;
            check_positive("uo.weightMedium", p.weight_medium)?;
            check_positive("uo.weightLong", p.weight_long)?;
        }
        if let Some(p) = &self.psar {
            check_positive("psar.step", p.step)?;
            if !(p.max_step.is_finite() && p.max_step >= p.step) {
                return Err(EngineError::validation("psar: maxStep must be at least step"));
            }
        }
        Ok(())
    }

    /// Families that have no incremental calculator.
    pub fn streaming_unsupported(&self) -> Vec<&'static str> {
        self.requested()
            .into_iter()
            .filter(|name| !STREAMING_FAMILIES.contains(name))
            .collect()
    }

    /// Validation for live subscriptions: the batch checks plus streaming
    /// support for every requested family.
    pub fn validate_streaming(&self, max_window: usize) -> EngineResult<()> {
        self.validate(max_window)?;
        let unsupported = self.streaming_unsupported();
        if unsupported.is_empty() {
            Ok(())
        } else {
            Err(EngineError::validation(format!(
                "no streaming calculator for: {}",
                unsupported.join(", ")
            )))
        }
    }
}

/// Families with an incremental calculator in `streaming`.
pub const STREAMING_FAMILIES: [&str; 9] =
    ["sma", "ema", "rsi", "macd", "ppo", "pvo", "atr", "stoch", "vwap"];

fn check_positive(name: &str, v: f64) -> EngineResult<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(EngineError::validation(format!("{name} must be a positive number")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_family_objects_take_defaults() {
        let w: IndicatorWindows =
            serde_json::from_str(r#"{"macd": {}, "bollinger": {"dev": 2.5}, "obv": {}}"#).unwrap();
        assert_eq!(w.macd, Some(SpreadParams { slow: 26, fast: 12, signal: 9 }));
        assert_eq!(w.bollinger.unwrap().window, 20);
        assert_eq!(w.bollinger.unwrap().dev, 2.5);
        assert!(w.obv.is_some());
        assert!(w.rsi.is_none());
        assert_eq!(w.requested(), vec!["macd", "bollinger", "obv"]);
    }

    #[test]
    fn unknown_family_is_rejected() {
        let err = serde_json::from_str::<IndicatorWindows>(r#"{"supertrend": {}}"#);
        assert!(err.is_err());
        let err = serde_json::from_str::<IndicatorWindows>(r#"{"rsi": {"period": 3}}"#);
        assert!(err.is_err());
    }

    #[test]
    fn camel_case_keys() {
        let w: IndicatorWindows =
            serde_json::from_str(r#"{"stochRsi": {}, "williamsR": {"window": 10}, "psar": {"maxStep": 0.3}}"#)
                .unwrap();
        assert!(w.stoch_rsi.is_some());
        assert_eq!(w.williams_r.unwrap().window, 10);
        assert_eq!(w.psar.unwrap().max_step, 0.3);
    }

    #[test]
    fn max_period_is_largest_window() {
        let w = IndicatorWindows {
            rsi: Some(RsiParams { window: 14 }),
            macd: Some(SpreadParams::default()),
            ..Default::default()
        };
        assert_eq!(w.max_period(), 26);
        assert_eq!(IndicatorWindows::default().max_period(), 0);
    }

    #[test]
    fn validation_rejects_bad_windows() {
        let zero = IndicatorWindows { rsi: Some(RsiParams { window: 0 }), ..Default::default() };
        assert_eq!(zero.validate(1000).unwrap_err().kind(), "validation");

        let huge = IndicatorWindows { sma: Some(SmaParams { window: 5000 }), ..Default::default() };
        assert_eq!(huge.validate(1000).unwrap_err().kind(), "request_too_large");

        let inverted = IndicatorWindows {
            macd: Some(SpreadParams { slow: 12, fast: 26, signal: 9 }),
            ..Default::default()
        };
        assert!(inverted.validate(1000).is_err());

        let neg_dev = IndicatorWindows {
            bollinger: Some(BollingerParams { window: 20, dev: -1.0 }),
            ..Default::default()
        };
        assert!(neg_dev.validate(1000).is_err());
    }

    #[test]
    fn streaming_support_is_checked() {
        let ok = IndicatorWindows {
            ema: Some(EmaParams::default()),
            stoch: Some(StochParams::default()),
            ..Default::default()
        };
        assert!(ok.validate_streaming(1000).is_ok());

        let batch_only = IndicatorWindows {
            ema: Some(EmaParams::default()),
            psar: Some(PsarParams::default()),
            ..Default::default()
        };
        assert_eq!(batch_only.streaming_unsupported(), vec!["psar"]);
        assert!(batch_only.validate_streaming(1000).is_err());
    }

    #[test]
    fn output_names_are_snake_case() {
        let mut deltas = Deltas::new();
        deltas.insert(Output::MacdSignal, Some(1.5));
        deltas.insert(Output::BbHband, None);
        let json = serde_json::to_value(&deltas).unwrap();
        assert_eq!(json["macd_signal"], 1.5);
        assert!(json["bb_hband"].is_null());
    }

    #[test]
    fn finite_maps_nan_to_none() {
        assert_eq!(finite(f64::NAN), None);
        assert_eq!(finite(f64::INFINITY), None);
        assert_eq!(finite(2.0), Some(2.0));
    }
}

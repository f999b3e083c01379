use crate::domain::preset::{PresetField, PresetName};
use anyhow::ensure;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_RSI_MIN: f64 = 40.0;
pub const DEFAULT_RSI_MAX: f64 = 70.0;
pub const DEFAULT_ADX_MIN: f64 = 20.0;
pub const DEFAULT_PE_MAX: f64 = 30.0;
pub const DEFAULT_ROCE_MIN: f64 = 15.0;
pub const DEFAULT_ROE_MIN: f64 = 15.0;
pub const DEFAULT_DE_MAX: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenerMode {
    Technical,
    Fundamental,
    Hybrid,
}

impl ScreenerMode {
    pub fn includes_technical(self) -> bool {
        matches!(self, ScreenerMode::Technical | ScreenerMode::Hybrid)
    }

    pub fn includes_fundamental(self) -> bool {
        matches!(self, ScreenerMode::Fundamental | ScreenerMode::Hybrid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScreenerMode::Technical => "technical",
            ScreenerMode::Fundamental => "fundamental",
            ScreenerMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for ScreenerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScreenerMode {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "technical" => Ok(ScreenerMode::Technical),
            "fundamental" => Ok(ScreenerMode::Fundamental),
            "hybrid" => Ok(ScreenerMode::Hybrid),
            _ => Err(ParseValueError::new("screener mode", s)),
        }
    }
}

/// Moving average the close price must be above.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmaReference {
    #[default]
    None,
    Ema20,
    Ema50,
    Ema200,
}

impl EmaReference {
    pub fn as_str(self) -> &'static str {
        match self {
            EmaReference::None => "none",
            EmaReference::Ema20 => "ema20",
            EmaReference::Ema50 => "ema50",
            EmaReference::Ema200 => "ema200",
        }
    }
}

impl fmt::Display for EmaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmaReference {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(EmaReference::None),
            "ema20" => Ok(EmaReference::Ema20),
            "ema50" => Ok(EmaReference::Ema50),
            "ema200" => Ok(EmaReference::Ema200),
            _ => Err(ParseValueError::new("EMA reference", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseValueError {
    pub kind: &'static str,
    pub input: String,
}

impl ParseValueError {
    pub fn new(kind: &'static str, input: &str) -> Self {
        Self {
            kind,
            input: input.to_string(),
        }
    }
}

impl fmt::Display for ParseValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {:?}", self.kind, self.input)
    }
}

impl std::error::Error for ParseValueError {}

/// Concrete thresholds for one run, after defaults and preset are resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thresholds {
    pub rsi_min: f64,
    pub rsi_max: f64,
    pub adx_min: f64,
    pub ema: EmaReference,
    pub pe_max: f64,
    pub roce_min: f64,
    pub roe_min: f64,
    pub de_max: f64,
    pub net_margin_min: Option<f64>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            rsi_min: DEFAULT_RSI_MIN,
            rsi_max: DEFAULT_RSI_MAX,
            adx_min: DEFAULT_ADX_MIN,
            ema: EmaReference::None,
            pe_max: DEFAULT_PE_MAX,
            roce_min: DEFAULT_ROCE_MIN,
            roe_min: DEFAULT_ROE_MIN,
            de_max: DEFAULT_DE_MAX,
            net_margin_min: None,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure_range("rsi_min", self.rsi_min, 0.0, 100.0)?;
        ensure_range("rsi_max", self.rsi_max, 0.0, 100.0)?;
        ensure!(
            self.rsi_min <= self.rsi_max,
            "rsi_min must be <= rsi_max (got {} > {})",
            self.rsi_min,
            self.rsi_max
        );
        ensure_range("adx_min", self.adx_min, 0.0, 60.0)?;
        ensure_range("pe_max", self.pe_max, 0.0, 200.0)?;
        ensure_range("roce_min", self.roce_min, 0.0, 50.0)?;
        ensure_range("roe_min", self.roe_min, 0.0, 50.0)?;
        ensure_range("de_max", self.de_max, 0.0, 5.0)?;
        if let Some(nm) = self.net_margin_min {
            ensure_range("net_margin_min", nm, 0.0, 100.0)?;
        }
        Ok(())
    }
}

/// The constraints a user selected for one run.
///
/// Threshold fields left as `None` fall back to the preset (hybrid mode only),
/// then to the documented defaults. Values the user set always win.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub mode: ScreenerMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adx_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema: Option<EmaReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pe_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roce_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roe_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub de_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_margin_min: Option<f64>,
    pub preset: PresetName,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::with_mode(ScreenerMode::Technical)
    }
}

/// Resolved thresholds, remembering which ones the preset supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveFilters {
    pub mode: ScreenerMode,
    pub thresholds: Thresholds,
    pub preset_fields: BTreeSet<PresetField>,
}

impl EffectiveFilters {
    pub fn from_preset(&self, field: PresetField) -> bool {
        self.preset_fields.contains(&field)
    }
}

impl FilterConfig {
    pub fn with_mode(mode: ScreenerMode) -> Self {
        Self {
            mode,
            rsi_min: None,
            rsi_max: None,
            adx_min: None,
            ema: None,
            pe_max: None,
            roce_min: None,
            roe_min: None,
            de_max: None,
            net_margin_min: None,
            preset: PresetName::Custom,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.effective().thresholds.validate()
    }

    /// Fields the user set explicitly.
    pub fn explicit_fields(&self) -> BTreeSet<PresetField> {
        [
            (PresetField::RsiMin, self.rsi_min.is_some()),
            (PresetField::RsiMax, self.rsi_max.is_some()),
            (PresetField::AdxMin, self.adx_min.is_some()),
            (PresetField::Ema, self.ema.is_some()),
            (PresetField::PeMax, self.pe_max.is_some()),
            (PresetField::RoceMin, self.roce_min.is_some()),
            (PresetField::RoeMin, self.roe_min.is_some()),
            (PresetField::DeMax, self.de_max.is_some()),
            (PresetField::NetMarginMin, self.net_margin_min.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect()
    }

    /// Resolves defaults, then the preset (hybrid mode only), then the
    /// explicit values on top.
    pub fn effective(&self) -> EffectiveFilters {
        let mut thresholds = Thresholds::default();
        let mut preset_fields = BTreeSet::new();

        if self.mode == ScreenerMode::Hybrid && self.preset != PresetName::Custom {
            let preset = self.preset.definition();
            thresholds = preset.apply(&thresholds);
            preset_fields = preset.fields();
        }

        let explicit = self.explicit_fields();
        preset_fields.retain(|f| !explicit.contains(f));

        let t = &mut thresholds;
        t.rsi_min = self.rsi_min.unwrap_or(t.rsi_min);
        t.rsi_max = self.rsi_max.unwrap_or(t.rsi_max);
        t.adx_min = self.adx_min.unwrap_or(t.adx_min);
        t.ema = self.ema.unwrap_or(t.ema);
        t.pe_max = self.pe_max.unwrap_or(t.pe_max);
        t.roce_min = self.roce_min.unwrap_or(t.roce_min);
        t.roe_min = self.roe_min.unwrap_or(t.roe_min);
        t.de_max = self.de_max.unwrap_or(t.de_max);
        t.net_margin_min = self.net_margin_min.or(t.net_margin_min);

        EffectiveFilters {
            mode: self.mode,
            thresholds,
            preset_fields,
        }
    }
}

fn ensure_range(field: &str, value: f64, min: f64, max: f64) -> anyhow::Result<()> {
    ensure!(
        value.is_finite() && (min..=max).contains(&value),
        "{field} must be within {min}..={max} (got {value})"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let t = FilterConfig::default().effective().thresholds;
        assert_eq!((t.rsi_min, t.rsi_max), (40.0, 70.0));
        assert_eq!(t.adx_min, 20.0);
        assert_eq!(t.ema, EmaReference::None);
        assert_eq!(t.pe_max, 30.0);
        assert_eq!(t.roce_min, 15.0);
        assert_eq!(t.roe_min, 15.0);
        assert_eq!(t.de_max, 1.0);
        assert_eq!(t.net_margin_min, None);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_rsi_range() {
        let cfg = FilterConfig {
            rsi_min: Some(70.0),
            rsi_max: Some(40.0),
            ..FilterConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("rsi_min must be <= rsi_max"));
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        let cfg = FilterConfig {
            de_max: Some(7.5),
            ..FilterConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = FilterConfig {
            pe_max: Some(f64::NAN),
            ..FilterConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn preset_is_ignored_outside_hybrid_mode() {
        let cfg = FilterConfig {
            mode: ScreenerMode::Technical,
            preset: PresetName::Swing,
            ..FilterConfig::default()
        };
        let eff = cfg.effective();
        assert_eq!(eff.thresholds, Thresholds::default());
        assert!(eff.preset_fields.is_empty());
    }

    #[test]
    fn explicit_values_win_over_preset() {
        let cfg = FilterConfig {
            mode: ScreenerMode::Hybrid,
            preset: PresetName::Value,
            pe_max: Some(25.0),
            ..FilterConfig::default()
        };
        let eff = cfg.effective();

        assert_eq!(eff.thresholds.pe_max, 25.0);
        assert!(!eff.from_preset(PresetField::PeMax));
        // Value preset fields the user left alone.
        assert_eq!(eff.thresholds.de_max, 0.6);
        assert_eq!(eff.thresholds.roce_min, 15.0);
        assert!(eff.from_preset(PresetField::DeMax));
        assert!(eff.from_preset(PresetField::RoceMin));
    }

    #[test]
    fn one_explicit_rsi_bound_keeps_the_other_from_preset() {
        let cfg = FilterConfig {
            mode: ScreenerMode::Hybrid,
            preset: PresetName::Swing,
            rsi_min: Some(50.0),
            ..FilterConfig::default()
        };
        let eff = cfg.effective();

        assert_eq!((eff.thresholds.rsi_min, eff.thresholds.rsi_max), (50.0, 65.0));
        assert!(!eff.from_preset(PresetField::RsiMin));
        assert!(eff.from_preset(PresetField::RsiMax));
    }

    #[test]
    fn parses_mode_and_ema_case_insensitively() {
        assert_eq!("Hybrid".parse::<ScreenerMode>().unwrap(), ScreenerMode::Hybrid);
        assert_eq!("EMA200".parse::<EmaReference>().unwrap(), EmaReference::Ema200);
        assert!("weekly".parse::<ScreenerMode>().is_err());
    }

    #[test]
    fn deserializes_sparse_json_with_defaults() {
        let cfg: FilterConfig = serde_json::from_value(serde_json::json!({
            "mode": "hybrid",
            "preset": "value",
            "pe_max": 25.0
        }))
        .unwrap();
        assert_eq!(cfg.mode, ScreenerMode::Hybrid);
        assert_eq!(cfg.pe_max, Some(25.0));
        assert_eq!(cfg.roe_min, None);

        let t = cfg.effective().thresholds;
        assert_eq!(t.pe_max, 25.0);
        assert_eq!(t.de_max, 0.6);
        assert_eq!(t.roe_min, DEFAULT_ROE_MIN);
    }
}

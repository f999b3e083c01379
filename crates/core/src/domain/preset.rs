use crate::domain::filter::{EmaReference, ParseValueError, Thresholds};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetName {
    #[default]
    Custom,
    Swing,
    Positional,
    Value,
    Quality,
}

impl PresetName {
    pub const ALL: [PresetName; 5] = [
        PresetName::Custom,
        PresetName::Swing,
        PresetName::Positional,
        PresetName::Value,
        PresetName::Quality,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PresetName::Custom => "custom",
            PresetName::Swing => "swing",
            PresetName::Positional => "positional",
            PresetName::Value => "value",
            PresetName::Quality => "quality",
        }
    }

    pub fn definition(self) -> Preset {
        match self {
            PresetName::Custom => Preset::empty(self),
            PresetName::Swing => Preset {
                rsi: Some((45.0, 65.0)),
                adx_min: Some(20.0),
                ema: Some(EmaReference::Ema50),
                ..Preset::empty(self)
            },
            PresetName::Positional => Preset {
                adx_min: Some(25.0),
                ema: Some(EmaReference::Ema200),
                roce_min: Some(18.0),
                de_max: Some(0.6),
                ..Preset::empty(self)
            },
            PresetName::Value => Preset {
                pe_max: Some(20.0),
                de_max: Some(0.6),
                roce_min: Some(15.0),
                ..Preset::empty(self)
            },
            PresetName::Quality => Preset {
                roe_min: Some(18.0),
                net_margin_min: Some(12.0),
                ..Preset::empty(self)
            },
        }
    }
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresetName {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PresetName::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseValueError::new("preset", s))
    }
}

/// Filter fields a preset may override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetField {
    RsiMin,
    RsiMax,
    AdxMin,
    Ema,
    PeMax,
    RoceMin,
    RoeMin,
    DeMax,
    NetMarginMin,
}

/// A named, sparse override of filter values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preset {
    pub name: PresetName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<(f64, f64)>,
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
}

impl Preset {
    fn empty(name: PresetName) -> Self {
        Self {
            name,
            rsi: None,
            adx_min: None,
            ema: None,
            pe_max: None,
            roce_min: None,
            roe_min: None,
            de_max: None,
            net_margin_min: None,
        }
    }

    pub fn fields(&self) -> BTreeSet<PresetField> {
        let mut out = BTreeSet::new();
        if self.rsi.is_some() {
            out.insert(PresetField::RsiMin);
            out.insert(PresetField::RsiMax);
        }
        if self.adx_min.is_some() {
            out.insert(PresetField::AdxMin);
        }
        if self.ema.is_some() {
            out.insert(PresetField::Ema);
        }
        if self.pe_max.is_some() {
            out.insert(PresetField::PeMax);
        }
        if self.roce_min.is_some() {
            out.insert(PresetField::RoceMin);
        }
        if self.roe_min.is_some() {
            out.insert(PresetField::RoeMin);
        }
        if self.de_max.is_some() {
            out.insert(PresetField::DeMax);
        }
        if self.net_margin_min.is_some() {
            out.insert(PresetField::NetMarginMin);
        }
        out
    }

    pub fn apply(&self, base: &Thresholds) -> Thresholds {
        let (rsi_min, rsi_max) = self.rsi.unwrap_or((base.rsi_min, base.rsi_max));
        Thresholds {
            rsi_min,
            rsi_max,
            adx_min: self.adx_min.unwrap_or(base.adx_min),
            ema: self.ema.unwrap_or(base.ema),
            pe_max: self.pe_max.unwrap_or(base.pe_max),
            roce_min: self.roce_min.unwrap_or(base.roce_min),
            roe_min: self.roe_min.unwrap_or(base.roe_min),
            de_max: self.de_max.unwrap_or(base.de_max),
            net_margin_min: self.net_margin_min.or(base.net_margin_min),
        }
    }
}

/// Operators used for thresholds that came from a preset.
///
/// `Inclusive` matches the manual inputs (`>=` / `<=`). `Strict` uses `>` / `<`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetComparison {
    #[default]
    Inclusive,
    Strict,
}

impl PresetComparison {
    pub fn as_str(self) -> &'static str {
        match self {
            PresetComparison::Inclusive => "inclusive",
            PresetComparison::Strict => "strict",
        }
    }
}

impl fmt::Display for PresetComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresetComparison {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inclusive" => Ok(PresetComparison::Inclusive),
            "strict" => Ok(PresetComparison::Strict),
            _ => Err(ParseValueError::new("preset comparison", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::{FilterConfig, ScreenerMode};

    #[test]
    fn custom_preset_defines_no_fields() {
        assert!(PresetName::Custom.definition().fields().is_empty());
    }

    #[test]
    fn applying_preset_only_touches_defined_fields() {
        let base = Thresholds {
            rsi_min: 30.0,
            rsi_max: 80.0,
            adx_min: 10.0,
            pe_max: 45.0,
            roe_min: 22.0,
            ..Thresholds::default()
        };

        let applied = PresetName::Value.definition().apply(&base);
        assert_eq!(applied.pe_max, 20.0);
        assert_eq!(applied.de_max, 0.6);
        assert_eq!(applied.roce_min, 15.0);

        // Not part of the Value preset.
        assert_eq!((applied.rsi_min, applied.rsi_max), (30.0, 80.0));
        assert_eq!(applied.adx_min, 10.0);
        assert_eq!(applied.roe_min, 22.0);
        assert_eq!(applied.ema, EmaReference::None);
    }

    #[test]
    fn every_preset_applies_exactly_its_fields() {
        let base = Thresholds::default();
        for name in PresetName::ALL {
            let preset = name.definition();
            let applied = preset.apply(&base);
            let fields = preset.fields();

            if !fields.contains(&PresetField::AdxMin) {
                assert_eq!(applied.adx_min, base.adx_min, "{name}");
            }
            if !fields.contains(&PresetField::Ema) {
                assert_eq!(applied.ema, base.ema, "{name}");
            }
            if !fields.contains(&PresetField::PeMax) {
                assert_eq!(applied.pe_max, base.pe_max, "{name}");
            }
            if !fields.contains(&PresetField::RsiMin) {
                assert_eq!((applied.rsi_min, applied.rsi_max), (base.rsi_min, base.rsi_max));
            }
            if !fields.contains(&PresetField::NetMarginMin) {
                assert_eq!(applied.net_margin_min, None, "{name}");
            }
        }
    }

    #[test]
    fn quality_preset_sets_net_margin() {
        let cfg = FilterConfig {
            mode: ScreenerMode::Hybrid,
            preset: PresetName::Quality,
            ..FilterConfig::default()
        };
        let eff = cfg.effective();
        assert_eq!(eff.thresholds.net_margin_min, Some(12.0));
        assert_eq!(eff.thresholds.roe_min, 18.0);
        assert!(eff.from_preset(PresetField::NetMarginMin));
        assert!(!eff.from_preset(PresetField::PeMax));
    }

    #[test]
    fn parses_names_and_comparison() {
        assert_eq!("Swing".parse::<PresetName>().unwrap(), PresetName::Swing);
        assert!("momentum".parse::<PresetName>().is_err());
        assert_eq!(
            "STRICT".parse::<PresetComparison>().unwrap(),
            PresetComparison::Strict
        );
    }
}

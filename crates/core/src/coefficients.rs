//! Situational coefficient sets and their resolution against site conditions.
//!
//! A [`CoefficientSet`] lists factor rules in evaluation order. Resolution
//! yields only the factors whose triggering condition holds; absent factors
//! are left out rather than recorded at 1.0.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Name reserved for the informational unit entry of a breakdown.
pub const BASE_FACTOR: &str = "base";

// ---------------------------------------------------------------------------
// Factor rules
// ---------------------------------------------------------------------------

/// One named situational factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorRule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub kind: FactorKind,
}

/// How a factor is triggered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FactorKind {
    /// Applies when the flag is present in the site conditions.
    Flag { multiplier: Decimal },
    /// Keyed by a discrete band value, e.g. seismicity `"8"`.
    Band { bands: BTreeMap<String, Decimal> },
    /// Keyed by line quantity; the first step with `quantity <= up_to` applies.
    Volume { steps: Vec<VolumeStep> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeStep {
    pub up_to: Decimal,
    pub multiplier: Decimal,
}

// ---------------------------------------------------------------------------
// Site conditions
// ---------------------------------------------------------------------------

/// Situational facts that gate coefficient factors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConditions {
    /// Boolean factors that hold, e.g. `winter`, `remote`.
    #[serde(default)]
    pub flags: BTreeSet<String>,
    /// Banded factors and their band, e.g. `seismicity -> "8"`.
    #[serde(default)]
    pub bands: BTreeMap<String, String>,
}

impl SiteConditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flag(mut self, name: impl Into<String>) -> Self {
        self.flags.insert(name.into());
        self
    }

    pub fn with_band(mut self, name: impl Into<String>, band: impl Into<String>) -> Self {
        self.bands.insert(name.into(), band.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Coefficient sets
// ---------------------------------------------------------------------------

/// Factors applicable to one section under one normative version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoefficientSet {
    pub section: String,
    #[serde(default)]
    pub title: String,
    pub factors: Vec<FactorRule>,
}

/// Factors that hold for a request, in evaluation order, plus the
/// conditions that could not be honoured.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedFactors {
    pub factors: IndexMap<String, Decimal>,
    pub warnings: Vec<String>,
}

impl CoefficientSet {
    pub fn factor(&self, name: &str) -> Option<&FactorRule> {
        self.factors.iter().find(|f| f.name == name)
    }

    /// Load-time integrity checks.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut names = HashSet::new();
        for rule in &self.factors {
            let name = rule.name.as_str();
            if name.is_empty() || name == BASE_FACTOR {
                return Err(CoreError::DataIntegrity(format!(
                    "coefficient set '{}' uses reserved or empty factor name '{name}'",
                    self.section
                )));
            }
            if !names.insert(name) {
                return Err(CoreError::DataIntegrity(format!(
                    "coefficient set '{}' defines factor '{name}' twice",
                    self.section
                )));
            }
            let multipliers: Vec<Decimal> = match &rule.kind {
                FactorKind::Flag { multiplier } => vec![*multiplier],
                FactorKind::Band { bands } => bands.values().copied().collect(),
                FactorKind::Volume { steps } => {
                    if steps.is_empty() {
                        return Err(CoreError::DataIntegrity(format!(
                            "volume factor '{name}' has no steps"
                        )));
                    }
                    if steps.windows(2).any(|w| w[0].up_to >= w[1].up_to) {
                        return Err(CoreError::DataIntegrity(format!(
                            "volume factor '{name}' steps must be strictly ascending"
                        )));
                    }
                    steps.iter().map(|s| s.multiplier).collect()
                }
            };
            if let Some(bad) = multipliers.iter().find(|m| **m <= Decimal::ZERO) {
                return Err(CoreError::DataIntegrity(format!(
                    "factor '{name}' has non-positive multiplier {bad}"
                )));
            }
        }
        Ok(())
    }

    /// Resolve the factors that hold for `conditions`.
    ///
    /// Volume factors are only considered when a line `quantity` is given.
    /// Flags or bands the set does not define, and bands without a
    /// multiplier, are reported as warnings and otherwise ignored.
    pub fn resolve(&self, conditions: &SiteConditions, quantity: Option<Decimal>) -> ResolvedFactors {
        let mut resolved = ResolvedFactors::default();

        for rule in &self.factors {
            match &rule.kind {
                FactorKind::Flag { multiplier } => {
                    if conditions.flags.contains(&rule.name) {
                        resolved.factors.insert(rule.name.clone(), *multiplier);
                    }
                }
                FactorKind::Band { bands } => {
                    if let Some(band) = conditions.bands.get(&rule.name) {
                        match bands.get(band) {
                            Some(multiplier) => {
                                resolved.factors.insert(rule.name.clone(), *multiplier);
                            }
                            None => resolved.warnings.push(format!(
                                "Factor '{}' has no multiplier for band '{band}'; ignored",
                                rule.name
                            )),
                        }
                    }
                }
                FactorKind::Volume { steps } => {
                    if let Some(step) = quantity.and_then(|q| steps.iter().find(|s| q <= s.up_to)) {
                        resolved.factors.insert(rule.name.clone(), step.multiplier);
                    }
                }
            }
        }

        for name in conditions.flags.iter().chain(conditions.bands.keys()) {
            if self.factor(name).is_none() {
                resolved.warnings.push(format!(
                    "Factor '{name}' is not defined for section '{}'; ignored",
                    self.section
                ));
            }
        }

        resolved
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn inspection_set() -> CoefficientSet {
        serde_json::from_value(serde_json::json!({
            "section": "inspection",
            "factors": [
                { "name": "winter", "kind": "flag", "multiplier": 1.25 },
                { "name": "seismicity", "kind": "band", "bands": { "7": 1.1, "8": 1.3, "9": 1.5 } },
                { "name": "smallVolume", "kind": "volume", "steps": [
                    { "upTo": 2, "multiplier": 3.5 },
                    { "upTo": 5, "multiplier": 2.8 }
                ] }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn parses_and_validates() {
        assert!(inspection_set().validate().is_ok());
    }

    #[test]
    fn absent_flag_is_excluded() {
        let r = inspection_set().resolve(&SiteConditions::new(), None);
        assert!(r.factors.is_empty());
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn flags_and_bands_resolve_in_set_order() {
        let cond = SiteConditions::new()
            .with_band("seismicity", "8")
            .with_flag("winter");
        let r = inspection_set().resolve(&cond, None);
        let names: Vec<&str> = r.factors.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["winter", "seismicity"]);
        assert_eq!(r.factors["seismicity"], dec!(1.3));
    }

    #[test]
    fn volume_steps_pick_first_matching_threshold() {
        let set = inspection_set();
        let cond = SiteConditions::new();
        assert_eq!(set.resolve(&cond, Some(dec!(1))).factors["smallVolume"], dec!(3.5));
        assert_eq!(set.resolve(&cond, Some(dec!(5))).factors["smallVolume"], dec!(2.8));
        assert!(set.resolve(&cond, Some(dec!(10))).factors.is_empty());
    }

    #[test]
    fn unknown_band_value_becomes_warning() {
        let cond = SiteConditions::new().with_band("seismicity", "6");
        let r = inspection_set().resolve(&cond, None);
        assert!(r.factors.is_empty());
        assert_eq!(r.warnings.len(), 1);
        assert!(r.warnings[0].contains("band '6'"));
    }

    #[test]
    fn undefined_flag_becomes_warning() {
        let cond = SiteConditions::new().with_flag("permafrost");
        let r = inspection_set().resolve(&cond, None);
        assert!(r.factors.is_empty());
        assert!(r.warnings[0].contains("permafrost"));
    }

    #[test]
    fn reserved_base_name_rejected() {
        let mut set = inspection_set();
        set.factors[0].name = BASE_FACTOR.to_string();
        assert!(set.validate().is_err());
    }

    #[test]
    fn descending_steps_rejected() {
        let mut set = inspection_set();
        set.factors[2].kind = FactorKind::Volume {
            steps: vec![
                VolumeStep { up_to: dec!(5), multiplier: dec!(2.8) },
                VolumeStep { up_to: dec!(2), multiplier: dec!(3.5) },
            ],
        };
        assert!(set.validate().is_err());
    }
}

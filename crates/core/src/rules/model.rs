//! Instruction blocks, variants and work templates.

use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::condition::{lookup, Condition};
use crate::error::CoreError;
use crate::tables::{CriterionKey, Criteria};
use crate::types::NormVersion;
use crate::work::{PricingRef, WorkCategory, WorkItem};

/// All instruction blocks of one rule-set version, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    pub version: NormVersion,
    #[serde(default)]
    pub title: String,
    pub blocks: Vec<InstructionBlock>,
}

/// A named rule unit selecting at most one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionBlock {
    pub id: String,
    pub name: String,
    /// The block is expected to apply to every project; strict evaluation
    /// warns when none of its variants hold.
    #[serde(default)]
    pub mandatory: bool,
    pub variants: Vec<Variant>,
}

/// One candidate outcome of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: String,
    /// Higher wins.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub when: Condition,
    #[serde(default)]
    pub works: Vec<WorkTemplate>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Shape of a work item emitted by a variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkTemplate {
    pub id: String,
    pub name: String,
    pub quantity: QuantitySpec,
    pub unit: String,
    pub category: WorkCategory,
    pub module: String,
    #[serde(default)]
    pub normative_ref: Option<String>,
    #[serde(default)]
    pub pricing: Option<PricingTemplate>,
}

/// How a work quantity is obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuantitySpec {
    Fixed {
        fixed: Decimal,
    },
    /// `value(field) × factor`, raised to `min`; `default` when the field
    /// is absent.
    Field {
        field: String,
        #[serde(default)]
        factor: Option<Decimal>,
        #[serde(default)]
        min: Option<Decimal>,
        #[serde(default)]
        default: Option<Decimal>,
    },
}

/// Pricing reference with criteria that may be read from the project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingTemplate {
    pub section: String,
    pub table_code: String,
    pub criteria: BTreeMap<CriterionKey, CriterionSource>,
}

/// Where a criterion value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CriterionSource {
    Literal(String),
    /// Numeric field mapped to a band label: the first step whose `upTo`
    /// is not exceeded, or the open-ended last step.
    Banded { field: String, bands: Vec<BandStep> },
    /// Field value used verbatim (numbers are formatted).
    Field { field: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandStep {
    #[serde(default, deserialize_with = "crate::number::optional")]
    pub up_to: Option<f64>,
    pub value: String,
}

// ---------------------------------------------------------------------------
// Load-time validation
// ---------------------------------------------------------------------------

impl RuleSet {
    /// Static integrity checks so malformed blocks surface at load time.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut block_ids = HashSet::new();
        for block in &self.blocks {
            if !block_ids.insert(block.id.as_str()) {
                return Err(CoreError::DataIntegrity(format!(
                    "rule set {} declares block '{}' twice",
                    self.version, block.id
                )));
            }
            block.validate()?;
        }
        Ok(())
    }

    pub fn block(&self, id: &str) -> Option<&InstructionBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }
}

impl InstructionBlock {
    pub fn validate(&self) -> Result<(), CoreError> {
        let fail = |reason: String| {
            CoreError::DataIntegrity(format!("block '{}': {reason}", self.id))
        };
        if self.id.trim().is_empty() {
            return Err(CoreError::DataIntegrity("block with empty id".to_string()));
        }
        if self.variants.is_empty() {
            return Err(fail("has no variants".to_string()));
        }
        let mut variant_ids = HashSet::new();
        for variant in &self.variants {
            if !variant_ids.insert(variant.id.as_str()) {
                return Err(fail(format!("variant '{}' declared twice", variant.id)));
            }
            variant
                .when
                .validate()
                .map_err(|e| fail(format!("variant '{}': {e}", variant.id)))?;
            for work in &variant.works {
                work.validate()
                    .map_err(|e| fail(format!("variant '{}', work '{}': {e}", variant.id, work.id)))?;
            }
        }
        Ok(())
    }
}

impl WorkTemplate {
    fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("work id is empty".to_string());
        }
        match &self.quantity {
            QuantitySpec::Fixed { fixed } if *fixed <= Decimal::ZERO => {
                Err("fixed quantity must be positive".to_string())
            }
            QuantitySpec::Field { field, .. } if field.trim().is_empty() => {
                Err("quantity field is empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Materialization
// ---------------------------------------------------------------------------

/// Parse a JSON number or numeric string as an exact decimal.
pub fn decimal_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

impl QuantitySpec {
    pub fn resolve(&self, facts: &Map<String, Value>) -> Result<Decimal, String> {
        match self {
            Self::Fixed { fixed } => Ok(*fixed),
            Self::Field {
                field,
                factor,
                min,
                default,
            } => {
                let base = match lookup(facts, field).filter(|v| !v.is_null()) {
                    Some(value) => decimal_from_json(value)
                        .ok_or_else(|| format!("quantity field '{field}' is not numeric"))?,
                    None => {
                        default.ok_or_else(|| format!("quantity field '{field}' is missing"))?
                    }
                };
                let scaled = base
                    .checked_mul(factor.unwrap_or(Decimal::ONE))
                    .ok_or_else(|| format!("quantity field '{field}' is out of range"))?;
                Ok(match min {
                    Some(min) if scaled < *min => *min,
                    _ => scaled,
                })
            }
        }
    }
}

impl CriterionSource {
    fn resolve(&self, facts: &Map<String, Value>) -> Option<String> {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::Field { field } => match lookup(facts, field)? {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            },
            Self::Banded { field, bands } => {
                let x = lookup(facts, field)?.as_f64()?;
                bands
                    .iter()
                    .find(|step| step.up_to.map_or(true, |limit| x <= limit))
                    .map(|step| step.value.clone())
            }
        }
    }
}

impl PricingTemplate {
    /// Resolve the criteria against `facts`; `None` when a source is missing.
    pub fn resolve(&self, facts: &Map<String, Value>) -> Option<PricingRef> {
        let criteria = self
            .criteria
            .iter()
            .map(|(key, source)| source.resolve(facts).map(|value| (*key, value)))
            .collect::<Option<Criteria>>()?;
        Some(PricingRef {
            section: self.section.clone(),
            table_code: self.table_code.clone(),
            criteria,
        })
    }
}

impl WorkTemplate {
    /// Build the concrete work item for a project.
    ///
    /// Returns the item plus a warning when its pricing reference could not
    /// be resolved; the item is still emitted, just unpriced.
    pub fn materialize(
        &self,
        facts: &Map<String, Value>,
        block_id: &str,
    ) -> Result<(WorkItem, Option<String>), String> {
        let quantity = self.quantity.resolve(facts)?;
        let (pricing, warning) = match &self.pricing {
            None => (None, None),
            Some(template) => match template.resolve(facts) {
                Some(pricing) => (Some(pricing), None),
                None => (
                    None,
                    Some(format!(
                        "Work '{}' cannot be priced: project data needed for table {}/{} is missing",
                        self.id, template.section, template.table_code
                    )),
                ),
            },
        };
        let item = WorkItem {
            id: self.id.clone(),
            name: self.name.clone(),
            quantity,
            unit: self.unit.clone(),
            category: self.category,
            module: self.module.clone(),
            normative_ref: self.normative_ref.clone(),
            selected: self.category.selected_by_default(),
            pricing,
            source_block: block_id.to_string(),
        };
        Ok((item, warning))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    fn facts(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn template(value: Value) -> WorkTemplate {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn quantity_from_field_with_factor_and_min() {
        let spec: QuantitySpec =
            serde_json::from_value(json!({ "field": "areaHa", "factor": 0.5, "min": 1 })).unwrap();
        assert_eq!(spec.resolve(&facts(json!({ "areaHa": 12.4 }))).unwrap(), dec!(6.2));
        assert_eq!(spec.resolve(&facts(json!({ "areaHa": 1 }))).unwrap(), dec!(1));
    }

    #[test]
    fn quantity_default_used_when_field_absent() {
        let spec: QuantitySpec =
            serde_json::from_value(json!({ "field": "lengthKm", "default": 1 })).unwrap();
        assert_eq!(spec.resolve(&Map::new()).unwrap(), dec!(1));

        let strict: QuantitySpec = serde_json::from_value(json!({ "field": "lengthKm" })).unwrap();
        assert!(strict.resolve(&Map::new()).unwrap_err().contains("missing"));
    }

    #[test]
    fn scaled_quantity_out_of_range_is_error() {
        let spec: QuantitySpec =
            serde_json::from_value(json!({ "field": "buildingVolumeM3", "factor": 2 })).unwrap();
        let f = facts(json!({ "buildingVolumeM3": "79228162514264337593543950335" }));
        assert!(spec.resolve(&f).unwrap_err().contains("out of range"));
    }

    #[test]
    fn fixed_quantity_parses() {
        let spec: QuantitySpec = serde_json::from_value(json!({ "fixed": 3 })).unwrap();
        assert_eq!(spec, QuantitySpec::Fixed { fixed: dec!(3) });
    }

    #[test]
    fn pricing_resolves_literal_field_and_band() {
        let t = template(json!({
            "id": "IN-01",
            "name": "Inspection of structures",
            "quantity": { "field": "buildingVolumeM3", "factor": 0.01 },
            "unit": "100 m3",
            "category": "mandatory",
            "module": "inspection",
            "pricing": {
                "section": "inspection",
                "tableCode": "1",
                "criteria": {
                    "category": { "field": "complexityCategory" },
                    "heightBand": { "field": "floors", "bands": [
                        { "upTo": 3, "value": "up_to_10m" },
                        { "upTo": 6, "value": "10_to_20m" },
                        { "value": "over_20m" }
                    ] }
                }
            }
        }));
        let f = facts(json!({ "buildingVolumeM3": 2500, "floors": 9, "complexityCategory": "II" }));
        let (item, warning) = t.materialize(&f, "inspection").unwrap();
        assert!(warning.is_none());
        assert_eq!(item.quantity, dec!(25));
        assert!(item.selected);
        let pricing = item.pricing.unwrap();
        assert_eq!(pricing.criteria.get(CriterionKey::HeightBand), Some("over_20m"));
        assert_eq!(pricing.criteria.get(CriterionKey::Category), Some("II"));
    }

    #[test]
    fn unresolvable_pricing_is_a_warning_not_an_error() {
        let t = template(json!({
            "id": "GD-01",
            "name": "Topographic survey",
            "quantity": { "fixed": 1 },
            "unit": "ha",
            "category": "recommended",
            "module": "geodesy",
            "pricing": {
                "section": "geodesy",
                "tableCode": "9",
                "criteria": { "scale": { "field": "surveyScale" } }
            }
        }));
        let (item, warning) = t.materialize(&Map::new(), "topography").unwrap();
        assert!(item.pricing.is_none());
        assert!(!item.selected);
        assert!(warning.unwrap().contains("GD-01"));
    }

    #[test]
    fn duplicate_block_ids_rejected() {
        let set: RuleSet = serde_json::from_value(json!({
            "version": "2025",
            "blocks": [
                { "id": "a", "name": "A", "variants": [{ "id": "v" }] },
                { "id": "a", "name": "A again", "variants": [{ "id": "v" }] }
            ]
        }))
        .unwrap();
        assert!(set.validate().is_err());
    }

    #[test]
    fn block_without_variants_rejected() {
        let set: RuleSet = serde_json::from_value(json!({
            "version": "2025",
            "blocks": [{ "id": "a", "name": "A", "variants": [] }]
        }))
        .unwrap();
        assert!(set.validate().unwrap_err().to_string().contains("no variants"));
    }

    #[test]
    fn decimal_from_json_is_exact() {
        assert_eq!(decimal_from_json(&json!(0.1)), Some(dec!(0.1)));
        assert_eq!(decimal_from_json(&json!("12.50")), Some(dec!(12.50)));
        assert_eq!(decimal_from_json(&json!(true)), None);
    }
}

//! Cost estimation over normative price tables.
//!
//! Unit prices are looked up by exact criteria, situational coefficients are
//! composed multiplicatively, and every line cost is rounded half-up to two
//! decimal places. The estimate total is the sum of rounded line costs.

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::Arc;

use indexmap::IndexMap;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::coefficients::{CoefficientSet, SiteConditions, BASE_FACTOR};
use crate::error::CoreError;
use crate::tables::{Criteria, PriceTable, PriceTableRow};
use crate::threshold_validation::{validate_count_range, validate_positive};
use crate::types::{NormVersion, Timestamp};

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum number of lines allowed in a single estimate.
pub const MAX_ESTIMATE_LINES: usize = 500;

/// Decimal places kept for money values.
pub const MONEY_DECIMALS: u32 = 2;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// One priced line of a work descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkLine {
    pub table_code: String,
    pub criteria: Criteria,
    pub quantity: Decimal,
}

/// What to price: lines from one section plus the site conditions that
/// gate coefficient factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkDescriptor {
    pub section: String,
    /// Owning module recorded in the result metadata; defaults to the section.
    #[serde(default)]
    pub module: String,
    pub lines: Vec<WorkLine>,
    #[serde(default)]
    pub conditions: SiteConditions,
}

impl WorkDescriptor {
    pub fn module(&self) -> &str {
        if self.module.is_empty() {
            &self.section
        } else {
            &self.module
        }
    }

    /// Distinct table codes referenced by the lines, in first-use order.
    pub fn table_codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = Vec::new();
        for line in &self.lines {
            if !codes.contains(&line.table_code.as_str()) {
                codes.push(&line.table_code);
            }
        }
        codes
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.section.trim().is_empty() {
            return Err(CoreError::Validation("section is required".to_string()));
        }
        validate_count_range(self.lines.len(), MAX_ESTIMATE_LINES, "Estimation")?;
        for (index, line) in self.lines.iter().enumerate() {
            if line.table_code.trim().is_empty() {
                return Err(CoreError::Validation(format!(
                    "line {index}: table code is required"
                )));
            }
            validate_positive(line.quantity, &format!("line {index}: quantity"))?;
        }
        Ok(())
    }
}

/// Per-call inputs that are not part of the descriptor.
#[derive(Debug, Clone)]
pub struct EstimateContext {
    pub norm_version: NormVersion,
    pub calculated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateLineItem {
    pub code: String,
    pub work_type: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Composed multiplier applied to this line.
    pub coefficient: Decimal,
    pub cost: Decimal,
    /// Factors that make up `coefficient`, in evaluation order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub factors: IndexMap<String, Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateMetadata {
    pub section: String,
    pub norm_version: NormVersion,
    pub module: String,
    pub calculated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResult {
    /// Sum of line costs before coefficients.
    pub base_price: Decimal,
    pub items: Vec<EstimateLineItem>,
    /// Estimate-wide factor breakdown, `base` first.
    pub coefficients: IndexMap<String, Decimal>,
    pub total_cost: Decimal,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub metadata: EstimateMetadata,
}

/// Product of the applicable factors with an ordered breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientComposition {
    pub total: Decimal,
    pub per_factor: IndexMap<String, Decimal>,
}

// ---------------------------------------------------------------------------
// Table access
// ---------------------------------------------------------------------------

/// Loaded tables of one section, addressed by normative code.
pub trait TableLookup {
    fn table(&self, code: &str) -> Option<&PriceTable>;
}

impl<S: BuildHasher> TableLookup for HashMap<String, Arc<PriceTable>, S> {
    fn table(&self, code: &str) -> Option<&PriceTable> {
        self.get(code).map(Arc::as_ref)
    }
}

impl<S: BuildHasher> TableLookup for HashMap<String, PriceTable, S> {
    fn table(&self, code: &str) -> Option<&PriceTable> {
        self.get(code)
    }
}

// ---------------------------------------------------------------------------
// Estimation logic
// ---------------------------------------------------------------------------

/// Round a money value half-up to exactly [`MONEY_DECIMALS`] places.
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(MONEY_DECIMALS, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_DECIMALS);
    rounded
}

/// Find the row matching `criteria` exactly.
pub fn lookup_row<'t>(
    table: &'t PriceTable,
    criteria: &Criteria,
) -> Result<&'t PriceTableRow, CoreError> {
    table.check_criteria(criteria)?;
    table.find_row(criteria).ok_or_else(|| CoreError::PriceNotFound {
        table: table.label(),
        criteria: criteria.clone(),
    })
}

/// Unit price of the row matching `criteria` exactly.
pub fn find_unit_price(table: &PriceTable, criteria: &Criteria) -> Result<Decimal, CoreError> {
    lookup_row(table, criteria).map(|row| row.price_per_unit)
}

/// Multiply the given factors together.
///
/// Only factors whose condition held should be passed in. The breakdown
/// starts with an informational `base = 1` entry followed by the factors in
/// the order given.
pub fn compose_coefficients(
    factors: &IndexMap<String, Decimal>,
) -> Result<CoefficientComposition, CoreError> {
    let mut per_factor = IndexMap::with_capacity(factors.len() + 1);
    per_factor.insert(BASE_FACTOR.to_string(), Decimal::ONE);

    let mut total = Decimal::ONE;
    for (name, value) in factors {
        if name == BASE_FACTOR {
            continue;
        }
        total = total.checked_mul(*value).ok_or_else(|| {
            CoreError::DataIntegrity(format!("coefficient product overflows at factor '{name}'"))
        })?;
        per_factor.insert(name.clone(), *value);
    }

    Ok(CoefficientComposition { total, per_factor })
}

/// `round2(unit_price × quantity × coefficient)`.
///
/// Fails instead of overflowing when the product leaves the decimal range.
pub fn price_line(
    unit_price: Decimal,
    quantity: Decimal,
    coefficient: Decimal,
) -> Result<Decimal, CoreError> {
    unit_price
        .checked_mul(quantity)
        .and_then(|cost| cost.checked_mul(coefficient))
        .map(round_money)
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "cost of {quantity} at {unit_price} × {coefficient} is out of range"
            ))
        })
}

/// Assemble a result. The total is the sum of line costs, never a
/// recomputation from `base_price`.
pub fn build_result(
    base_price: Decimal,
    items: Vec<EstimateLineItem>,
    coefficients: IndexMap<String, Decimal>,
    metadata: EstimateMetadata,
) -> Result<CalculationResult, CoreError> {
    let total_cost = items
        .iter()
        .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.cost))
        .ok_or_else(|| CoreError::Validation("estimate total is out of range".to_string()))?;
    Ok(CalculationResult {
        base_price,
        items,
        coefficients,
        total_cost,
        warnings: Vec::new(),
        metadata,
    })
}

/// Price every line of `descriptor`.
///
/// Any failed lookup aborts the whole estimate; no partial result is
/// returned.
pub fn compute_estimate(
    descriptor: &WorkDescriptor,
    tables: &impl TableLookup,
    coefficients: &CoefficientSet,
    context: &EstimateContext,
) -> Result<CalculationResult, CoreError> {
    descriptor.validate()?;

    let shared = coefficients.resolve(&descriptor.conditions, None);

    let mut base_price = Decimal::ZERO;
    let mut items = Vec::with_capacity(descriptor.lines.len());

    for (index, line) in descriptor.lines.iter().enumerate() {
        let table = tables
            .table(&line.table_code)
            .ok_or_else(|| CoreError::TableNotFound {
                version: context.norm_version.clone(),
                section: descriptor.section.clone(),
                code: line.table_code.clone(),
            })?;
        let row = lookup_row(table, &line.criteria)?;

        let line_factors = coefficients.resolve(&descriptor.conditions, Some(line.quantity));
        let composition = compose_coefficients(&line_factors.factors)?;
        let out_of_range = |what: &str| {
            CoreError::Validation(format!(
                "line {index}: {what} of {} at {} is out of range",
                line.quantity, row.price_per_unit
            ))
        };

        base_price = row
            .price_per_unit
            .checked_mul(line.quantity)
            .map(round_money)
            .and_then(|line_base| base_price.checked_add(line_base))
            .ok_or_else(|| out_of_range("base price"))?;
        let cost = price_line(row.price_per_unit, line.quantity, composition.total)
            .map_err(|_| out_of_range("cost"))?;
        items.push(EstimateLineItem {
            code: row.code.clone(),
            work_type: row.work_type.clone(),
            unit: row.unit.clone(),
            quantity: line.quantity,
            unit_price: row.price_per_unit,
            coefficient: composition.total,
            cost,
            factors: composition.per_factor,
        });
    }

    let metadata = EstimateMetadata {
        section: descriptor.section.clone(),
        norm_version: context.norm_version.clone(),
        module: descriptor.module().to_string(),
        calculated_at: context.calculated_at,
    };

    let mut result = build_result(
        base_price,
        items,
        compose_coefficients(&shared.factors)?.per_factor,
        metadata,
    )?;
    result.warnings = shared.warnings;
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

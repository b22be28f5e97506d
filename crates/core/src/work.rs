//! Required work items produced by rule evaluation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::tables::Criteria;

/// How binding a work item is for the assignment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WorkCategory {
    Mandatory,
    Recommended,
    Optional,
}

impl WorkCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mandatory => "mandatory",
            Self::Recommended => "recommended",
            Self::Optional => "optional",
        }
    }

    /// Mandatory work is part of the assignment without confirmation.
    pub fn selected_by_default(self) -> bool {
        matches!(self, Self::Mandatory)
    }
}

/// Where a work item's unit price comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingRef {
    pub section: String,
    pub table_code: String,
    pub criteria: Criteria,
}

/// One required unit of work. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub id: String,
    pub name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub category: WorkCategory,
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normative_ref: Option<String>,
    /// Whether the item has been confirmed for the assignment.
    pub selected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PricingRef>,
    /// Instruction block that emitted the item.
    #[serde(default)]
    pub source_block: String,
}

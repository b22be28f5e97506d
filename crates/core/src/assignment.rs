//! Technical assignment aggregation.
//!
//! Collects the work items produced by rule evaluation into one
//! deduplicated, grouped assignment with completeness statistics.

use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::rules::AppliedBlock;
use crate::types::NormVersion;
use crate::work::{WorkCategory, WorkItem};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentStatistics {
    pub total: usize,
    pub selected: usize,
    pub mandatory: usize,
    pub recommended: usize,
    pub optional: usize,
    pub by_module: BTreeMap<String, usize>,
    /// Selected share of all items, in whole percent.
    pub completeness: u8,
    /// Summed quantities per module and unit, saturating at the decimal range.
    pub volumes: BTreeMap<String, BTreeMap<String, Decimal>>,
}

/// The aggregated list of required works for one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalAssignment {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub object_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_set_version: Option<NormVersion>,

    /// Deduplicated items in first-appearance order.
    pub items: Vec<WorkItem>,
    /// Work ids per category.
    pub by_category: BTreeMap<WorkCategory, Vec<String>>,
    /// Work ids per module, modules in name order.
    pub by_module: BTreeMap<String, Vec<String>>,
    pub statistics: AssignmentStatistics,

    #[serde(default)]
    pub applied_blocks: Vec<AppliedBlock>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Keep the first occurrence of every work id, in order.
pub fn dedupe(items: Vec<WorkItem>) -> Vec<WorkItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}

/// Build an assignment from rule output.
///
/// Duplicated ids are dropped, never merged. Running `aggregate` on an
/// assignment's own items yields the same assignment.
pub fn aggregate(items: Vec<WorkItem>) -> TechnicalAssignment {
    let items = dedupe(items);

    let mut by_category: BTreeMap<WorkCategory, Vec<String>> = BTreeMap::new();
    let mut by_module: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for item in &items {
        by_category
            .entry(item.category)
            .or_default()
            .push(item.id.clone());
        by_module
            .entry(item.module.clone())
            .or_default()
            .push(item.id.clone());
    }

    let statistics = compute_statistics(&items);
    TechnicalAssignment {
        items,
        by_category,
        by_module,
        statistics,
        ..TechnicalAssignment::default()
    }
}

/// Integer percentage rounded half-up; `0` for an empty assignment.
fn completeness(selected: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (selected * 100 + total / 2) / total;
    u8::try_from(percent.min(100)).unwrap_or(100)
}

pub fn compute_statistics(items: &[WorkItem]) -> AssignmentStatistics {
    let mut stats = AssignmentStatistics {
        total: items.len(),
        ..AssignmentStatistics::default()
    };

    for item in items {
        if item.selected {
            stats.selected += 1;
        }
        match item.category {
            WorkCategory::Mandatory => stats.mandatory += 1,
            WorkCategory::Recommended => stats.recommended += 1,
            WorkCategory::Optional => stats.optional += 1,
        }
        *stats.by_module.entry(item.module.clone()).or_default() += 1;
        let volume = stats
            .volumes
            .entry(item.module.clone())
            .or_default()
            .entry(item.unit.clone())
            .or_default();
        *volume = volume.saturating_add(item.quantity);
    }

    stats.completeness = completeness(stats.selected, stats.total);
    stats
}

impl TechnicalAssignment {
    pub fn item(&self, work_id: &str) -> Option<&WorkItem> {
        self.items.iter().find(|i| i.id == work_id)
    }

    /// Confirm or unconfirm a work item. Returns `false` for an unknown id.
    pub fn set_selected(&mut self, work_id: &str, selected: bool) -> bool {
        let Some(item) = self.items.iter_mut().find(|i| i.id == work_id) else {
            return false;
        };
        item.selected = selected;
        self.statistics = compute_statistics(&self.items);
        true
    }

    /// Selected items that carry a pricing reference.
    pub fn priced_selection(&self) -> impl Iterator<Item = &WorkItem> {
        self.items
            .iter()
            .filter(|i| i.selected && i.pricing.is_some())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

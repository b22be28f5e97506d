//! Rule evaluator. Pure logic, no data loading.
//!
//! Every block is evaluated once, in declaration order, independently of the
//! others. Per block at most one variant applies: the highest-priority
//! variant whose condition holds, ties going to the first declared.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::model::{InstructionBlock, Variant};
use crate::error::CoreError;
use crate::project::ProjectDescription;
use crate::work::WorkItem;

// ---------------------------------------------------------------------------
// Options and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationOptions {
    /// Warn about mandatory blocks that end up with no applicable variant.
    pub strict_mode: bool,
    /// Order variants by priority before matching. When off, the first
    /// holding variant in declaration order applies.
    pub auto_select_highest_priority: bool,
    /// Emit per-block debug events.
    pub enable_logging: bool,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            strict_mode: false,
            auto_select_highest_priority: true,
            enable_logging: false,
        }
    }
}

/// Lifecycle of a single evaluation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationState {
    Idle,
    Evaluating,
    Completed,
    Failed,
}

/// Which variant fired for a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedBlock {
    pub block_id: String,
    pub block_name: String,
    pub variant_id: String,
    pub priority: i32,
}

/// Output of [`evaluate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEvaluation {
    /// Applied variants' items, concatenated in block order.
    pub work_items: Vec<WorkItem>,
    pub applied_blocks: Vec<AppliedBlock>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

// ---------------------------------------------------------------------------
// State tracking
// ---------------------------------------------------------------------------

struct Tracker {
    state: EvaluationState,
    logging: bool,
}

impl Tracker {
    fn new(logging: bool) -> Self {
        Self {
            state: EvaluationState::Idle,
            logging,
        }
    }

    fn transition(&mut self, next: EvaluationState) {
        if self.logging {
            tracing::debug!(from = ?self.state, to = ?next, "Rule evaluation state change");
        }
        self.state = next;
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Variants of `block` in matching order.
///
/// With priority selection this is a stable sort on priority descending, so
/// equal priorities keep declaration order.
pub fn ordered_variants(block: &InstructionBlock, by_priority: bool) -> Vec<&Variant> {
    let mut variants: Vec<&Variant> = block.variants.iter().collect();
    if by_priority {
        variants.sort_by_key(|v| Reverse(v.priority));
    }
    variants
}

/// Pick the applicable variant of `block`, if any.
pub fn select_variant<'b>(
    block: &'b InstructionBlock,
    facts: &Map<String, Value>,
    by_priority: bool,
) -> Result<Option<&'b Variant>, String> {
    for variant in ordered_variants(block, by_priority) {
        let holds = variant
            .when
            .evaluate(facts)
            .map_err(|e| format!("variant '{}': {e}", variant.id))?;
        if holds {
            return Ok(Some(variant));
        }
    }
    Ok(None)
}

/// Evaluate every block against `input`.
///
/// Input validation runs first and fails the whole call before any block is
/// looked at. A block without an applicable variant contributes nothing.
pub fn evaluate(
    blocks: &[InstructionBlock],
    input: &ProjectDescription,
    options: &EvaluationOptions,
) -> Result<RuleEvaluation, CoreError> {
    input.check()?;
    let facts = input.facts()?;

    let mut tracker = Tracker::new(options.enable_logging);
    tracker.transition(EvaluationState::Evaluating);

    match evaluate_blocks(blocks, &facts, options) {
        Ok(evaluation) => {
            tracker.transition(EvaluationState::Completed);
            Ok(evaluation)
        }
        Err(err) => {
            tracker.transition(EvaluationState::Failed);
            Err(err)
        }
    }
}

fn evaluate_blocks(
    blocks: &[InstructionBlock],
    facts: &Map<String, Value>,
    options: &EvaluationOptions,
) -> Result<RuleEvaluation, CoreError> {
    let mut out = RuleEvaluation::default();
    let failure = |block: &InstructionBlock, reason: String| CoreError::RuleEvaluation {
        block_id: block.id.clone(),
        reason,
        input: Value::Object(facts.clone()),
    };

    for block in blocks {
        let selected = select_variant(block, facts, options.auto_select_highest_priority)
            .map_err(|reason| failure(block, reason))?;

        let Some(variant) = selected else {
            if options.enable_logging {
                tracing::debug!(block = %block.id, "No applicable variant");
            }
            if options.strict_mode && block.mandatory {
                out.warnings.push(format!(
                    "Mandatory block '{}' ({}) has no applicable variant",
                    block.id, block.name
                ));
            }
            continue;
        };

        if options.enable_logging {
            tracing::debug!(
                block = %block.id,
                variant = %variant.id,
                priority = variant.priority,
                works = variant.works.len(),
                "Variant applied",
            );
        }

        for template in &variant.works {
            let (item, warning) = template
                .materialize(facts, &block.id)
                .map_err(|reason| failure(block, format!("work '{}': {reason}", template.id)))?;
            out.work_items.push(item);
            out.warnings.extend(warning);
        }
        out.warnings.extend(variant.warnings.iter().cloned());
        out.recommendations
            .extend(variant.recommendations.iter().cloned());
        out.applied_blocks.push(AppliedBlock {
            block_id: block.id.clone(),
            block_name: block.name.clone(),
            variant_id: variant.id.clone(),
            priority: variant.priority,
        });
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::project::{OBJECT_TYPE_BUILDING, OBJECT_TYPE_LINEAR};

    fn blocks(value: Value) -> Vec<InstructionBlock> {
        serde_json::from_value(value).unwrap()
    }

    fn work(id: &str) -> Value {
        json!({
            "id": id,
            "name": format!("Work {id}"),
            "quantity": { "fixed": 1 },
            "unit": "pcs",
            "category": "mandatory",
            "module": "geodesy"
        })
    }

    fn input() -> ProjectDescription {
        ProjectDescription::new("Library", OBJECT_TYPE_BUILDING)
    }

    #[test]
    fn highest_priority_variant_wins() {
        let b = blocks(json!([{
            "id": "topography",
            "name": "Topography",
            "variants": [
                { "id": "low", "priority": 1, "works": [work("W-LOW")] },
                { "id": "high", "priority": 2, "works": [work("W-HIGH")] }
            ]
        }]));
        let out = evaluate(&b, &input(), &EvaluationOptions::default()).unwrap();
        let ids: Vec<&str> = out.work_items.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["W-HIGH"]);
        assert_eq!(out.applied_blocks[0].variant_id, "high");
    }

    #[test]
    fn equal_priority_keeps_declaration_order() {
        let b = blocks(json!([{
            "id": "b",
            "name": "B",
            "variants": [
                { "id": "first", "priority": 5, "works": [work("A")] },
                { "id": "second", "priority": 5, "works": [work("B")] }
            ]
        }]));
        let out = evaluate(&b, &input(), &EvaluationOptions::default()).unwrap();
        assert_eq!(out.applied_blocks[0].variant_id, "first");
    }

    #[test]
    fn declaration_order_when_priority_selection_disabled() {
        let b = blocks(json!([{
            "id": "b",
            "name": "B",
            "variants": [
                { "id": "low", "priority": 1, "works": [work("A")] },
                { "id": "high", "priority": 9, "works": [work("B")] }
            ]
        }]));
        let options = EvaluationOptions {
            auto_select_highest_priority: false,
            ..EvaluationOptions::default()
        };
        let out = evaluate(&b, &input(), &options).unwrap();
        assert_eq!(out.applied_blocks[0].variant_id, "low");
    }

    #[test]
    fn false_condition_falls_through_to_next_variant() {
        let b = blocks(json!([{
            "id": "route",
            "name": "Route survey",
            "variants": [
                { "id": "linear", "priority": 2,
                  "when": { "op": "eq", "field": "objectType", "value": OBJECT_TYPE_LINEAR },
                  "works": [work("LIN")] },
                { "id": "fallback", "priority": 1, "works": [work("GEN")] }
            ]
        }]));
        let out = evaluate(&b, &input(), &EvaluationOptions::default()).unwrap();
        assert_eq!(out.work_items[0].id, "GEN");
    }

    #[test]
    fn block_without_match_contributes_nothing() {
        let b = blocks(json!([{
            "id": "hydro",
            "name": "Hydrology",
            "mandatory": true,
            "variants": [
                { "id": "water", "when": { "op": "truthy", "field": "nearWater" }, "works": [work("HY")] }
            ]
        }]));
        let out = evaluate(&b, &input(), &EvaluationOptions::default()).unwrap();
        assert!(out.work_items.is_empty());
        assert!(out.applied_blocks.is_empty());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn strict_mode_warns_for_unmatched_mandatory_block() {
        let b = blocks(json!([{
            "id": "hydro",
            "name": "Hydrology",
            "mandatory": true,
            "variants": [
                { "id": "water", "when": { "op": "truthy", "field": "nearWater" }, "works": [work("HY")] }
            ]
        }]));
        let options = EvaluationOptions {
            strict_mode: true,
            ..EvaluationOptions::default()
        };
        let out = evaluate(&b, &input(), &options).unwrap();
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("hydro"));
    }

    #[test]
    fn items_concatenate_in_block_order_with_diagnostics() {
        let b = blocks(json!([
            { "id": "one", "name": "One", "variants": [
                { "id": "v", "works": [work("A"), work("B")], "warnings": ["check permits"] }
            ] },
            { "id": "two", "name": "Two", "variants": [
                { "id": "v", "works": [work("C")], "recommendations": ["order soil tests early"] }
            ] }
        ]));
        let out = evaluate(&b, &input(), &EvaluationOptions::default()).unwrap();
        let ids: Vec<&str> = out.work_items.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(out.warnings, vec!["check permits".to_string()]);
        assert_eq!(out.recommendations, vec!["order soil tests early".to_string()]);
        assert_eq!(out.work_items[2].source_block, "two");
    }

    #[test]
    fn invalid_input_fails_before_blocks_run() {
        let b = blocks(json!([{ "id": "x", "name": "X", "variants": [{ "id": "v", "works": [work("A")] }] }]));
        let bad = ProjectDescription::new("", OBJECT_TYPE_BUILDING);
        assert_matches!(
            evaluate(&b, &bad, &EvaluationOptions::default()),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn malformed_condition_reports_block_and_input() {
        let b = blocks(json!([{
            "id": "broken",
            "name": "Broken",
            "variants": [
                { "id": "v", "when": { "op": "gt", "field": "projectName", "value": 3 }, "works": [] }
            ]
        }]));
        let err = evaluate(&b, &input(), &EvaluationOptions::default()).unwrap_err();
        assert_matches!(
            err,
            CoreError::RuleEvaluation { ref block_id, ref input, .. }
                if block_id == "broken" && input["projectName"] == json!("Library")
        );
    }

    #[test]
    fn huge_project_volume_is_rule_error() {
        let b = blocks(json!([{
            "id": "inspection",
            "name": "Inspection",
            "variants": [{ "id": "v", "works": [{
                "id": "IN-01", "name": "Inspection", "quantity": { "field": "buildingVolumeM3", "factor": 10 },
                "unit": "m3", "category": "mandatory", "module": "inspection"
            }] }]
        }]));
        let mut project = input();
        project.building_volume_m3 = Some(1e28);
        assert_matches!(
            evaluate(&b, &project, &EvaluationOptions::default()),
            Err(CoreError::RuleEvaluation { ref block_id, ref reason, .. })
                if block_id == "inspection" && reason.contains("out of range")
        );
    }

    #[test]
    fn missing_quantity_field_is_rule_error() {
        let b = blocks(json!([{
            "id": "topo",
            "name": "Topo",
            "variants": [{ "id": "v", "works": [{
                "id": "GD", "name": "Survey", "quantity": { "field": "areaHa" },
                "unit": "ha", "category": "mandatory", "module": "geodesy"
            }] }]
        }]));
        assert_matches!(
            evaluate(&b, &input(), &EvaluationOptions::default()),
            Err(CoreError::RuleEvaluation { .. })
        );
    }

    #[test]
    fn evaluation_is_deterministic() {
        let b = blocks(json!([
            { "id": "one", "name": "One", "variants": [
                { "id": "a", "priority": 3, "works": [work("A")] },
                { "id": "b", "priority": 3, "works": [work("B")] }
            ] }
        ]));
        let options = EvaluationOptions::default();
        let first = evaluate(&b, &input(), &options).unwrap();
        for _ in 0..5 {
            assert_eq!(evaluate(&b, &input(), &options).unwrap(), first);
        }
    }
}

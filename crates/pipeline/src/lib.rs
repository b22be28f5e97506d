//! Entry points joining the registry to the core engines.
//!
//! A [`Pipeline`] turns a project description into a technical assignment
//! and prices work descriptors (or the selected works of an assignment)
//! against the normative version its registry resolves to.

use std::collections::HashMap;
use std::sync::Arc;

use normcalc_core::assignment::{aggregate, TechnicalAssignment};
use normcalc_core::coefficients::{CoefficientSet, SiteConditions};
use normcalc_core::error::CoreError;
use normcalc_core::estimation::{
    compute_estimate, CalculationResult, EstimateContext, WorkDescriptor, WorkLine,
};
use normcalc_core::project::ProjectDescription;
use normcalc_core::rules::{evaluate, EvaluationOptions};
use normcalc_core::tables::PriceTable;
use normcalc_core::types::{NormVersion, Timestamp};
use normcalc_registry::NormRegistry;

#[derive(Debug, Clone)]
pub struct Pipeline {
    registry: NormRegistry,
    /// Pinned calculation time; the wall clock when unset.
    clock: Option<Timestamp>,
}

impl Pipeline {
    pub fn new(registry: NormRegistry) -> Self {
        Self {
            registry,
            clock: None,
        }
    }

    /// Stamp every result with `at` instead of the current time, making
    /// repeated runs byte-identical.
    pub fn with_fixed_clock(mut self, at: Timestamp) -> Self {
        self.clock = Some(at);
        self
    }

    pub fn registry(&self) -> &NormRegistry {
        &self.registry
    }

    fn now(&self) -> Timestamp {
        self.clock.unwrap_or_else(chrono::Utc::now)
    }

    async fn version_or_active(&self, version: Option<&NormVersion>) -> NormVersion {
        match version {
            Some(v) => v.clone(),
            None => self.registry.resolve_active_version().await,
        }
    }

    // -----------------------------------------------------------------------
    // Assignment
    // -----------------------------------------------------------------------

    /// Evaluate the rule set against `input` and aggregate the result.
    pub async fn generate_assignment(
        &self,
        input: &ProjectDescription,
        rule_set_version: Option<&NormVersion>,
        options: &EvaluationOptions,
    ) -> Result<TechnicalAssignment, CoreError> {
        input.check()?;
        let version = self.version_or_active(rule_set_version).await;
        let rules = self.registry.get_rule_set(Some(&version)).await?;

        let evaluation = evaluate(&rules.blocks, input, options)?;

        let mut assignment = aggregate(evaluation.work_items);
        assignment.project_name = input.project_name.clone();
        assignment.object_type = input.object_type.clone();
        assignment.rule_set_version = Some(version.clone());
        assignment.applied_blocks = evaluation.applied_blocks;
        assignment.warnings = evaluation.warnings;
        assignment.recommendations = evaluation.recommendations;

        tracing::info!(
            project = %assignment.project_name,
            %version,
            items = assignment.statistics.total,
            blocks = assignment.applied_blocks.len(),
            warnings = assignment.warnings.len(),
            "Technical assignment generated",
        );
        Ok(assignment)
    }

    // -----------------------------------------------------------------------
    // Estimation
    // -----------------------------------------------------------------------

    /// Price `descriptor` against one normative version.
    pub async fn calculate_estimate(
        &self,
        descriptor: &WorkDescriptor,
        version: Option<&NormVersion>,
    ) -> Result<CalculationResult, CoreError> {
        descriptor.validate()?;
        let version = self.version_or_active(version).await;

        let mut tables: HashMap<String, Arc<PriceTable>> = HashMap::new();
        for code in descriptor.table_codes() {
            let table = self
                .registry
                .get_table(&descriptor.section, code, Some(&version))
                .await?;
            tables.insert(code.to_string(), table);
        }
        let coefficients = self
            .registry
            .get_coefficients(&descriptor.section, Some(&version))
            .await?;

        let context = EstimateContext {
            norm_version: version,
            calculated_at: self.now(),
        };
        let result = compute_estimate(descriptor, &tables, &coefficients, &context)?;

        tracing::info!(
            section = %descriptor.section,
            version = %context.norm_version,
            lines = result.items.len(),
            total = %result.total_cost,
            "Estimate calculated",
        );
        Ok(result)
    }

    /// Price the selected, priced works of an assignment: one result per
    /// section, sections in order of first appearance.
    ///
    /// Without an explicit version the assignment's rule-set version is
    /// used, then the active one.
    pub async fn estimate_assignment(
        &self,
        assignment: &TechnicalAssignment,
        conditions: &SiteConditions,
        version: Option<&NormVersion>,
    ) -> Result<Vec<CalculationResult>, CoreError> {
        let version = match version.or(assignment.rule_set_version.as_ref()) {
            Some(v) => v.clone(),
            None => self.registry.resolve_active_version().await,
        };

        let mut results = Vec::new();
        for descriptor in descriptors_for(assignment, conditions) {
            results.push(self.calculate_estimate(&descriptor, Some(&version)).await?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Registry passthroughs
    // -----------------------------------------------------------------------

    pub async fn get_table(
        &self,
        section: &str,
        code: &str,
        version: Option<&NormVersion>,
    ) -> Result<Arc<PriceTable>, CoreError> {
        self.registry.get_table(section, code, version).await
    }

    pub async fn get_coefficients(
        &self,
        section: &str,
        version: Option<&NormVersion>,
    ) -> Result<Arc<CoefficientSet>, CoreError> {
        self.registry.get_coefficients(section, version).await
    }

    pub async fn is_table_available(
        &self,
        section: &str,
        code: &str,
        version: Option<&NormVersion>,
    ) -> bool {
        self.registry.is_table_available(section, code, version).await
    }
}

/// Group the selected, priced items of `assignment` into one descriptor per
/// section, preserving first-appearance order of sections and items.
pub fn descriptors_for(
    assignment: &TechnicalAssignment,
    conditions: &SiteConditions,
) -> Vec<WorkDescriptor> {
    let mut descriptors: Vec<WorkDescriptor> = Vec::new();
    for item in assignment.priced_selection() {
        let Some(pricing) = &item.pricing else {
            continue;
        };
        let line = WorkLine {
            table_code: pricing.table_code.clone(),
            criteria: pricing.criteria.clone(),
            quantity: item.quantity,
        };
        match descriptors.iter_mut().find(|d| d.section == pricing.section) {
            Some(descriptor) => descriptor.lines.push(line),
            None => descriptors.push(WorkDescriptor {
                section: pricing.section.clone(),
                module: String::new(),
                lines: vec![line],
                conditions: conditions.clone(),
            }),
        }
    }
    descriptors
}

//! End-to-end tests over the builtin catalog.

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use normcalc_core::coefficients::SiteConditions;
use normcalc_core::error::CoreError;
use normcalc_core::estimation::{WorkDescriptor, WorkLine};
use normcalc_core::project::ProjectDescription;
use normcalc_core::rules::EvaluationOptions;
use normcalc_core::tables::{Criteria, CriterionKey};
use normcalc_core::types::NormVersion;
use normcalc_pipeline::Pipeline;
use normcalc_registry::NormRegistry;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn pipeline() -> Pipeline {
    Pipeline::new(NormRegistry::builtin().with_version("2025"))
        .with_fixed_clock(Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap())
}

fn inspection(category: &str, height: &str, quantity: Decimal) -> WorkDescriptor {
    WorkDescriptor {
        section: "inspection".to_string(),
        module: String::new(),
        lines: vec![WorkLine {
            table_code: "1".to_string(),
            criteria: Criteria::new()
                .with(CriterionKey::Category, category)
                .with(CriterionKey::HeightBand, height),
            quantity,
        }],
        conditions: SiteConditions::new(),
    }
}

fn reconstruction() -> ProjectDescription {
    let mut project = ProjectDescription::new("Clinic", "building")
        .with_attribute("complexityCategory", "II");
    project.reconstruction = true;
    project.floors = Some(4);
    project.area_ha = Some(0.8);
    project.building_volume_m3 = Some(12_000.0);
    project
}

// ---------------------------------------------------------------------------
// Estimation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn plain_line_is_priced_without_coefficients() {
    let result = pipeline()
        .calculate_estimate(&inspection("I", "up_to_10m", dec!(10)), None)
        .await
        .unwrap();
    assert_eq!(result.items[0].coefficient, dec!(1));
    assert_eq!(result.total_cost, dec!(38930.00));
    assert_eq!(result.metadata.norm_version.as_str(), "2025");
    assert_eq!(result.metadata.module, "inspection");
}

#[tokio::test]
async fn small_volume_factor_applies_to_short_lines() {
    let result = pipeline()
        .calculate_estimate(&inspection("I", "up_to_10m", dec!(5)), None)
        .await
        .unwrap();
    assert_eq!(result.items[0].coefficient, dec!(2.8));
    assert_eq!(result.total_cost, dec!(54502.00));
}

#[tokio::test]
async fn winter_and_seismicity_multiply() {
    let mut descriptor = inspection("III", "over_20m", dec!(50));
    descriptor.conditions = SiteConditions::new()
        .with_flag("winter")
        .with_band("seismicity", "8");
    let result = pipeline().calculate_estimate(&descriptor, None).await.unwrap();

    assert_eq!(result.base_price, dec!(977550));
    assert_eq!(result.total_cost, dec!(1588518.75));
    let factors: Vec<&str> = result.coefficients.keys().map(String::as_str).collect();
    assert_eq!(factors, vec!["base", "winter", "seismicity"]);
}

#[tokio::test]
async fn unknown_criteria_report_price_not_found() {
    let err = pipeline()
        .calculate_estimate(&inspection("IV", "up_to_10m", dec!(1)), None)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        CoreError::PriceNotFound { ref criteria, .. }
            if criteria.get(CriterionKey::Category) == Some("IV")
    );
}

#[tokio::test]
async fn table_missing_in_version_is_table_not_found() {
    let descriptor = WorkDescriptor {
        section: "geology".to_string(),
        module: String::new(),
        lines: vec![WorkLine {
            table_code: "1".to_string(),
            criteria: Criteria::new()
                .with(CriterionKey::Complexity, "I")
                .with(CriterionKey::DepthBand, "up_to_15m"),
            quantity: dec!(20),
        }],
        conditions: SiteConditions::new(),
    };
    let p = pipeline();
    assert!(p.calculate_estimate(&descriptor, None).await.is_ok());
    assert_matches!(
        p.calculate_estimate(&descriptor, Some(&NormVersion::new("2024"))).await,
        Err(CoreError::TableNotFound { .. })
    );
}

#[tokio::test]
async fn empty_descriptor_is_rejected() {
    let mut descriptor = inspection("I", "up_to_10m", dec!(1));
    descriptor.lines.clear();
    assert_matches!(
        pipeline().calculate_estimate(&descriptor, None).await,
        Err(CoreError::Validation(_))
    );
}

#[tokio::test]
async fn repeated_estimates_serialize_identically() {
    let mut descriptor = inspection("II", "10_to_20m", dec!(3.5));
    descriptor.conditions = SiteConditions::new().with_flag("remote");
    let p = pipeline();
    let first = serde_json::to_string(&p.calculate_estimate(&descriptor, None).await.unwrap()).unwrap();
    let second = serde_json::to_string(&p.calculate_estimate(&descriptor, None).await.unwrap()).unwrap();
    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn assignment_carries_header_and_diagnostics() {
    let assignment = pipeline()
        .generate_assignment(&reconstruction(), None, &EvaluationOptions::default())
        .await
        .unwrap();

    assert_eq!(assignment.project_name, "Clinic");
    assert_eq!(assignment.rule_set_version, Some(NormVersion::new("2025")));
    assert_eq!(assignment.statistics.total, 6);
    assert_eq!(assignment.statistics.selected, 4);
    assert_eq!(assignment.statistics.completeness, 67);
    assert_eq!(assignment.recommendations.len(), 1);
    let blocks: Vec<&str> = assignment
        .applied_blocks
        .iter()
        .map(|b| b.block_id.as_str())
        .collect();
    assert_eq!(blocks, vec!["topography", "geology", "building-inspection", "ecology"]);
}

#[tokio::test]
async fn invalid_project_fails_before_rules_load() {
    let pipeline = pipeline();
    let err = pipeline
        .generate_assignment(
            &ProjectDescription::new("", "building"),
            Some(&NormVersion::new("1999")),
            &EvaluationOptions::default(),
        )
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Validation(_));
}

#[tokio::test]
async fn unknown_rule_set_version() {
    assert_matches!(
        pipeline()
            .generate_assignment(
                &reconstruction(),
                Some(&NormVersion::new("1999")),
                &EvaluationOptions::default(),
            )
            .await,
        Err(CoreError::RuleSetNotFound { .. })
    );
}

#[tokio::test]
async fn selected_works_are_priced_per_section() {
    let p = pipeline();
    let mut assignment = p
        .generate_assignment(&reconstruction(), None, &EvaluationOptions::default())
        .await
        .unwrap();

    let results = p
        .estimate_assignment(&assignment, &SiteConditions::new(), None)
        .await
        .unwrap();
    let sections: Vec<&str> = results.iter().map(|r| r.metadata.section.as_str()).collect();
    assert_eq!(sections, vec!["geodesy", "geology", "inspection"]);
    assert_eq!(results[0].total_cost, dec!(20240.00));
    assert_eq!(results[1].total_cost, dec!(28320.00));
    assert_eq!(results[2].total_cost, dec!(1092600.00));

    assert!(assignment.set_selected("IN-02", true));
    let results = p
        .estimate_assignment(&assignment, &SiteConditions::new(), None)
        .await
        .unwrap();
    let inspection = &results[2];
    assert_eq!(inspection.items.len(), 2);
    assert_eq!(inspection.items[1].cost, dec!(21840.00));
    assert_eq!(inspection.total_cost, dec!(1114440.00));
}

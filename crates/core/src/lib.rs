//! Normative decision and estimation engine.
//!
//! Pure logic over in-memory reference data; loading lives in
//! `normcalc-registry`.
//!
//! - [`estimation`]: unit price lookup, coefficient composition and
//!   estimate assembly.
//! - [`rules`]: instruction-block evaluation producing required works.
//! - [`assignment`]: deduplication, grouping and completeness statistics.
//! - [`tables`], [`coefficients`]: versioned reference data and its
//!   load-time integrity checks.

pub mod assignment;
pub mod coefficients;
pub mod error;
pub mod estimation;
pub mod number;
pub mod project;
pub mod rules;
pub mod tables;
pub mod threshold_validation;
pub mod types;
pub mod work;

pub use assignment::{aggregate, compute_statistics, AssignmentStatistics, TechnicalAssignment};
pub use coefficients::{CoefficientSet, FactorKind, FactorRule, SiteConditions};
pub use error::CoreError;
pub use estimation::{
    compute_estimate, find_unit_price, CalculationResult, EstimateContext, EstimateLineItem,
    WorkDescriptor, WorkLine,
};
pub use project::ProjectDescription;
pub use rules::{EvaluationOptions, InstructionBlock, RuleEvaluation, RuleSet};
pub use tables::{Criteria, CriterionKey, PriceTable, PriceTableRow};
pub use types::{NormVersion, Timestamp, VersionInfo};
pub use work::{PricingRef, WorkCategory, WorkItem};

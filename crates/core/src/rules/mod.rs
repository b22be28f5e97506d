//! Instruction-block rule engine.
//!
//! - [`condition`]: declarative predicates over a project's JSON view
//! - [`model`]: rule sets, blocks, variants and work templates
//! - [`engine`]: variant selection and work item materialization

pub mod condition;
pub mod engine;
pub mod model;

pub use condition::Condition;
pub use engine::{evaluate, AppliedBlock, EvaluationOptions, EvaluationState, RuleEvaluation};
pub use model::{
    BandStep, CriterionSource, InstructionBlock, PricingTemplate, QuantitySpec, RuleSet, Variant,
    WorkTemplate,
};

use crate::tables::Criteria;
use crate::types::NormVersion;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Price table not found: section '{section}', code '{code}', version {version}")]
    TableNotFound {
        version: NormVersion,
        section: String,
        code: String,
    },

    #[error("Coefficient set not found: section '{section}', version {version}")]
    CoefficientSetNotFound {
        version: NormVersion,
        section: String,
    },

    #[error("Rule set not found for version {version}")]
    RuleSetNotFound { version: NormVersion },

    #[error("No row in table '{table}' matches criteria {{{criteria}}}")]
    PriceNotFound { table: String, criteria: Criteria },

    /// Carries the block id and a snapshot of the evaluated input so the
    /// failure can be reproduced.
    #[error("Rule evaluation failed in block '{block_id}': {reason}")]
    RuleEvaluation {
        block_id: String,
        reason: String,
        input: serde_json::Value,
    },

    #[error("Reference data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("Reference data could not be loaded: {0}")]
    DataSource(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the error reports a gap in reference data rather than bad input.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::TableNotFound { .. }
                | Self::CoefficientSetNotFound { .. }
                | Self::RuleSetNotFound { .. }
                | Self::PriceNotFound { .. }
        )
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

//! Shared range validation helpers.
//!
//! Provides reusable checks used by the estimation and rule modules.

use rust_decimal::Decimal;

use crate::error::CoreError;

/// Validate that a request carries between 1 and `max` entries.
pub fn validate_count_range(count: usize, max: usize, what: &str) -> Result<(), CoreError> {
    if count == 0 {
        return Err(CoreError::Validation(format!(
            "{what} request must contain at least one entry"
        )));
    }
    if count > max {
        return Err(CoreError::Validation(format!(
            "{what} request contains {count} entries, maximum is {max}"
        )));
    }
    Ok(())
}

/// Validate that a decimal quantity is strictly positive.
///
/// Returns a `CoreError::Validation` naming the field if not.
pub fn validate_positive(value: Decimal, name: &str) -> Result<(), CoreError> {
    if value <= Decimal::ZERO {
        return Err(CoreError::Validation(format!(
            "{name} must be greater than zero, got {value}"
        )));
    }
    Ok(())
}

//! Input validation errors.
//!
//! Input-shape problems fail fast with a descriptive error; values are never
//! silently coerced into range.

use thiserror::Error;

/// An input value that does not match its schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    #[error("unknown opportunity type: {0}")]
    UnknownOpportunityType(String),

    #[error("unknown counterparty behavior: {0}")]
    UnknownBehavior(String),

    #[error("{field} is required for {context}")]
    MissingField {
        field: &'static str,
        context: &'static str,
    },
}

/// Checks that `value` is finite and inside `[min, max]`.
pub fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field });
    }
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Checks that `value` is finite.
pub fn check_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NotFinite { field })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range() {
        assert!(check_range("volatility", 40.0, 0.0, 100.0).is_ok());
        assert!(check_range("volatility", 100.0, 0.0, 100.0).is_ok());
        let err = check_range("volatility", 101.0, 0.0, 100.0).unwrap_err();
        assert_eq!(err.to_string(), "volatility = 101 is outside [0, 100]");
        assert_eq!(
            check_range("trend", f64::NAN, -100.0, 100.0),
            Err(ValidationError::NotFinite { field: "trend" })
        );
    }
}

use thiserror::Error;

use goldline_core::{Dependency, DomainError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// Non-positive weight/purity/amount, a negative wage, or a price out of range.
    #[error("invalid pricing input `{field}`: {message}")]
    InvalidInput { field: &'static str, message: String },

    #[error("currency {code} is not supported")]
    UnsupportedCurrency { code: String },

    /// No usable market rate. Callers must fall back to a fixed price.
    #[error("market rate unavailable: {reason}")]
    RateUnavailable { reason: String },
}

impl PricingError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            message: message.into(),
        }
    }
}

impl From<PricingError> for DomainError {
    fn from(value: PricingError) -> Self {
        match value {
            PricingError::InvalidInput { field, message } => DomainError::validation(field, message),
            PricingError::UnsupportedCurrency { code } => {
                DomainError::validation("currency", format!("currency {code} is not supported"))
            }
            PricingError::RateUnavailable { reason } => {
                DomainError::dependency(Dependency::RateSource, reason)
            }
        }
    }
}

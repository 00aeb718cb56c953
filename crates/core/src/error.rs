//! Domain error model.
//!
//! Every error carries a kind (see [`ErrorKind`]) plus the id of the offending
//! entity or field, so a UI can re-prompt for the one bad input or re-surface
//! the one conflicting line instead of discarding the whole checkout.

use thiserror::Error;

use crate::id::{ItemId, TransactionId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Coarse error classification used by callers to decide how to react.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing input; the caller should re-prompt.
    Validation,
    /// State changed underneath the caller.
    Conflict,
    /// The referenced record does not exist.
    NotFound,
    /// An external collaborator (rate source, store, ...) failed.
    Dependency,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Dependency => "dependency_error",
        }
    }
}

/// State conflicts detected by the domain or by a store inside its atomic unit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// The item was sold by someone else between draft assembly and commit.
    #[error("item {item_id} is no longer available")]
    ItemNoLongerAvailable { item_id: ItemId },

    /// The item is not `available` when being added to a draft order.
    #[error("item {item_id} is not available for sale")]
    ItemUnavailable { item_id: ItemId },

    #[error("item {item_id} is already in the draft order")]
    DuplicateItem { item_id: ItemId },

    #[error("item {item_id} of transaction {transaction_id} was already returned")]
    AlreadyReturned {
        transaction_id: TransactionId,
        item_id: ItemId,
    },

    /// A return was attempted for an item that is not currently `sold`.
    #[error("item {item_id} is not currently sold")]
    ItemNotSold { item_id: ItemId },

    #[error("reference number {reference} is already used by another sale")]
    DuplicateReference { reference: u64 },

    #[error("barcode {barcode} is already assigned to another item")]
    DuplicateBarcode { barcode: String },

    #[error("item {item_id} already exists")]
    ItemAlreadyExists { item_id: ItemId },

    #[error("line currency {found} does not match draft currency {expected}")]
    CurrencyMismatch { expected: String, found: String },

    /// A wizard action that the current step does not allow.
    #[error("cannot {action} from step {step}")]
    InvalidTransition {
        step: &'static str,
        action: &'static str,
    },
}

impl Conflict {
    pub fn offending_id(&self) -> String {
        match self {
            Conflict::ItemNoLongerAvailable { item_id }
            | Conflict::ItemUnavailable { item_id }
            | Conflict::DuplicateItem { item_id }
            | Conflict::AlreadyReturned { item_id, .. }
            | Conflict::ItemNotSold { item_id }
            | Conflict::ItemAlreadyExists { item_id } => item_id.to_string(),
            Conflict::DuplicateReference { reference } => reference.to_string(),
            Conflict::DuplicateBarcode { barcode } => barcode.clone(),
            Conflict::CurrencyMismatch { found, .. } => found.clone(),
            Conflict::InvalidTransition { step, .. } => (*step).to_string(),
        }
    }
}

/// External collaborators the sales engine depends on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    RateSource,
    Store,
    CustomerDirectory,
    SessionStorage,
}

impl core::fmt::Display for Dependency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Dependency::RateSource => "rate_source",
            Dependency::Store => "store",
            Dependency::CustomerDirectory => "customer_directory",
            Dependency::SessionStorage => "session_storage",
        };
        f.write_str(name)
    }
}

/// Domain-level error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation; `field` names the input to re-prompt for.
    #[error("validation failed for `{field}`: {message}")]
    Validation { field: &'static str, message: String },

    /// State changed underneath the caller.
    #[error("conflict: {0}")]
    Conflict(Conflict),

    /// A requested record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An external collaborator failed. Never retried inside the core.
    #[error("{dependency} failed: {message}")]
    Dependency {
        dependency: Dependency,
        message: String,
    },
}

impl DomainError {
    pub fn validation(field: &'static str, msg: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: msg.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn dependency(dependency: Dependency, msg: impl Into<String>) -> Self {
        Self::Dependency {
            dependency,
            message: msg.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation { .. } => ErrorKind::Validation,
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Dependency { .. } => ErrorKind::Dependency,
        }
    }

    /// Id of the offending entity, or the name of the offending field.
    pub fn offending_id(&self) -> String {
        match self {
            DomainError::Validation { field, .. } => (*field).to_string(),
            DomainError::Conflict(c) => c.offending_id(),
            DomainError::NotFound { id, .. } => id.clone(),
            DomainError::Dependency { dependency, .. } => dependency.to_string(),
        }
    }

    pub fn conflict(&self) -> Option<&Conflict> {
        match self {
            DomainError::Conflict(c) => Some(c),
            _ => None,
        }
    }
}

impl From<Conflict> for DomainError {
    fn from(value: Conflict) -> Self {
        DomainError::Conflict(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_errors_expose_the_offending_item() {
        let item_id = ItemId::new();
        let err: DomainError = Conflict::ItemNoLongerAvailable { item_id }.into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.offending_id(), item_id.to_string());
    }

    #[test]
    fn validation_errors_expose_the_field() {
        let err = DomainError::validation("weight", "must be positive");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.offending_id(), "weight");
        assert_eq!(
            err.to_string(),
            "validation failed for `weight`: must be positive"
        );
    }

    #[test]
    fn dependency_errors_name_the_collaborator() {
        let err = DomainError::dependency(Dependency::RateSource, "no current rate");
        assert_eq!(err.kind(), ErrorKind::Dependency);
        assert_eq!(err.offending_id(), "rate_source");
    }
}

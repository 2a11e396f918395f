//! Treasury domain errors

use thiserror::Error;

use core_kernel::{MoneyError, PortError, ValidationError, ValidationKind};

/// Errors that can occur in the treasury domain
#[derive(Debug, Error)]
pub enum TreasuryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Port(#[from] PortError),

    /// Calculation error
    #[error("Calculation error: {0}")]
    Money(#[from] MoneyError),

    /// Deletion refused because live entries still reference the account
    #[error("{entity} {id} still has {count} active {dependents}")]
    HasDependents {
        entity: &'static str,
        id: String,
        count: usize,
        dependents: &'static str,
    },

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl TreasuryError {
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    pub fn kind(&self) -> Option<ValidationKind> {
        match self {
            Self::Validation(err) => Some(err.kind),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Port(err) if err.is_not_found())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Port(err) if err.is_conflict())
    }
}

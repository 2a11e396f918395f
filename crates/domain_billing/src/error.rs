//! Billing domain errors

use thiserror::Error;

use core_kernel::{MoneyError, PortError, ValidationError, ValidationKind};

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Input rejected before anything was written
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Persistence failure, including not found and version conflicts
    #[error(transparent)]
    Port(#[from] PortError),

    /// Calculation error
    #[error("Calculation error: {0}")]
    Money(#[from] MoneyError),

    /// Deletion refused because live records still depend on the target
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

impl BillingError {
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// The validation kind, for choosing the message shown to the user
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

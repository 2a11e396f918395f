//! Inventory domain errors

use thiserror::Error;

use core_kernel::{MoneyError, PortError, ValidationError, ValidationKind};

/// Errors that can occur in the inventory domain
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Port(#[from] PortError),

    /// Calculation error
    #[error("Calculation error: {0}")]
    Money(#[from] MoneyError),

    /// Deletion refused because live expenses still reference the car
    #[error("{entity} {id} still has {count} active {dependents}")]
    HasDependents {
        entity: &'static str,
        id: String,
        count: usize,
        dependents: &'static str,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl InventoryError {
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

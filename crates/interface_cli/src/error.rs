//! Errors surfaced by the workflows and the audit

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use core_kernel::ValidationKind;
use domain_billing::BillingError;
use domain_inventory::InventoryError;
use domain_treasury::TreasuryError;

use crate::snapshot::RowViolation;

/// Errors across the ledger domains
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Treasury(#[from] TreasuryError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Deletion refused because another domain still references the row
    #[error("{entity} {id} still has {count} active {dependents}")]
    HasDependents {
        entity: &'static str,
        id: String,
        count: usize,
        dependents: &'static str,
    },

    #[error("Snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot format: {0}")]
    Format(#[from] serde_json::Error),

    /// Rows that break an invariant; nothing was loaded
    #[error("Snapshot has {} invalid rows", .violations.len())]
    InvalidSnapshot { violations: Vec<RowViolation> },

    #[error("Configuration: {0}")]
    Config(#[from] config::ConfigError),
}

/// Error body printed for the UI collaborator
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ValidationKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<RowViolation>,
}

impl LedgerError {
    pub fn kind(&self) -> Option<ValidationKind> {
        match self {
            LedgerError::Billing(err) => err.kind(),
            LedgerError::Treasury(err) => err.kind(),
            LedgerError::Inventory(err) => err.kind(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            LedgerError::Billing(err) => err.is_not_found(),
            LedgerError::Treasury(err) => err.is_not_found(),
            LedgerError::Inventory(err) => err.is_not_found(),
            _ => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        match self {
            LedgerError::Billing(err) => err.is_conflict(),
            LedgerError::Treasury(err) => err.is_conflict(),
            LedgerError::Inventory(err) => err.is_conflict(),
            _ => false,
        }
    }

    fn has_dependents(&self) -> bool {
        matches!(
            self,
            LedgerError::HasDependents { .. }
                | LedgerError::Billing(BillingError::HasDependents { .. })
                | LedgerError::Treasury(TreasuryError::HasDependents { .. })
                | LedgerError::Inventory(InventoryError::HasDependents { .. })
        )
    }

    /// Stable error code for the error
    pub fn code(&self) -> &'static str {
        if self.kind().is_some() {
            "validation_error"
        } else if self.is_not_found() {
            "not_found"
        } else if self.is_conflict() {
            "conflict"
        } else if self.has_dependents() {
            "has_dependents"
        } else {
            match self {
                LedgerError::Snapshot { .. } => "snapshot_error",
                LedgerError::Format(_) => "format_error",
                LedgerError::InvalidSnapshot { .. } => "invalid_snapshot",
                LedgerError::Config(_) => "config_error",
                _ => "internal_error",
            }
        }
    }

    pub fn report(&self) -> ErrorReport {
        let violations = match self {
            LedgerError::InvalidSnapshot { violations } => violations.clone(),
            _ => Vec::new(),
        };
        ErrorReport {
            error: self.code(),
            message: self.to_string(),
            kind: self.kind(),
            violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{PortError, ValidationError};

    #[test]
    fn test_codes_follow_the_cause() {
        let validation = LedgerError::from(BillingError::from(ValidationError::required("client_id")));
        assert_eq!(validation.code(), "validation_error");
        assert_eq!(validation.kind(), Some(ValidationKind::RequiredFieldMissing));

        let missing = LedgerError::from(TreasuryError::from(PortError::not_found("Account", "ACC-1")));
        assert_eq!(missing.code(), "not_found");

        let blocked = LedgerError::from(InventoryError::HasDependents {
            entity: "Car",
            id: "CAR-1".to_string(),
            count: 2,
            dependents: "expenses",
        });
        assert_eq!(blocked.code(), "has_dependents");
    }

    #[test]
    fn test_report_serializes_kind() {
        let err = LedgerError::from(BillingError::from(ValidationError::required("car_id")));
        let json = serde_json::to_value(err.report()).unwrap();
        assert_eq!(json["error"], "validation_error");
        assert_eq!(json["kind"], "required_field_missing");
    }
}

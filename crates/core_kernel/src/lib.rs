//! Core Kernel - Foundational types for the dealership ledger
//!
//! This crate provides the building blocks shared by every ledger domain:
//! - Money with exact fixed-point arithmetic and settlement tolerance
//! - Strongly-typed identifiers
//! - Validation and core errors
//! - Persistence port plumbing (versioned commits, soft delete, pagination)
//! - Balance folds and drift detection

pub mod money;
pub mod identifiers;
pub mod error;
pub mod ports;
pub mod store;
pub mod balance;

pub use money::{Money, MoneyError, SETTLEMENT_EPSILON};
pub use identifiers::{
    ClientId, InvoiceId, PaymentId, AccountId, AccountEntryId,
    CarId, CarModelId, CarExpenseId,
};
pub use error::{CoreError, ValidationError, ValidationKind, require, require_positive};
pub use ports::{
    PortError, DomainPort, OperationMetadata, Page, PageRequest, Versioned, SoftDelete,
};
pub use store::VersionedTable;
pub use balance::{LedgerEntry, Drift, fold, detect_drift};

//! Core error types used across the ledger domains

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::money::{Money, MoneyError};

/// The reason a ledger mutation was rejected before anything was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    /// A payment, deposit, withdrawal or expense amount was zero or negative
    AmountNotPositive,
    /// An invoice amount or account cut was negative
    AmountNegative,
    /// A new or edited payment would overpay its invoice
    ExceedsRemainingBalance,
    /// An invoice amount was edited below what has already been paid
    AmountBelowPaid,
    /// An invoice's account cut is larger than the invoice itself
    AccountCutExceedsAmount,
    /// A required association (account, client, invoice, date) was missing
    RequiredFieldMissing,
    /// A stored signed delta disagrees with the entry's kind and amount
    InconsistentDelta,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ValidationKind::AmountNotPositive => "amount_not_positive",
            ValidationKind::AmountNegative => "amount_negative",
            ValidationKind::ExceedsRemainingBalance => "exceeds_remaining_balance",
            ValidationKind::AmountBelowPaid => "amount_below_paid",
            ValidationKind::AccountCutExceedsAmount => "account_cut_exceeds_amount",
            ValidationKind::RequiredFieldMissing => "required_field_missing",
            ValidationKind::InconsistentDelta => "inconsistent_delta",
        };
        f.write_str(label)
    }
}

/// A rejected mutation, carrying the kind the UI maps to a message
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ValidationError {
    pub kind: ValidationKind,
    pub message: String,
}

impl ValidationError {
    pub fn new(kind: ValidationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn amount_not_positive(what: &str, amount: Money) -> Self {
        Self::new(
            ValidationKind::AmountNotPositive,
            format!("{what} amount must be greater than zero, got {amount}"),
        )
    }

    pub fn amount_negative(what: &str, amount: Money) -> Self {
        Self::new(
            ValidationKind::AmountNegative,
            format!("{what} must not be negative, got {amount}"),
        )
    }

    pub fn exceeds_remaining(candidate: Money, remaining: Money) -> Self {
        Self::new(
            ValidationKind::ExceedsRemainingBalance,
            format!("payment of {candidate} exceeds remaining balance of {remaining}"),
        )
    }

    pub fn required(field: &str) -> Self {
        Self::new(
            ValidationKind::RequiredFieldMissing,
            format!("{field} is required"),
        )
    }
}

/// Requires an optional form field to be present
pub fn require<T>(value: Option<T>, field: &str) -> Result<T, ValidationError> {
    value.ok_or_else(|| ValidationError::required(field))
}

/// Requires an amount to be strictly positive
pub fn require_positive(what: &str, amount: Money) -> Result<Money, ValidationError> {
    if amount.is_positive() {
        Ok(amount)
    } else {
        Err(ValidationError::amount_not_positive(what, amount))
    }
}

/// Core error type for the kernel
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    pub fn not_found(message: impl Into<String>) -> Self {
        CoreError::NotFound(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        CoreError::Configuration(message.into())
    }
}

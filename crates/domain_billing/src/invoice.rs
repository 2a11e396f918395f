//! Invoices and their derived payment state
//!
//! An invoice stores only what was agreed: the amount, who owes it, and an
//! optional account cut. What has been paid, what remains and the status are
//! always derived from the payment set by [`InvoiceLedger`], never stored.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use core_kernel::{
    AccountId, CarId, ClientId, InvoiceId, Money, SoftDelete, ValidationError, ValidationKind,
    Versioned, SETTLEMENT_EPSILON,
};

use crate::payment::Payment;

/// Payment status derived from an invoice's payments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Nothing paid yet
    Unpaid,
    /// Some, but not all, of the amount paid
    Partial,
    /// Remaining balance is below the settlement epsilon
    Paid,
}

/// A billing record for one car sale to one client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier
    pub id: InvoiceId,
    /// Client being billed
    pub client_id: ClientId,
    /// Car being sold
    pub car_id: CarId,
    /// Internal account receiving the account cut, if any
    pub account_id: Option<AccountId>,
    /// Total amount owed
    pub amount: Money,
    /// Portion of the amount attributed to `account_id`
    pub account_cut: Money,
    /// Invoice date
    pub invoice_date: NaiveDate,
    /// Free-form notes
    pub notes: Option<String>,
    /// Optimistic concurrency version
    #[serde(default)]
    pub version: u64,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
    /// Soft delete marker
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Invoice {
    /// Creates a new invoice without an account cut
    ///
    /// # Errors
    ///
    /// `AmountNegative` if `amount` is below zero. A zero amount is allowed.
    pub fn new(
        client_id: ClientId,
        car_id: CarId,
        amount: Money,
        invoice_date: NaiveDate,
    ) -> Result<Self, ValidationError> {
        let now = Utc::now();
        let invoice = Self {
            id: InvoiceId::new_v7(),
            client_id,
            car_id,
            account_id: None,
            amount,
            account_cut: Money::ZERO,
            invoice_date,
            notes: None,
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        invoice.validate_terms()?;
        Ok(invoice)
    }

    /// Attributes part of the amount to an internal account
    pub fn with_account_cut(
        mut self,
        account_id: Option<AccountId>,
        account_cut: Money,
    ) -> Result<Self, ValidationError> {
        self.account_id = account_id;
        self.account_cut = account_cut;
        self.validate_terms()?;
        Ok(self)
    }

    /// Sets the notes
    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Checks the amount and account cut are consistent
    pub fn validate_terms(&self) -> Result<(), ValidationError> {
        if self.amount.is_negative() {
            return Err(ValidationError::amount_negative("Invoice amount", self.amount));
        }
        if self.account_cut.is_negative() {
            return Err(ValidationError::amount_negative("Account cut", self.account_cut));
        }
        if self.account_cut > self.amount {
            return Err(ValidationError::new(
                ValidationKind::AccountCutExceedsAmount,
                format!(
                    "account cut of {} exceeds invoice amount of {}",
                    self.account_cut, self.amount
                ),
            ));
        }
        if self.account_cut.is_positive() && self.account_id.is_none() {
            return Err(ValidationError::required("account_id"));
        }
        Ok(())
    }

    /// Returns the account and amount to post, if this invoice carries a cut
    pub fn cut(&self) -> Option<(AccountId, Money)> {
        match self.account_id {
            Some(account_id) if self.account_cut.is_positive() => Some((account_id, self.account_cut)),
            _ => None,
        }
    }

    /// Marks the invoice as modified
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Versioned for Invoice {
    type Id = InvoiceId;
    const ENTITY: &'static str = "Invoice";

    fn id(&self) -> InvoiceId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl SoftDelete for Invoice {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

/// Derived payment state of one invoice, as shown next to it in lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub paid: Money,
    pub remaining: Money,
    pub status: InvoiceStatus,
}

/// Pure queries over an invoice and its payments
///
/// Soft-deleted payments and payments belonging to other invoices never
/// count towards what an invoice has been paid.
pub struct InvoiceLedger;

impl InvoiceLedger {
    /// Sums the amounts of all live payments
    pub fn total_paid(payments: &[Payment]) -> Money {
        payments
            .iter()
            .filter(|p| !p.is_deleted())
            .map(|p| p.amount)
            .sum()
    }

    /// Sums the live payments that belong to `invoice`
    pub fn paid_towards(invoice: &Invoice, payments: &[Payment]) -> Money {
        payments
            .iter()
            .filter(|p| p.invoice_id == invoice.id && !p.is_deleted())
            .map(|p| p.amount)
            .sum()
    }

    /// Amount still owed, exact and never negative
    ///
    /// This is the headroom a new payment may use. Unlike
    /// [`InvoiceLedger::remaining_balance`] it does not snap sub-cent dust
    /// to zero, so the last fraction of a cent can still be paid off.
    pub fn headroom(invoice: &Invoice, payments: &[Payment]) -> Money {
        invoice
            .amount
            .saturating_sub(Self::paid_towards(invoice, payments))
            .max(Money::ZERO)
    }

    /// Amount still owed, floored at zero and snapped to zero below the epsilon
    ///
    /// A negative raw remainder means the invoice was overpaid upstream. It is
    /// reported as zero and logged, never surfaced.
    pub fn remaining_balance(invoice: &Invoice, payments: &[Payment]) -> Money {
        let raw = invoice.amount.saturating_sub(Self::paid_towards(invoice, payments));
        if raw.is_negative() && !raw.is_zero() {
            warn!(
                invoice_id = %invoice.id,
                amount = %invoice.amount,
                overpaid_by = %(-raw),
                "invoice payments exceed invoice amount"
            );
        }
        raw.max(Money::ZERO)
            .clamp_to_zero_if_negligible(SETTLEMENT_EPSILON)
    }

    /// True when live payments exceed the amount by at least the epsilon
    pub fn is_overpaid(invoice: &Invoice, payments: &[Payment]) -> bool {
        let raw = invoice.amount.saturating_sub(Self::paid_towards(invoice, payments));
        raw.is_negative() && !raw.is_zero()
    }

    /// Derives the status; `Paid` exactly when the remaining balance is zero
    pub fn status(invoice: &Invoice, payments: &[Payment]) -> InvoiceStatus {
        Self::summarize(invoice, payments).status
    }

    /// Computes paid, remaining and status in one pass
    pub fn summarize(invoice: &Invoice, payments: &[Payment]) -> InvoiceSummary {
        let paid = Self::paid_towards(invoice, payments);
        let remaining = Self::remaining_balance(invoice, payments);

        let status = if remaining.is_exactly_zero() {
            InvoiceStatus::Paid
        } else if paid.is_zero() {
            InvoiceStatus::Unpaid
        } else {
            InvoiceStatus::Partial
        };

        InvoiceSummary {
            invoice_id: invoice.id,
            amount: invoice.amount,
            paid,
            remaining,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn money(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    fn invoice(amount: &str) -> Invoice {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        Invoice::new(ClientId::new(), CarId::new(), money(amount), date).unwrap()
    }

    fn pay(invoice: &Invoice, amount: &str) -> Payment {
        Payment::new(invoice.id, money(amount), invoice.invoice_date).unwrap()
    }

    #[test]
    fn test_negative_invoice_rejected() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let err = Invoice::new(ClientId::new(), CarId::new(), money("-1"), date).unwrap_err();
        assert_eq!(err.kind, ValidationKind::AmountNegative);
    }

    #[test]
    fn test_cut_requires_account() {
        let err = invoice("100").with_account_cut(None, money("10")).unwrap_err();
        assert_eq!(err.kind, ValidationKind::RequiredFieldMissing);
    }

    #[test]
    fn test_cut_cannot_exceed_amount() {
        let err = invoice("100")
            .with_account_cut(Some(AccountId::new()), money("100.01"))
            .unwrap_err();
        assert_eq!(err.kind, ValidationKind::AccountCutExceedsAmount);
    }

    #[test]
    fn test_zero_cut_has_no_posting() {
        let inv = invoice("100").with_account_cut(Some(AccountId::new()), Money::ZERO).unwrap();
        assert!(inv.cut().is_none());
    }

    #[test]
    fn test_status_transitions() {
        let inv = invoice("100");
        let mut payments = Vec::new();
        assert_eq!(InvoiceLedger::status(&inv, &payments), InvoiceStatus::Unpaid);

        payments.push(pay(&inv, "60"));
        assert_eq!(InvoiceLedger::status(&inv, &payments), InvoiceStatus::Partial);

        payments.push(pay(&inv, "40"));
        assert_eq!(InvoiceLedger::status(&inv, &payments), InvoiceStatus::Paid);
    }

    #[test]
    fn test_huge_overpayment_clamps_instead_of_wrapping() {
        let inv = invoice("100");
        let huge = Money::from_units(i64::MAX / 2 + 10);
        let payments = vec![
            Payment::new(inv.id, huge, inv.invoice_date).unwrap(),
            Payment::new(inv.id, huge, inv.invoice_date).unwrap(),
        ];

        assert_eq!(InvoiceLedger::paid_towards(&inv, &payments), Money::from_units(i64::MAX));
        assert!(InvoiceLedger::is_overpaid(&inv, &payments));
        assert_eq!(InvoiceLedger::remaining_balance(&inv, &payments), Money::ZERO);
    }

    #[test]
    fn test_sub_cent_remainder_is_paid() {
        let inv = invoice("100");
        let payments = vec![pay(&inv, "33.3333"), pay(&inv, "33.3333"), pay(&inv, "33.3333")];

        let summary = InvoiceLedger::summarize(&inv, &payments);
        assert_eq!(summary.remaining, Money::ZERO);
        assert_eq!(summary.status, InvoiceStatus::Paid);
        assert_eq!(InvoiceLedger::headroom(&inv, &payments), money("0.0001"));
    }

    #[test]
    fn test_overpaid_remaining_is_zero() {
        let inv = invoice("100");
        let payments = vec![pay(&inv, "150")];

        assert_eq!(InvoiceLedger::remaining_balance(&inv, &payments), Money::ZERO);
        assert!(InvoiceLedger::is_overpaid(&inv, &payments));
    }

    #[test]
    fn test_deleted_and_foreign_payments_ignored() {
        let inv = invoice("100");
        let other = invoice("50");
        let mut deleted = pay(&inv, "30");
        deleted.mark_deleted(Utc::now());
        let payments = vec![pay(&inv, "20"), deleted, pay(&other, "50")];

        assert_eq!(InvoiceLedger::paid_towards(&inv, &payments), money("20"));
        assert_eq!(InvoiceLedger::remaining_balance(&inv, &payments), money("80"));
    }

    #[test]
    fn test_zero_amount_invoice_is_paid() {
        let inv = invoice("0");
        assert_eq!(InvoiceLedger::status(&inv, &[]), InvoiceStatus::Paid);
    }
}

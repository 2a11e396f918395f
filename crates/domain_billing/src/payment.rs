//! Payments and the rules for applying them to an invoice
//!
//! [`PaymentRegister`] decides whether a payment may be recorded or edited
//! and moves it in or out of an invoice's payment set. It never overpays an
//! invoice: the check runs against the exact remaining balance with no
//! upward tolerance.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{
    require_positive, InvoiceId, LedgerEntry, Money, PaymentId, SoftDelete, ValidationError,
    Versioned,
};

use crate::invoice::{Invoice, InvoiceLedger};

/// A payment received against one invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: PaymentId,
    /// Invoice being paid
    pub invoice_id: InvoiceId,
    /// Payment amount, always positive
    pub amount: Money,
    /// Payment date
    pub payment_date: NaiveDate,
    /// Notes
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

impl Payment {
    /// Creates a new payment
    ///
    /// # Errors
    ///
    /// `AmountNotPositive` if `amount <= 0`
    pub fn new(
        invoice_id: InvoiceId,
        amount: Money,
        payment_date: NaiveDate,
    ) -> Result<Self, ValidationError> {
        require_positive("Payment", amount)?;
        let now = Utc::now();

        Ok(Self {
            id: PaymentId::new_v7(),
            invoice_id,
            amount,
            payment_date,
            notes: None,
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Sets the notes
    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Checks a stored payment still has a positive amount
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_positive("Payment", self.amount).map(|_| ())
    }

    /// Marks the payment as modified
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Versioned for Payment {
    type Id = PaymentId;
    const ENTITY: &'static str = "Payment";

    fn id(&self) -> PaymentId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl SoftDelete for Payment {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

/// A payment raises the paying client's balance
impl LedgerEntry for Payment {
    fn delta(&self) -> Money {
        self.amount
    }

    fn is_void(&self) -> bool {
        self.is_deleted()
    }
}

/// Validation and set transitions for payments on one invoice
pub struct PaymentRegister;

impl PaymentRegister {
    /// Checks a new payment against the invoice's remaining balance
    ///
    /// # Errors
    ///
    /// - `AmountNotPositive` when `candidate <= 0`
    /// - `ExceedsRemainingBalance` when `candidate` is larger than what is
    ///   still owed; paying exactly the remaining balance is allowed
    pub fn validate_new_payment(
        invoice: &Invoice,
        existing: &[Payment],
        candidate: Money,
    ) -> Result<(), ValidationError> {
        require_positive("Payment", candidate)?;

        let headroom = InvoiceLedger::headroom(invoice, existing);
        if candidate > headroom {
            return Err(ValidationError::exceeds_remaining(candidate, headroom));
        }
        Ok(())
    }

    /// Checks an edited payment as if its previous amount were not recorded
    ///
    /// The payment may grow up to its own previous contribution plus any
    /// headroom the invoice still has.
    pub fn validate_updated_payment(
        invoice: &Invoice,
        existing: &[Payment],
        editing: &Payment,
        new_amount: Money,
    ) -> Result<(), ValidationError> {
        let others: Vec<Payment> = existing
            .iter()
            .filter(|p| p.id != editing.id)
            .cloned()
            .collect();

        Self::validate_new_payment(invoice, &others, new_amount)
    }

    /// Adds a payment to the set, replacing any entry with the same id
    pub fn apply(payments: &mut Vec<Payment>, payment: Payment) {
        match payments.iter_mut().find(|p| p.id == payment.id) {
            Some(slot) => *slot = payment,
            None => payments.push(payment),
        }
    }

    /// Removes a payment from the set, returning it
    pub fn retract(payments: &mut Vec<Payment>, payment_id: PaymentId) -> Option<Payment> {
        let index = payments.iter().position(|p| p.id == payment_id)?;
        Some(payments.remove(index))
    }

    /// Swaps a payment for its edited version in one step, returning the old one
    pub fn replace(payments: &mut Vec<Payment>, updated: Payment) -> Option<Payment> {
        let slot = payments.iter_mut().find(|p| p.id == updated.id)?;
        Some(std::mem::replace(slot, updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{CarId, ClientId, ValidationKind};
    use std::str::FromStr;

    fn money(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn invoice(amount: &str) -> Invoice {
        Invoice::new(ClientId::new(), CarId::new(), money(amount), date()).unwrap()
    }

    #[test]
    fn test_payment_must_be_positive() {
        let err = Payment::new(InvoiceId::new(), Money::ZERO, date()).unwrap_err();
        assert_eq!(err.kind, ValidationKind::AmountNotPositive);
    }

    #[test]
    fn test_exact_remaining_is_allowed() {
        let inv = invoice("100");
        let existing = vec![Payment::new(inv.id, money("60"), date()).unwrap()];
        assert!(PaymentRegister::validate_new_payment(&inv, &existing, money("40")).is_ok());
    }

    #[test]
    fn test_one_unit_over_is_rejected() {
        let inv = invoice("100");
        let existing = vec![Payment::new(inv.id, money("60"), date()).unwrap()];
        let err = PaymentRegister::validate_new_payment(&inv, &existing, money("40.0001")).unwrap_err();
        assert_eq!(err.kind, ValidationKind::ExceedsRemainingBalance);
    }

    #[test]
    fn test_apply_is_idempotent_per_id() {
        let inv = invoice("100");
        let payment = Payment::new(inv.id, money("10"), date()).unwrap();
        let mut payments = Vec::new();
        PaymentRegister::apply(&mut payments, payment.clone());
        PaymentRegister::apply(&mut payments, payment);
        assert_eq!(payments.len(), 1);
    }

    #[test]
    fn test_replace_returns_previous() {
        let inv = invoice("100");
        let payment = Payment::new(inv.id, money("10"), date()).unwrap();
        let mut payments = vec![payment.clone()];

        let mut edited = payment.clone();
        edited.amount = money("25");
        let previous = PaymentRegister::replace(&mut payments, edited).unwrap();

        assert_eq!(previous.amount, money("10"));
        assert_eq!(payments[0].amount, money("25"));
    }

    #[test]
    fn test_retract_unknown_is_none() {
        let mut payments = Vec::new();
        assert!(PaymentRegister::retract(&mut payments, PaymentId::new()).is_none());
    }
}

//! Clients and their running balance
//!
//! A client's balance is what they owe, signed: every invoice moves it down
//! by the invoice amount and every payment moves it back up. A negative
//! balance means the client owes money and is a valid state.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{
    fold, ClientId, InvoiceId, LedgerEntry, Money, MoneyError, SoftDelete, ValidationError,
    Versioned,
};

use crate::error::BillingError;
use crate::invoice::Invoice;
use crate::payment::Payment;

/// A dealership client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub phone: Option<String>,
    /// Cached balance; negative when the client owes money
    #[serde(default)]
    pub balance: Money,
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Client {
    /// Creates a client with a zero balance
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ClientId::new_v7(),
            name: name.into(),
            phone: None,
            balance: Money::ZERO,
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn with_phone(mut self, phone: Option<String>) -> Self {
        self.phone = phone;
        self
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Versioned for Client {
    type Id = ClientId;
    const ENTITY: &'static str = "Client";

    fn id(&self) -> ClientId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl SoftDelete for Client {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

/// One movement of a client's balance
#[derive(Debug, Clone, Copy)]
pub enum ClientCharge<'a> {
    Invoice(&'a Invoice),
    Payment(&'a Payment),
}

impl LedgerEntry for ClientCharge<'_> {
    fn delta(&self) -> Money {
        match self {
            ClientCharge::Invoice(invoice) => -invoice.amount,
            ClientCharge::Payment(payment) => payment.amount,
        }
    }

    fn is_void(&self) -> bool {
        match self {
            ClientCharge::Invoice(invoice) => invoice.is_deleted(),
            ClientCharge::Payment(payment) => payment.is_deleted(),
        }
    }
}

/// Balance transitions for a client
///
/// Retractions take the amount that was applied, read from the stored
/// invoice or payment, so they reverse the earlier effect exactly. Every
/// transition is checked: a balance that would leave the `Money` range is
/// refused with `MoneyError::Overflow` and the client is left untouched.
pub struct ClientLedger;

impl ClientLedger {
    /// Charges an invoice to the client
    pub fn apply_invoice(client: &mut Client, amount: Money) -> Result<(), BillingError> {
        if amount.is_negative() {
            return Err(ValidationError::amount_negative("Invoice amount", amount).into());
        }
        Self::set_balance(client, client.balance.checked_sub(amount)?);
        Ok(())
    }

    /// Reverses an earlier invoice charge
    pub fn retract_invoice(client: &mut Client, amount: Money) -> Result<(), BillingError> {
        Self::set_balance(client, client.balance.checked_add(amount)?);
        Ok(())
    }

    /// Re-prices an invoice in one step
    pub fn replace_invoice(
        client: &mut Client,
        old_amount: Money,
        new_amount: Money,
    ) -> Result<(), BillingError> {
        if new_amount.is_negative() {
            return Err(ValidationError::amount_negative("Invoice amount", new_amount).into());
        }
        let balance = client.balance.checked_add(old_amount)?.checked_sub(new_amount)?;
        Self::set_balance(client, balance);
        Ok(())
    }

    /// Credits a payment to the client
    pub fn apply_payment(client: &mut Client, amount: Money) -> Result<(), BillingError> {
        if !amount.is_positive() {
            return Err(ValidationError::amount_not_positive("Payment", amount).into());
        }
        Self::set_balance(client, client.balance.checked_add(amount)?);
        Ok(())
    }

    /// Reverses an earlier payment credit
    pub fn retract_payment(client: &mut Client, amount: Money) -> Result<(), BillingError> {
        Self::set_balance(client, client.balance.checked_sub(amount)?);
        Ok(())
    }

    /// Swaps a payment's old amount for its new one in one step
    pub fn replace_payment(
        client: &mut Client,
        old_amount: Money,
        new_amount: Money,
    ) -> Result<(), BillingError> {
        if !new_amount.is_positive() {
            return Err(ValidationError::amount_not_positive("Payment", new_amount).into());
        }
        let balance = client.balance.checked_sub(old_amount)?.checked_add(new_amount)?;
        Self::set_balance(client, balance);
        Ok(())
    }

    /// Derives the balance from the client's invoices and their payments
    ///
    /// Invoices of other clients, payments on those invoices, and anything
    /// soft-deleted are ignored.
    pub fn recompute(
        client_id: ClientId,
        invoices: &[Invoice],
        payments: &[Payment],
    ) -> Result<Money, MoneyError> {
        let owned: HashSet<InvoiceId> = invoices
            .iter()
            .filter(|invoice| invoice.client_id == client_id)
            .map(|invoice| invoice.id)
            .collect();

        let charges: Vec<ClientCharge<'_>> = invoices
            .iter()
            .filter(|invoice| invoice.client_id == client_id)
            .map(ClientCharge::Invoice)
            .chain(
                payments
                    .iter()
                    .filter(|payment| owned.contains(&payment.invoice_id))
                    .map(ClientCharge::Payment),
            )
            .collect();

        fold(Money::ZERO, &charges)
    }

    fn set_balance(client: &mut Client, balance: Money) {
        client.balance = balance;
        client.touch();
    }
}

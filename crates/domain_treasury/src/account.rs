//! Internal accounts and the entries that move them
//!
//! Every entry stores both its magnitude and its signed effect on the
//! account. Retracting an entry subtracts the stored signed delta, so a
//! withdrawal is never mistaken for a deposit when it is reversed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{
    require_positive, AccountEntryId, AccountId, InvoiceId, LedgerEntry, Money, SoftDelete,
    ValidationError, ValidationKind, Versioned,
};

/// An internal dealership account (cash box, bank, partner, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    /// Cached running balance; negative means the account is in debt
    #[serde(default)]
    pub balance: Money,
    pub notes: Option<String>,
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Creates an account with a zero balance
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new_v7(),
            name: name.into(),
            balance: Money::ZERO,
            notes: None,
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Versioned for Account {
    type Id = AccountId;
    const ENTITY: &'static str = "Account";

    fn id(&self) -> AccountId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl SoftDelete for Account {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

/// What kind of movement an entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    /// Money put into the account
    Deposit,
    /// Money taken out of the account
    Withdrawal,
    /// The account's share of an invoice
    InvoiceCut { invoice_id: InvoiceId },
}

impl EntryKind {
    /// Sign applied to the entry amount
    pub fn signed(&self, amount: Money) -> Money {
        match self {
            EntryKind::Deposit | EntryKind::InvoiceCut { .. } => amount,
            EntryKind::Withdrawal => -amount,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::Deposit => "Deposit",
            EntryKind::Withdrawal => "Withdrawal",
            EntryKind::InvoiceCut { .. } => "Invoice cut",
        }
    }

    pub fn invoice_id(&self) -> Option<InvoiceId> {
        match self {
            EntryKind::InvoiceCut { invoice_id } => Some(*invoice_id),
            _ => None,
        }
    }
}

/// One deposit, withdrawal or invoice cut on an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub id: AccountEntryId,
    pub account_id: AccountId,
    pub kind: EntryKind,
    /// Magnitude, always positive
    pub amount: Money,
    /// Signed effect on the account balance
    pub delta: Money,
    pub entry_date: NaiveDate,
    pub notes: Option<String>,
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AccountEntry {
    /// Creates an entry of any kind
    ///
    /// # Errors
    ///
    /// `AmountNotPositive` if `amount <= 0`
    pub fn new(
        account_id: AccountId,
        kind: EntryKind,
        amount: Money,
        entry_date: NaiveDate,
    ) -> Result<Self, ValidationError> {
        require_positive(kind.label(), amount)?;
        let now = Utc::now();

        Ok(Self {
            id: AccountEntryId::new_v7(),
            account_id,
            kind,
            amount,
            delta: kind.signed(amount),
            entry_date,
            notes: None,
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    pub fn deposit(account_id: AccountId, amount: Money, date: NaiveDate) -> Result<Self, ValidationError> {
        Self::new(account_id, EntryKind::Deposit, amount, date)
    }

    pub fn withdrawal(account_id: AccountId, amount: Money, date: NaiveDate) -> Result<Self, ValidationError> {
        Self::new(account_id, EntryKind::Withdrawal, amount, date)
    }

    pub fn invoice_cut(
        account_id: AccountId,
        invoice_id: InvoiceId,
        amount: Money,
        date: NaiveDate,
    ) -> Result<Self, ValidationError> {
        Self::new(account_id, EntryKind::InvoiceCut { invoice_id }, amount, date)
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Returns a copy with a new amount and the matching signed delta
    pub fn with_amount(&self, amount: Money) -> Result<Self, ValidationError> {
        require_positive(self.kind.label(), amount)?;
        let mut updated = self.clone();
        updated.amount = amount;
        updated.delta = self.kind.signed(amount);
        updated.touch();
        Ok(updated)
    }

    /// Checks the amount is positive and the stored delta matches the kind
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_positive(self.kind.label(), self.amount)?;
        let expected = self.kind.signed(self.amount);
        if self.delta != expected {
            return Err(ValidationError::new(
                ValidationKind::InconsistentDelta,
                format!(
                    "{} of {} must move the balance by {}, not {}",
                    self.kind.label(),
                    self.amount,
                    expected,
                    self.delta
                ),
            ));
        }
        Ok(())
    }

    pub fn is_invoice_cut(&self) -> bool {
        matches!(self.kind, EntryKind::InvoiceCut { .. })
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Versioned for AccountEntry {
    type Id = AccountEntryId;
    const ENTITY: &'static str = "AccountEntry";

    fn id(&self) -> AccountEntryId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl SoftDelete for AccountEntry {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

impl LedgerEntry for AccountEntry {
    fn delta(&self) -> Money {
        self.delta
    }

    fn is_void(&self) -> bool {
        self.is_deleted()
    }
}

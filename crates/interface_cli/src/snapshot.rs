//! JSON snapshots of the ledger and the in-memory stores they load into
//!
//! A snapshot is checked row by row before it is loaded. Cached balances may
//! drift, since finding that is the audit's job, but a row that breaks an
//! entity invariant or points at a missing owner would corrupt the very
//! history the caches are compared against, so such a snapshot is refused.

use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use core_kernel::{ValidationError, ValidationKind};

use domain_billing::ports::memory::InMemoryBillingPort;
use domain_billing::{Client, Invoice, Payment};
use domain_inventory::ports::memory::InMemoryInventoryPort;
use domain_inventory::{Car, CarExpense};
use domain_treasury::ports::memory::InMemoryTreasuryPort;
use domain_treasury::{Account, AccountEntry};

use crate::error::LedgerError;
use crate::workflows::DealershipLedger;

/// A snapshot row that breaks a ledger invariant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowViolation {
    pub table: &'static str,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ValidationKind>,
    pub message: String,
}

impl RowViolation {
    fn invalid(table: &'static str, id: impl Display, error: ValidationError) -> Self {
        Self {
            table,
            id: id.to_string(),
            kind: Some(error.kind),
            message: error.message,
        }
    }

    fn dangling(table: &'static str, id: impl Display, owner: &str, owner_id: impl Display) -> Self {
        Self {
            table,
            id: id.to_string(),
            kind: Some(ValidationKind::RequiredFieldMissing),
            message: format!("{owner} {owner_id} is not in the snapshot"),
        }
    }
}

/// Every persisted row of the ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub clients: Vec<Client>,
    pub invoices: Vec<Invoice>,
    pub payments: Vec<Payment>,
    pub accounts: Vec<Account>,
    pub account_entries: Vec<AccountEntry>,
    pub cars: Vec<Car>,
    pub car_expenses: Vec<CarExpense>,
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let text = std::fs::read_to_string(path).map_err(|source| LedgerError::Snapshot {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot = Self::from_json(&text)?;

        info!(
            path = %path.display(),
            clients = snapshot.clients.len(),
            invoices = snapshot.invoices.len(),
            accounts = snapshot.accounts.len(),
            cars = snapshot.cars.len(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }

    pub fn from_json(text: &str) -> Result<Self, LedgerError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|source| LedgerError::Snapshot {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks every row before it is loaded
    ///
    /// Rejected: duplicate ids, amounts that break the entity rules, entry
    /// deltas that disagree with their kind, and payments, entries, expenses
    /// or invoices whose owner is missing. Cars are not required for
    /// invoices, since no balance is folded through them. Overpaid invoices
    /// are accepted and left for the audit to report.
    ///
    /// # Errors
    ///
    /// `InvalidSnapshot` listing every violation found.
    pub fn validate(&self) -> Result<(), LedgerError> {
        let mut violations = Vec::new();

        let clients = unique_ids("clients", self.clients.iter().map(|r| r.id), &mut violations);
        let invoices = unique_ids("invoices", self.invoices.iter().map(|r| r.id), &mut violations);
        unique_ids("payments", self.payments.iter().map(|r| r.id), &mut violations);
        let accounts = unique_ids("accounts", self.accounts.iter().map(|r| r.id), &mut violations);
        unique_ids("account_entries", self.account_entries.iter().map(|r| r.id), &mut violations);
        let cars = unique_ids("cars", self.cars.iter().map(|r| r.id), &mut violations);
        unique_ids("car_expenses", self.car_expenses.iter().map(|r| r.id), &mut violations);

        for invoice in &self.invoices {
            if let Err(err) = invoice.validate_terms() {
                violations.push(RowViolation::invalid("invoices", invoice.id, err));
            }
            if !clients.contains(&invoice.client_id) {
                violations.push(RowViolation::dangling("invoices", invoice.id, "Client", invoice.client_id));
            }
            if let Some(account_id) = invoice.account_id.filter(|id| !accounts.contains(id)) {
                violations.push(RowViolation::dangling("invoices", invoice.id, "Account", account_id));
            }
        }

        for payment in &self.payments {
            if let Err(err) = payment.validate() {
                violations.push(RowViolation::invalid("payments", payment.id, err));
            }
            if !invoices.contains(&payment.invoice_id) {
                violations.push(RowViolation::dangling("payments", payment.id, "Invoice", payment.invoice_id));
            }
        }

        for entry in &self.account_entries {
            if let Err(err) = entry.validate() {
                violations.push(RowViolation::invalid("account_entries", entry.id, err));
            }
            if !accounts.contains(&entry.account_id) {
                violations.push(RowViolation::dangling("account_entries", entry.id, "Account", entry.account_id));
            }
            if let Some(invoice_id) = entry.kind.invoice_id().filter(|id| !invoices.contains(id)) {
                violations.push(RowViolation::dangling("account_entries", entry.id, "Invoice", invoice_id));
            }
        }

        for car in &self.cars {
            if let Err(err) = car.validate() {
                violations.push(RowViolation::invalid("cars", car.id, err));
            }
        }

        for expense in &self.car_expenses {
            if let Err(err) = expense.validate() {
                violations.push(RowViolation::invalid("car_expenses", expense.id, err));
            }
            if !cars.contains(&expense.car_id) {
                violations.push(RowViolation::dangling("car_expenses", expense.id, "Car", expense.car_id));
            }
        }

        if violations.is_empty() {
            return Ok(());
        }
        for violation in &violations {
            warn!(table = violation.table, id = %violation.id, message = %violation.message, "invalid snapshot row");
        }
        Err(LedgerError::InvalidSnapshot { violations })
    }

    /// Orders every table by id so saved snapshots diff cleanly
    fn sorted(mut self) -> Self {
        self.clients.sort_by_key(|row| row.id);
        self.invoices.sort_by_key(|row| row.id);
        self.payments.sort_by_key(|row| row.id);
        self.accounts.sort_by_key(|row| row.id);
        self.account_entries.sort_by_key(|row| row.id);
        self.cars.sort_by_key(|row| row.id);
        self.car_expenses.sort_by_key(|row| row.id);
        self
    }
}

/// The in-memory adapters of all three domains
#[derive(Debug, Clone, Default)]
pub struct MemoryStores {
    pub billing: Arc<InMemoryBillingPort>,
    pub treasury: Arc<InMemoryTreasuryPort>,
    pub inventory: Arc<InMemoryInventoryPort>,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates stores holding the snapshot's rows
    ///
    /// # Errors
    ///
    /// `InvalidSnapshot` if any row fails [`Snapshot::validate`]; nothing is
    /// loaded.
    pub async fn load(snapshot: Snapshot) -> Result<Self, LedgerError> {
        snapshot.validate()?;

        let stores = Self::new();
        stores
            .billing
            .seed(snapshot.clients, snapshot.invoices, snapshot.payments)
            .await;
        stores
            .treasury
            .seed(snapshot.accounts, snapshot.account_entries)
            .await;
        stores.inventory.seed(snapshot.cars, snapshot.car_expenses).await;
        Ok(stores)
    }

    /// Copies the current rows out of the stores
    pub async fn snapshot(&self) -> Snapshot {
        let (clients, invoices, payments) = self.billing.dump().await;
        let (accounts, account_entries) = self.treasury.dump().await;
        let (cars, car_expenses) = self.inventory.dump().await;

        Snapshot {
            clients,
            invoices,
            payments,
            accounts,
            account_entries,
            cars,
            car_expenses,
        }
        .sorted()
    }

    /// Services over these stores
    pub fn ledger(&self) -> DealershipLedger {
        DealershipLedger::new(
            self.billing.clone(),
            self.treasury.clone(),
            self.inventory.clone(),
        )
    }
}

/// Collects a table's ids, recording each repeated one
fn unique_ids<I>(
    table: &'static str,
    ids: impl Iterator<Item = I>,
    violations: &mut Vec<RowViolation>,
) -> HashSet<I>
where
    I: Copy + Eq + Hash + Display,
{
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            violations.push(RowViolation {
                table,
                id: id.to_string(),
                kind: None,
                message: "duplicate id".to_string(),
            });
        }
    }
    seen
}

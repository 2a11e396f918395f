//! Treasury domain services
//!
//! Deposits, withdrawals and invoice cuts are recorded, edited and deleted
//! here. Each action commits the entry together with its account so the
//! cached balance and the entry history never disagree.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use core_kernel::{
    require, AccountEntryId, AccountId, Drift, InvoiceId, Money,
    OperationMetadata, Page, PageRequest, SoftDelete, ValidationError,
};

use crate::account::{Account, AccountEntry, EntryKind};
use crate::error::TreasuryError;
use crate::ledger::AccountLedger;
use crate::ports::{single, AccountQuery, EntryQuery, TreasuryCommit, TreasuryPort, TreasuryPortExt};

/// Form input for a deposit or withdrawal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEntry {
    pub account_id: Option<AccountId>,
    pub amount: Money,
    pub entry_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Form input for editing an entry; `None` keeps the stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryEdit {
    pub amount: Money,
    pub entry_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Where an invoice's cut should be posted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutTarget {
    pub account_id: AccountId,
    pub amount: Money,
    pub entry_date: NaiveDate,
}

/// An entry after a mutation, with its account's new balance
#[derive(Debug, Clone, Serialize)]
pub struct EntryOutcome {
    pub entry: AccountEntry,
    pub account_balance: Money,
}

/// Manages accounts and their entries
pub struct TreasuryService {
    port: Arc<dyn TreasuryPort>,
}

impl TreasuryService {
    pub fn new(port: Arc<dyn TreasuryPort>) -> Self {
        Self { port }
    }

    /// Opens an account with a zero balance
    #[instrument(skip(self, metadata))]
    pub async fn create_account(
        &self,
        name: String,
        notes: Option<String>,
        metadata: Option<OperationMetadata>,
    ) -> Result<Account, TreasuryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::required("name").into());
        }

        let committed = self
            .port
            .commit(TreasuryCommit::new().account(Account::new(name).with_notes(notes)), metadata)
            .await?;
        let account = single(committed.accounts, "account")?;

        info!(account_id = %account.id, "account created");
        Ok(account)
    }

    /// Soft-deletes an account; refused while it has live entries
    #[instrument(skip(self, metadata))]
    pub async fn delete_account(
        &self,
        id: AccountId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Account, TreasuryError> {
        let mut account = self.port.get_live_account(id, metadata.clone()).await?;
        let live = self
            .port
            .list_entries(EntryQuery::for_account(id), PageRequest::default(), metadata.clone())
            .await?;
        if live.total > 0 {
            return Err(TreasuryError::HasDependents {
                entity: "Account",
                id: id.to_string(),
                count: live.total,
                dependents: "entries",
            });
        }

        account.mark_deleted(Utc::now());
        account.touch();
        let committed = self
            .port
            .commit(TreasuryCommit::new().account(account), metadata)
            .await?;

        info!("account deleted");
        Ok(single(committed.accounts, "account")?)
    }

    #[instrument(skip(self, metadata))]
    pub async fn restore_account(
        &self,
        id: AccountId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Account, TreasuryError> {
        let mut account = self.port.get_account(id, metadata.clone()).await?;
        if !account.is_deleted() {
            return Err(TreasuryError::invalid_operation(format!("Account {id} is not deleted")));
        }

        account.restore();
        account.touch();
        let committed = self
            .port
            .commit(TreasuryCommit::new().account(account), metadata)
            .await?;

        info!("account restored");
        Ok(single(committed.accounts, "account")?)
    }

    /// Puts money into an account
    #[instrument(skip_all, fields(account_id = ?request.account_id, amount = %request.amount))]
    pub async fn record_deposit(
        &self,
        request: NewEntry,
        metadata: Option<OperationMetadata>,
    ) -> Result<EntryOutcome, TreasuryError> {
        self.record(EntryKind::Deposit, request, metadata).await
    }

    /// Takes money out of an account; the balance may go negative
    #[instrument(skip_all, fields(account_id = ?request.account_id, amount = %request.amount))]
    pub async fn record_withdrawal(
        &self,
        request: NewEntry,
        metadata: Option<OperationMetadata>,
    ) -> Result<EntryOutcome, TreasuryError> {
        self.record(EntryKind::Withdrawal, request, metadata).await
    }

    /// Posts an invoice's cut to an account
    #[instrument(skip(self, metadata))]
    pub async fn record_invoice_cut(
        &self,
        account_id: AccountId,
        invoice_id: InvoiceId,
        amount: Money,
        entry_date: NaiveDate,
        metadata: Option<OperationMetadata>,
    ) -> Result<EntryOutcome, TreasuryError> {
        let mut account = self.port.get_live_account(account_id, metadata.clone()).await?;
        let entry = AccountLedger::apply_invoice_cut(&mut account, invoice_id, amount, entry_date)?;
        self.commit_one(account, entry, metadata).await
    }

    /// Changes an entry's amount, date or notes in one commit
    ///
    /// Invoice cuts follow their invoice and cannot be edited directly.
    #[instrument(skip(self, edit, metadata), fields(amount = %edit.amount))]
    pub async fn edit_entry(
        &self,
        id: AccountEntryId,
        edit: EntryEdit,
        metadata: Option<OperationMetadata>,
    ) -> Result<EntryOutcome, TreasuryError> {
        let current = self.port.get_live_entry(id, metadata.clone()).await?;
        Self::ensure_manual(&current)?;

        let mut updated = current.with_amount(edit.amount)?;
        if let Some(date) = edit.entry_date {
            updated.entry_date = date;
        }
        if edit.notes.is_some() {
            updated.notes = edit.notes;
        }

        let mut account = self.port.get_live_account(current.account_id, metadata.clone()).await?;
        AccountLedger::replace(&mut account, &current, &updated)?;

        let outcome = self.commit_one(account, updated, metadata).await?;
        info!(previous = %current.amount, balance = %outcome.account_balance, "entry edited");
        Ok(outcome)
    }

    /// Soft-deletes a deposit or withdrawal and reverses its effect
    #[instrument(skip(self, metadata))]
    pub async fn delete_entry(
        &self,
        id: AccountEntryId,
        metadata: Option<OperationMetadata>,
    ) -> Result<EntryOutcome, TreasuryError> {
        let mut entry = self.port.get_live_entry(id, metadata.clone()).await?;
        Self::ensure_manual(&entry)?;

        let mut account = self.port.get_account(entry.account_id, metadata.clone()).await?;
        AccountLedger::retract(&mut account, &entry)?;
        entry.mark_deleted(Utc::now());
        entry.touch();

        let outcome = self.commit_one(account, entry, metadata).await?;
        info!(balance = %outcome.account_balance, "entry deleted");
        Ok(outcome)
    }

    /// Brings back a soft-deleted deposit or withdrawal
    #[instrument(skip(self, metadata))]
    pub async fn restore_entry(
        &self,
        id: AccountEntryId,
        metadata: Option<OperationMetadata>,
    ) -> Result<EntryOutcome, TreasuryError> {
        let mut entry = self.port.get_entry(id, metadata.clone()).await?;
        if !entry.is_deleted() {
            return Err(TreasuryError::invalid_operation(format!("Entry {id} is not deleted")));
        }
        Self::ensure_manual(&entry)?;

        let mut account = self.port.get_live_account(entry.account_id, metadata.clone()).await?;
        entry.restore();
        entry.touch();
        AccountLedger::apply(&mut account, &entry)?;

        let outcome = self.commit_one(account, entry, metadata).await?;
        info!(balance = %outcome.account_balance, "entry restored");
        Ok(outcome)
    }

    /// Makes the posted cut of an invoice match `target` in one commit
    ///
    /// With no target, or a zero amount, every live cut of the invoice is
    /// retracted. Moving the cut to another account retracts it from the old
    /// account and posts it to the new one.
    #[instrument(skip(self, metadata))]
    pub async fn sync_invoice_cut(
        &self,
        invoice_id: InvoiceId,
        target: Option<CutTarget>,
        metadata: Option<OperationMetadata>,
    ) -> Result<Vec<EntryOutcome>, TreasuryError> {
        let existing = self.port.cuts_for_invoice(invoice_id, metadata.clone()).await?;
        let target = target.filter(|t| t.amount.is_positive());

        let mut accounts: BTreeMap<AccountId, Account> = BTreeMap::new();
        let mut entries = Vec::new();
        let mut kept: Option<AccountEntryId> = None;

        if let Some(target) = target {
            let account = self.load_account(&mut accounts, target.account_id, true, &metadata).await?;

            match existing.iter().find(|e| e.account_id == target.account_id) {
                Some(current) => {
                    kept = Some(current.id);
                    if current.amount != target.amount || current.entry_date != target.entry_date {
                        let mut updated = current.with_amount(target.amount)?;
                        updated.entry_date = target.entry_date;
                        AccountLedger::replace(account, current, &updated)?;
                        entries.push(updated);
                    }
                }
                None => {
                    let entry = AccountLedger::apply_invoice_cut(
                        account,
                        invoice_id,
                        target.amount,
                        target.entry_date,
                    )?;
                    kept = Some(entry.id);
                    entries.push(entry);
                }
            }
        }

        for stale in existing.iter().filter(|e| Some(e.id) != kept) {
            let account = self.load_account(&mut accounts, stale.account_id, false, &metadata).await?;
            AccountLedger::retract(account, stale)?;
            let mut retracted = stale.clone();
            retracted.mark_deleted(Utc::now());
            retracted.touch();
            entries.push(retracted);
        }

        if entries.is_empty() {
            debug!("invoice cut already in sync");
            return Ok(Vec::new());
        }

        let batch = TreasuryCommit {
            accounts: accounts.into_values().collect(),
            entries,
        };
        let committed = self.port.commit(batch, metadata).await?;

        info!(entries = committed.entries.len(), "invoice cut synced");
        Ok(Self::outcomes(committed))
    }

    /// Retracts every live cut posted for an invoice
    pub async fn retract_invoice_cut(
        &self,
        invoice_id: InvoiceId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Vec<EntryOutcome>, TreasuryError> {
        self.sync_invoice_cut(invoice_id, None, metadata).await
    }

    /// Cached balance of an account
    pub async fn account_balance(
        &self,
        account_id: AccountId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Money, TreasuryError> {
        Ok(self.port.get_account(account_id, metadata).await?.balance)
    }

    pub async fn list_accounts(
        &self,
        query: AccountQuery,
        page: PageRequest,
        metadata: Option<OperationMetadata>,
    ) -> Result<Page<Account>, TreasuryError> {
        Ok(self.port.list_accounts(query, page, metadata).await?)
    }

    pub async fn list_entries(
        &self,
        query: EntryQuery,
        page: PageRequest,
        metadata: Option<OperationMetadata>,
    ) -> Result<Page<AccountEntry>, TreasuryError> {
        Ok(self.port.list_entries(query, page, metadata).await?)
    }

    /// Compares an account's cached balance with its entry history
    pub async fn account_drift(
        &self,
        account_id: AccountId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Option<Drift>, TreasuryError> {
        let account = self.port.get_account(account_id, metadata.clone()).await?;
        let history = self.port.entry_history(account_id, metadata).await?;
        let drift = AccountLedger::reconcile(&account, &history)?;

        if let Some(drift) = &drift {
            warn!(%account_id, cached = %drift.cached, recomputed = %drift.recomputed, "account balance drift");
        }
        Ok(drift)
    }

    /// Overwrites an account's cached balance with the recomputed one
    #[instrument(skip(self, metadata))]
    pub async fn repair_account_balance(
        &self,
        account_id: AccountId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Account, TreasuryError> {
        let mut account = self.port.get_account(account_id, metadata.clone()).await?;
        let history = self.port.entry_history(account_id, metadata.clone()).await?;
        let recomputed = AccountLedger::recompute(account_id, &history)?;
        if account.balance == recomputed {
            return Ok(account);
        }

        account.balance = recomputed;
        account.touch();
        let committed = self
            .port
            .commit(TreasuryCommit::new().account(account), metadata)
            .await?;
        let account = single(committed.accounts, "account")?;

        info!(balance = %account.balance, "account balance repaired");
        Ok(account)
    }

    async fn record(
        &self,
        kind: EntryKind,
        request: NewEntry,
        metadata: Option<OperationMetadata>,
    ) -> Result<EntryOutcome, TreasuryError> {
        let account_id = require(request.account_id, "account_id")?;
        let entry_date = require(request.entry_date, "entry_date")?;
        let entry = AccountEntry::new(account_id, kind, request.amount, entry_date)?
            .with_notes(request.notes);

        let mut account = self.port.get_live_account(account_id, metadata.clone()).await?;
        AccountLedger::apply(&mut account, &entry)?;

        let outcome = self.commit_one(account, entry, metadata).await?;
        info!(
            entry_id = %outcome.entry.id,
            kind = kind.label(),
            balance = %outcome.account_balance,
            "entry recorded"
        );
        Ok(outcome)
    }

    async fn commit_one(
        &self,
        account: Account,
        entry: AccountEntry,
        metadata: Option<OperationMetadata>,
    ) -> Result<EntryOutcome, TreasuryError> {
        let committed = self
            .port
            .commit(TreasuryCommit::new().account(account).entry(entry), metadata)
            .await?;
        let account = single(committed.accounts, "account")?;
        let entry = single(committed.entries, "entry")?;

        Ok(EntryOutcome {
            entry,
            account_balance: account.balance,
        })
    }

    async fn load_account<'a>(
        &self,
        accounts: &'a mut BTreeMap<AccountId, Account>,
        id: AccountId,
        live: bool,
        metadata: &Option<OperationMetadata>,
    ) -> Result<&'a mut Account, TreasuryError> {
        if !accounts.contains_key(&id) {
            let account = if live {
                self.port.get_live_account(id, metadata.clone()).await?
            } else {
                self.port.get_account(id, metadata.clone()).await?
            };
            accounts.insert(id, account);
        }
        accounts
            .get_mut(&id)
            .ok_or_else(|| TreasuryError::invalid_operation(format!("account {id} not loaded")))
    }

    fn outcomes(committed: TreasuryCommit) -> Vec<EntryOutcome> {
        let balances: BTreeMap<AccountId, Money> = committed
            .accounts
            .iter()
            .map(|account| (account.id, account.balance))
            .collect();

        committed
            .entries
            .into_iter()
            .map(|entry| EntryOutcome {
                account_balance: balances.get(&entry.account_id).copied().unwrap_or_default(),
                entry,
            })
            .collect()
    }

    fn ensure_manual(entry: &AccountEntry) -> Result<(), TreasuryError> {
        if entry.is_invoice_cut() {
            return Err(TreasuryError::invalid_operation(format!(
                "entry {} is an invoice cut and changes only with its invoice",
                entry.id
            )));
        }
        Ok(())
    }
}

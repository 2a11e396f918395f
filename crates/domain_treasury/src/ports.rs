//! Treasury Domain Ports
//!
//! `TreasuryPort` reads accounts and entries and writes them back through a
//! single atomic, version-checked [`TreasuryPort::commit`].

use async_trait::async_trait;
use chrono::NaiveDate;

use core_kernel::{
    AccountEntryId, AccountId, DomainPort, InvoiceId, OperationMetadata, Page, PageRequest,
    PortError, SoftDelete,
};

use crate::account::{Account, AccountEntry, EntryKind};

/// Kind filter for entry listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKindFilter {
    Deposits,
    Withdrawals,
    InvoiceCuts,
}

impl EntryKindFilter {
    pub fn matches(&self, kind: &EntryKind) -> bool {
        matches!(
            (self, kind),
            (EntryKindFilter::Deposits, EntryKind::Deposit)
                | (EntryKindFilter::Withdrawals, EntryKind::Withdrawal)
                | (EntryKindFilter::InvoiceCuts, EntryKind::InvoiceCut { .. })
        )
    }
}

/// Query parameters for listing entries
#[derive(Debug, Clone, Default)]
pub struct EntryQuery {
    pub account_id: Option<AccountId>,
    pub kind: Option<EntryKindFilter>,
    pub invoice_id: Option<InvoiceId>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub include_deleted: bool,
}

impl EntryQuery {
    pub fn for_account(account_id: AccountId) -> Self {
        Self {
            account_id: Some(account_id),
            ..Default::default()
        }
    }

    pub fn for_invoice(invoice_id: InvoiceId) -> Self {
        Self {
            invoice_id: Some(invoice_id),
            kind: Some(EntryKindFilter::InvoiceCuts),
            ..Default::default()
        }
    }

    pub fn of_kind(mut self, kind: EntryKindFilter) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

/// Query parameters for listing accounts
#[derive(Debug, Clone, Default)]
pub struct AccountQuery {
    pub name_contains: Option<String>,
    pub include_deleted: bool,
}

/// Rows to write in one transaction
#[derive(Debug, Clone, Default)]
pub struct TreasuryCommit {
    pub accounts: Vec<Account>,
    pub entries: Vec<AccountEntry>,
}

impl TreasuryCommit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }

    pub fn entry(mut self, entry: AccountEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.entries.is_empty()
    }
}

/// Port for treasury persistence
#[async_trait]
pub trait TreasuryPort: DomainPort {
    /// Gets an account by id, including soft-deleted ones
    async fn get_account(
        &self,
        id: AccountId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Account, PortError>;

    /// Lists accounts by name
    async fn list_accounts(
        &self,
        query: AccountQuery,
        page: PageRequest,
        metadata: Option<OperationMetadata>,
    ) -> Result<Page<Account>, PortError>;

    /// Gets an entry by id, including soft-deleted ones
    async fn get_entry(
        &self,
        id: AccountEntryId,
        metadata: Option<OperationMetadata>,
    ) -> Result<AccountEntry, PortError>;

    /// Lists entries, newest first
    async fn list_entries(
        &self,
        query: EntryQuery,
        page: PageRequest,
        metadata: Option<OperationMetadata>,
    ) -> Result<Page<AccountEntry>, PortError>;

    /// Writes a batch atomically, returning the rows with their new versions
    async fn commit(
        &self,
        batch: TreasuryCommit,
        metadata: Option<OperationMetadata>,
    ) -> Result<TreasuryCommit, PortError>;
}

/// Convenience operations built on top of TreasuryPort
#[async_trait]
pub trait TreasuryPortExt: TreasuryPort {
    /// Every entry of an account, soft-deleted ones included
    async fn entry_history(
        &self,
        account_id: AccountId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Vec<AccountEntry>, PortError> {
        let page = self
            .list_entries(
                EntryQuery::for_account(account_id).including_deleted(),
                PageRequest::all(),
                metadata,
            )
            .await?;
        Ok(page.items)
    }

    /// Live cut entries posted for an invoice
    async fn cuts_for_invoice(
        &self,
        invoice_id: InvoiceId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Vec<AccountEntry>, PortError> {
        let page = self
            .list_entries(EntryQuery::for_invoice(invoice_id), PageRequest::all(), metadata)
            .await?;
        Ok(page.items)
    }

    /// Gets an account, treating a soft-deleted one as missing
    async fn get_live_account(
        &self,
        id: AccountId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Account, PortError> {
        let account = self.get_account(id, metadata).await?;
        if account.is_deleted() {
            return Err(PortError::not_found("Account", id));
        }
        Ok(account)
    }

    /// Gets an entry, treating a soft-deleted one as missing
    async fn get_live_entry(
        &self,
        id: AccountEntryId,
        metadata: Option<OperationMetadata>,
    ) -> Result<AccountEntry, PortError> {
        let entry = self.get_entry(id, metadata).await?;
        if entry.is_deleted() {
            return Err(PortError::not_found("AccountEntry", id));
        }
        Ok(entry)
    }
}

impl<T: TreasuryPort + ?Sized> TreasuryPortExt for T {}

pub(crate) fn single<T>(rows: Vec<T>, entity: &str) -> Result<T, PortError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| PortError::internal(format!("commit returned no {entity}")))
}

/// In-memory implementation of TreasuryPort
#[cfg(any(test, feature = "memory"))]
pub mod memory {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use tracing::debug;

    use core_kernel::VersionedTable;

    #[derive(Debug, Default)]
    struct TreasuryTables {
        accounts: VersionedTable<Account>,
        entries: VersionedTable<AccountEntry>,
    }

    /// In-memory treasury store
    #[derive(Debug, Default, Clone)]
    pub struct InMemoryTreasuryPort {
        tables: Arc<RwLock<TreasuryTables>>,
    }

    impl InMemoryTreasuryPort {
        pub fn new() -> Self {
            Self::default()
        }

        /// Loads rows as they are, bypassing version checks and entity rules
        ///
        /// Untrusted rows belong behind a validating loader such as the
        /// CLI snapshot loader.
        pub async fn seed(&self, accounts: Vec<Account>, entries: Vec<AccountEntry>) {
            let mut tables = self.tables.write().await;
            for account in accounts {
                tables.accounts.seed(account);
            }
            for entry in entries {
                tables.entries.seed(entry);
            }
        }

        /// Copies every stored row, soft-deleted ones included
        pub async fn dump(&self) -> (Vec<Account>, Vec<AccountEntry>) {
            let tables = self.tables.read().await;
            (
                tables.accounts.values().cloned().collect(),
                tables.entries.values().cloned().collect(),
            )
        }
    }

    impl DomainPort for InMemoryTreasuryPort {}

    #[async_trait]
    impl TreasuryPort for InMemoryTreasuryPort {
        async fn get_account(
            &self,
            id: AccountId,
            _metadata: Option<OperationMetadata>,
        ) -> Result<Account, PortError> {
            self.tables
                .read()
                .await
                .accounts
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Account", id))
        }

        async fn list_accounts(
            &self,
            query: AccountQuery,
            page: PageRequest,
            _metadata: Option<OperationMetadata>,
        ) -> Result<Page<Account>, PortError> {
            let tables = self.tables.read().await;
            let needle = query.name_contains.map(|n| n.to_lowercase());
            let mut results: Vec<Account> = tables
                .accounts
                .values()
                .filter(|a| query.include_deleted || !a.is_deleted())
                .filter(|a| {
                    needle
                        .as_ref()
                        .map_or(true, |n| a.name.to_lowercase().contains(n.as_str()))
                })
                .cloned()
                .collect();

            results.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

            Ok(Page::paginate(results, page))
        }

        async fn get_entry(
            &self,
            id: AccountEntryId,
            _metadata: Option<OperationMetadata>,
        ) -> Result<AccountEntry, PortError> {
            self.tables
                .read()
                .await
                .entries
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("AccountEntry", id))
        }

        async fn list_entries(
            &self,
            query: EntryQuery,
            page: PageRequest,
            _metadata: Option<OperationMetadata>,
        ) -> Result<Page<AccountEntry>, PortError> {
            let tables = self.tables.read().await;
            let mut results: Vec<AccountEntry> = tables
                .entries
                .values()
                .filter(|e| query.include_deleted || !e.is_deleted())
                .filter(|e| query.account_id.map_or(true, |id| e.account_id == id))
                .filter(|e| query.kind.map_or(true, |kind| kind.matches(&e.kind)))
                .filter(|e| query.invoice_id.map_or(true, |id| e.kind.invoice_id() == Some(id)))
                .filter(|e| query.date_from.map_or(true, |d| e.entry_date >= d))
                .filter(|e| query.date_to.map_or(true, |d| e.entry_date <= d))
                .cloned()
                .collect();

            results.sort_by(|a, b| {
                b.entry_date
                    .cmp(&a.entry_date)
                    .then_with(|| b.id.cmp(&a.id))
            });

            Ok(Page::paginate(results, page))
        }

        async fn commit(
            &self,
            batch: TreasuryCommit,
            metadata: Option<OperationMetadata>,
        ) -> Result<TreasuryCommit, PortError> {
            let mut tables = self.tables.write().await;

            tables.accounts.check_batch(&batch.accounts)?;
            tables.entries.check_batch(&batch.entries)?;

            debug!(
                accounts = batch.accounts.len(),
                entries = batch.entries.len(),
                correlation_id = ?metadata.and_then(|m| m.correlation_id),
                "committing treasury batch"
            );

            Ok(TreasuryCommit {
                accounts: tables.accounts.write_batch(batch.accounts),
                entries: tables.entries.write_batch(batch.entries),
            })
        }
    }
}

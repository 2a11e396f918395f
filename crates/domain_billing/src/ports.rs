//! Billing Domain Ports
//!
//! The `BillingPort` trait is everything the billing services need from a
//! backing store. Reads return detached copies; every write goes through
//! [`BillingPort::commit`], which applies a batch of invoices, payments and
//! clients all-or-nothing and rejects rows whose version has moved on.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_billing::ports::{BillingPort, memory::InMemoryBillingPort};
//! use std::sync::Arc;
//!
//! let port: Arc<dyn BillingPort> = Arc::new(InMemoryBillingPort::new());
//! let payments = PaymentService::new(port.clone());
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;

use core_kernel::{
    AccountId, CarId, ClientId, DomainPort, InvoiceId, OperationMetadata, Page, PageRequest,
    PaymentId, PortError, SoftDelete,
};

use crate::client::Client;
use crate::invoice::{Invoice, InvoiceStatus};
use crate::payment::Payment;

/// Query parameters for listing invoices
#[derive(Debug, Clone, Default)]
pub struct InvoiceQuery {
    pub client_id: Option<ClientId>,
    pub car_id: Option<CarId>,
    pub account_id: Option<AccountId>,
    /// Filter by derived status
    pub status: Option<InvoiceStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub include_deleted: bool,
}

impl InvoiceQuery {
    pub fn for_client(client_id: ClientId) -> Self {
        Self {
            client_id: Some(client_id),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: InvoiceStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

/// Query parameters for listing payments
#[derive(Debug, Clone, Default)]
pub struct PaymentQuery {
    pub invoice_id: Option<InvoiceId>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub include_deleted: bool,
}

impl PaymentQuery {
    pub fn for_invoice(invoice_id: InvoiceId) -> Self {
        Self {
            invoice_id: Some(invoice_id),
            ..Default::default()
        }
    }
}

/// Query parameters for listing clients
#[derive(Debug, Clone, Default)]
pub struct ClientQuery {
    /// Case-insensitive substring of the name
    pub name_contains: Option<String>,
    pub include_deleted: bool,
}

/// Rows to write in one transaction
#[derive(Debug, Clone, Default)]
pub struct BillingCommit {
    pub invoices: Vec<Invoice>,
    pub payments: Vec<Payment>,
    pub clients: Vec<Client>,
}

impl BillingCommit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invoice(mut self, invoice: Invoice) -> Self {
        self.invoices.push(invoice);
        self
    }

    pub fn payment(mut self, payment: Payment) -> Self {
        self.payments.push(payment);
        self
    }

    pub fn client(mut self, client: Client) -> Self {
        self.clients.push(client);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.invoices.is_empty() && self.payments.is_empty() && self.clients.is_empty()
    }
}

/// Port for billing persistence
#[async_trait]
pub trait BillingPort: DomainPort {
    /// Gets an invoice by id, including soft-deleted ones
    async fn get_invoice(
        &self,
        id: InvoiceId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Invoice, PortError>;

    /// Lists invoices, newest first
    async fn list_invoices(
        &self,
        query: InvoiceQuery,
        page: PageRequest,
        metadata: Option<OperationMetadata>,
    ) -> Result<Page<Invoice>, PortError>;

    /// Gets a payment by id, including soft-deleted ones
    async fn get_payment(
        &self,
        id: PaymentId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Payment, PortError>;

    /// Lists payments, newest first
    async fn list_payments(
        &self,
        query: PaymentQuery,
        page: PageRequest,
        metadata: Option<OperationMetadata>,
    ) -> Result<Page<Payment>, PortError>;

    /// Gets a client by id, including soft-deleted ones
    async fn get_client(
        &self,
        id: ClientId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Client, PortError>;

    /// Lists clients by name
    async fn list_clients(
        &self,
        query: ClientQuery,
        page: PageRequest,
        metadata: Option<OperationMetadata>,
    ) -> Result<Page<Client>, PortError>;

    /// Writes a batch atomically, returning the rows with their new versions
    ///
    /// Fails with `PortError::Conflict` and writes nothing if any row was
    /// changed since it was read.
    async fn commit(
        &self,
        batch: BillingCommit,
        metadata: Option<OperationMetadata>,
    ) -> Result<BillingCommit, PortError>;
}

/// Convenience operations built on top of BillingPort
#[async_trait]
pub trait BillingPortExt: BillingPort {
    /// Every live payment on an invoice
    async fn payments_for_invoice(
        &self,
        invoice_id: InvoiceId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Vec<Payment>, PortError> {
        let page = self
            .list_payments(PaymentQuery::for_invoice(invoice_id), PageRequest::all(), metadata)
            .await?;
        Ok(page.items)
    }

    /// Every invoice billed to a client, soft-deleted ones included
    async fn invoice_history(
        &self,
        client_id: ClientId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Vec<Invoice>, PortError> {
        let page = self
            .list_invoices(
                InvoiceQuery::for_client(client_id).including_deleted(),
                PageRequest::all(),
                metadata,
            )
            .await?;
        Ok(page.items)
    }

    /// Gets an invoice, treating a soft-deleted one as missing
    async fn get_live_invoice(
        &self,
        id: InvoiceId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Invoice, PortError> {
        let invoice = self.get_invoice(id, metadata).await?;
        if invoice.is_deleted() {
            return Err(PortError::not_found("Invoice", id));
        }
        Ok(invoice)
    }

    /// Gets a client, treating a soft-deleted one as missing
    async fn get_live_client(
        &self,
        id: ClientId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Client, PortError> {
        let client = self.get_client(id, metadata).await?;
        if client.is_deleted() {
            return Err(PortError::not_found("Client", id));
        }
        Ok(client)
    }
}

impl<T: BillingPort + ?Sized> BillingPortExt for T {}

/// Takes the single row of one kind out of a committed batch
pub(crate) fn single<T>(rows: Vec<T>, entity: &str) -> Result<T, PortError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| PortError::internal(format!("commit returned no {entity}")))
}

/// In-memory implementation of BillingPort
///
/// Holds every table behind one lock so a commit checks all rows before
/// writing any of them.
#[cfg(any(test, feature = "memory"))]
pub mod memory {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use tracing::debug;

    use core_kernel::VersionedTable;

    use crate::invoice::InvoiceLedger;

    #[derive(Debug, Default)]
    struct BillingTables {
        invoices: VersionedTable<Invoice>,
        payments: VersionedTable<Payment>,
        clients: VersionedTable<Client>,
    }

    impl BillingTables {
        fn live_payments_for(&self, invoice_id: InvoiceId) -> Vec<Payment> {
            self.payments
                .values()
                .filter(|p| p.invoice_id == invoice_id && !p.is_deleted())
                .cloned()
                .collect()
        }
    }

    /// In-memory billing store
    #[derive(Debug, Default, Clone)]
    pub struct InMemoryBillingPort {
        tables: Arc<RwLock<BillingTables>>,
    }

    impl InMemoryBillingPort {
        pub fn new() -> Self {
            Self::default()
        }

        /// Loads rows as they are, bypassing version checks and entity rules
        ///
        /// Untrusted rows belong behind a validating loader such as the
        /// CLI snapshot loader.
        pub async fn seed(&self, clients: Vec<Client>, invoices: Vec<Invoice>, payments: Vec<Payment>) {
            let mut tables = self.tables.write().await;
            for client in clients {
                tables.clients.seed(client);
            }
            for invoice in invoices {
                tables.invoices.seed(invoice);
            }
            for payment in payments {
                tables.payments.seed(payment);
            }
        }

        /// Copies every stored row, soft-deleted ones included
        pub async fn dump(&self) -> (Vec<Client>, Vec<Invoice>, Vec<Payment>) {
            let tables = self.tables.read().await;
            (
                tables.clients.values().cloned().collect(),
                tables.invoices.values().cloned().collect(),
                tables.payments.values().cloned().collect(),
            )
        }
    }

    impl DomainPort for InMemoryBillingPort {}

    #[async_trait]
    impl BillingPort for InMemoryBillingPort {
        async fn get_invoice(
            &self,
            id: InvoiceId,
            _metadata: Option<OperationMetadata>,
        ) -> Result<Invoice, PortError> {
            self.tables
                .read()
                .await
                .invoices
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Invoice", id))
        }

        async fn list_invoices(
            &self,
            query: InvoiceQuery,
            page: PageRequest,
            _metadata: Option<OperationMetadata>,
        ) -> Result<Page<Invoice>, PortError> {
            let tables = self.tables.read().await;
            let mut results: Vec<Invoice> = tables
                .invoices
                .values()
                .filter(|i| query.include_deleted || !i.is_deleted())
                .filter(|i| query.client_id.map_or(true, |id| i.client_id == id))
                .filter(|i| query.car_id.map_or(true, |id| i.car_id == id))
                .filter(|i| query.account_id.map_or(true, |id| i.account_id == Some(id)))
                .filter(|i| query.date_from.map_or(true, |d| i.invoice_date >= d))
                .filter(|i| query.date_to.map_or(true, |d| i.invoice_date <= d))
                .filter(|i| {
                    query.status.map_or(true, |status| {
                        InvoiceLedger::status(i, &tables.live_payments_for(i.id)) == status
                    })
                })
                .cloned()
                .collect();

            results.sort_by(|a, b| {
                b.invoice_date
                    .cmp(&a.invoice_date)
                    .then_with(|| b.id.cmp(&a.id))
            });

            Ok(Page::paginate(results, page))
        }

        async fn get_payment(
            &self,
            id: PaymentId,
            _metadata: Option<OperationMetadata>,
        ) -> Result<Payment, PortError> {
            self.tables
                .read()
                .await
                .payments
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Payment", id))
        }

        async fn list_payments(
            &self,
            query: PaymentQuery,
            page: PageRequest,
            _metadata: Option<OperationMetadata>,
        ) -> Result<Page<Payment>, PortError> {
            let tables = self.tables.read().await;
            let mut results: Vec<Payment> = tables
                .payments
                .values()
                .filter(|p| query.include_deleted || !p.is_deleted())
                .filter(|p| query.invoice_id.map_or(true, |id| p.invoice_id == id))
                .filter(|p| query.date_from.map_or(true, |d| p.payment_date >= d))
                .filter(|p| query.date_to.map_or(true, |d| p.payment_date <= d))
                .cloned()
                .collect();

            results.sort_by(|a, b| {
                b.payment_date
                    .cmp(&a.payment_date)
                    .then_with(|| b.id.cmp(&a.id))
            });

            Ok(Page::paginate(results, page))
        }

        async fn get_client(
            &self,
            id: ClientId,
            _metadata: Option<OperationMetadata>,
        ) -> Result<Client, PortError> {
            self.tables
                .read()
                .await
                .clients
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Client", id))
        }

        async fn list_clients(
            &self,
            query: ClientQuery,
            page: PageRequest,
            _metadata: Option<OperationMetadata>,
        ) -> Result<Page<Client>, PortError> {
            let tables = self.tables.read().await;
            let needle = query.name_contains.map(|n| n.to_lowercase());
            let mut results: Vec<Client> = tables
                .clients
                .values()
                .filter(|c| query.include_deleted || !c.is_deleted())
                .filter(|c| {
                    needle
                        .as_ref()
                        .map_or(true, |n| c.name.to_lowercase().contains(n.as_str()))
                })
                .cloned()
                .collect();

            results.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

            Ok(Page::paginate(results, page))
        }

        async fn commit(
            &self,
            batch: BillingCommit,
            metadata: Option<OperationMetadata>,
        ) -> Result<BillingCommit, PortError> {
            let mut tables = self.tables.write().await;

            tables.invoices.check_batch(&batch.invoices)?;
            tables.payments.check_batch(&batch.payments)?;
            tables.clients.check_batch(&batch.clients)?;

            debug!(
                invoices = batch.invoices.len(),
                payments = batch.payments.len(),
                clients = batch.clients.len(),
                correlation_id = ?metadata.and_then(|m| m.correlation_id),
                "committing billing batch"
            );

            Ok(BillingCommit {
                invoices: tables.invoices.write_batch(batch.invoices),
                payments: tables.payments.write_batch(batch.payments),
                clients: tables.clients.write_batch(batch.clients),
            })
        }
    }
}

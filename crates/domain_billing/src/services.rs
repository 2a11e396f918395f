//! Billing domain services
//!
//! Each service method is one user action expressed as validate-then-commit:
//! read the current rows, run every check, derive the new state with the
//! ledgers, then hand the whole change to the port as a single commit. A
//! rejected action writes nothing.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use core_kernel::{
    detect_drift, require, AccountId, CarId, ClientId, Drift, InvoiceId, Money,
    OperationMetadata, Page, PageRequest, PaymentId, PortError, SoftDelete, ValidationError,
    ValidationKind,
};

use crate::client::{Client, ClientLedger};
use crate::error::BillingError;
use crate::invoice::{Invoice, InvoiceLedger, InvoiceSummary};
use crate::payment::{Payment, PaymentRegister};
use crate::ports::{
    single, BillingCommit, BillingPort, BillingPortExt, ClientQuery, InvoiceQuery, PaymentQuery,
};

/// Form input for a new payment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPayment {
    pub invoice_id: Option<InvoiceId>,
    pub amount: Money,
    pub payment_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Form input for editing a payment; `None` keeps the stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentEdit {
    pub amount: Money,
    pub payment_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// State after a payment mutation, for re-display
#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub summary: InvoiceSummary,
    pub client_balance: Money,
}

/// Records, edits and removes payments
pub struct PaymentService {
    port: Arc<dyn BillingPort>,
}

impl PaymentService {
    pub fn new(port: Arc<dyn BillingPort>) -> Self {
        Self { port }
    }

    /// Records a payment against an invoice
    ///
    /// # Errors
    ///
    /// - `RequiredFieldMissing` without an invoice or date
    /// - `AmountNotPositive` / `ExceedsRemainingBalance` from the register
    /// - Port `NotFound` if the invoice or its client is missing or deleted
    /// - Port `Conflict` if the invoice changed since it was read
    #[instrument(skip_all, fields(invoice_id = ?request.invoice_id, amount = %request.amount))]
    pub async fn record_payment(
        &self,
        request: NewPayment,
        metadata: Option<OperationMetadata>,
    ) -> Result<PaymentOutcome, BillingError> {
        let invoice_id = require(request.invoice_id, "invoice_id")?;
        let payment_date = require(request.payment_date, "payment_date")?;
        let payment = Payment::new(invoice_id, request.amount, payment_date)?
            .with_notes(request.notes);

        let mut invoice = self.port.get_live_invoice(invoice_id, metadata.clone()).await?;
        let mut payments = self.port.payments_for_invoice(invoice_id, metadata.clone()).await?;

        if let Err(err) = PaymentRegister::validate_new_payment(&invoice, &payments, payment.amount) {
            debug!(error = %err, "payment rejected");
            return Err(err.into());
        }

        let mut client = self.port.get_live_client(invoice.client_id, metadata.clone()).await?;
        ClientLedger::apply_payment(&mut client, payment.amount)?;
        PaymentRegister::apply(&mut payments, payment.clone());
        invoice.touch();

        let committed = self
            .port
            .commit(
                BillingCommit::new().invoice(invoice).payment(payment).client(client),
                metadata,
            )
            .await?;
        let outcome = Self::outcome(committed, &payments)?;

        info!(
            payment_id = %outcome.payment.id,
            remaining = %outcome.summary.remaining,
            status = ?outcome.summary.status,
            "payment recorded"
        );
        Ok(outcome)
    }

    /// Changes a payment, retracting its old amount and applying the new one
    /// in the same commit
    #[instrument(skip(self, edit, metadata), fields(amount = %edit.amount))]
    pub async fn edit_payment(
        &self,
        id: PaymentId,
        edit: PaymentEdit,
        metadata: Option<OperationMetadata>,
    ) -> Result<PaymentOutcome, BillingError> {
        let current = self.live_payment(id, metadata.clone()).await?;
        let mut invoice = self
            .port
            .get_live_invoice(current.invoice_id, metadata.clone())
            .await?;
        let mut payments = self
            .port
            .payments_for_invoice(current.invoice_id, metadata.clone())
            .await?;

        if let Err(err) =
            PaymentRegister::validate_updated_payment(&invoice, &payments, &current, edit.amount)
        {
            debug!(error = %err, "payment edit rejected");
            return Err(err.into());
        }

        let mut client = self.port.get_live_client(invoice.client_id, metadata.clone()).await?;
        ClientLedger::replace_payment(&mut client, current.amount, edit.amount)?;

        let mut updated = current.clone();
        updated.amount = edit.amount;
        if let Some(date) = edit.payment_date {
            updated.payment_date = date;
        }
        if edit.notes.is_some() {
            updated.notes = edit.notes;
        }
        updated.touch();
        PaymentRegister::replace(&mut payments, updated.clone());
        invoice.touch();

        let committed = self
            .port
            .commit(
                BillingCommit::new().invoice(invoice).payment(updated).client(client),
                metadata,
            )
            .await?;
        let outcome = Self::outcome(committed, &payments)?;

        info!(
            previous = %current.amount,
            status = ?outcome.summary.status,
            "payment edited"
        );
        Ok(outcome)
    }

    /// Soft-deletes a payment and gives its amount back to the invoice
    #[instrument(skip(self, metadata))]
    pub async fn delete_payment(
        &self,
        id: PaymentId,
        metadata: Option<OperationMetadata>,
    ) -> Result<PaymentOutcome, BillingError> {
        let mut payment = self.live_payment(id, metadata.clone()).await?;
        let mut invoice = self
            .port
            .get_live_invoice(payment.invoice_id, metadata.clone())
            .await?;
        let mut payments = self
            .port
            .payments_for_invoice(payment.invoice_id, metadata.clone())
            .await?;
        let mut client = self.port.get_client(invoice.client_id, metadata.clone()).await?;

        ClientLedger::retract_payment(&mut client, payment.amount)?;
        PaymentRegister::retract(&mut payments, payment.id);
        payment.mark_deleted(Utc::now());
        payment.touch();
        invoice.touch();

        let committed = self
            .port
            .commit(
                BillingCommit::new().invoice(invoice).payment(payment).client(client),
                metadata,
            )
            .await?;
        let outcome = Self::outcome(committed, &payments)?;

        info!(status = ?outcome.summary.status, "payment deleted");
        Ok(outcome)
    }

    /// Brings back a soft-deleted payment if the invoice still has room for it
    #[instrument(skip(self, metadata))]
    pub async fn restore_payment(
        &self,
        id: PaymentId,
        metadata: Option<OperationMetadata>,
    ) -> Result<PaymentOutcome, BillingError> {
        let mut payment = self.port.get_payment(id, metadata.clone()).await?;
        if !payment.is_deleted() {
            return Err(BillingError::invalid_operation(format!(
                "Payment {id} is not deleted"
            )));
        }

        let mut invoice = self
            .port
            .get_live_invoice(payment.invoice_id, metadata.clone())
            .await?;
        let mut payments = self
            .port
            .payments_for_invoice(payment.invoice_id, metadata.clone())
            .await?;

        if let Err(err) = PaymentRegister::validate_new_payment(&invoice, &payments, payment.amount) {
            debug!(error = %err, "payment restore rejected");
            return Err(err.into());
        }

        let mut client = self.port.get_live_client(invoice.client_id, metadata.clone()).await?;
        ClientLedger::apply_payment(&mut client, payment.amount)?;
        payment.restore();
        payment.touch();
        PaymentRegister::apply(&mut payments, payment.clone());
        invoice.touch();

        let committed = self
            .port
            .commit(
                BillingCommit::new().invoice(invoice).payment(payment).client(client),
                metadata,
            )
            .await?;
        let outcome = Self::outcome(committed, &payments)?;

        info!(status = ?outcome.summary.status, "payment restored");
        Ok(outcome)
    }

    /// Paid, remaining and status of one invoice
    pub async fn invoice_summary(
        &self,
        invoice_id: InvoiceId,
        metadata: Option<OperationMetadata>,
    ) -> Result<InvoiceSummary, BillingError> {
        let invoice = self.port.get_invoice(invoice_id, metadata.clone()).await?;
        let payments = self.port.payments_for_invoice(invoice_id, metadata).await?;
        Ok(InvoiceLedger::summarize(&invoice, &payments))
    }

    pub async fn list_payments(
        &self,
        query: PaymentQuery,
        page: PageRequest,
        metadata: Option<OperationMetadata>,
    ) -> Result<Page<Payment>, BillingError> {
        Ok(self.port.list_payments(query, page, metadata).await?)
    }

    async fn live_payment(
        &self,
        id: PaymentId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Payment, BillingError> {
        let payment = self.port.get_payment(id, metadata).await?;
        if payment.is_deleted() {
            return Err(PortError::not_found("Payment", id).into());
        }
        Ok(payment)
    }

    fn outcome(committed: BillingCommit, payments: &[Payment]) -> Result<PaymentOutcome, BillingError> {
        let invoice = single(committed.invoices, "invoice")?;
        let payment = single(committed.payments, "payment")?;
        let client = single(committed.clients, "client")?;

        Ok(PaymentOutcome {
            summary: InvoiceLedger::summarize(&invoice, payments),
            payment,
            client_balance: client.balance,
        })
    }
}

/// Form input for a new invoice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewInvoice {
    pub client_id: Option<ClientId>,
    pub car_id: Option<CarId>,
    pub amount: Money,
    pub invoice_date: Option<NaiveDate>,
    pub account_id: Option<AccountId>,
    #[serde(default)]
    pub account_cut: Money,
    pub notes: Option<String>,
}

/// Form input for editing an invoice
///
/// Amount and account cut are always replaced; `None` for the date or notes
/// keeps the stored value. Clearing `account_id` is only valid with a zero cut.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceEdit {
    pub amount: Money,
    pub account_id: Option<AccountId>,
    #[serde(default)]
    pub account_cut: Money,
    pub invoice_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// An invoice before and after an edit
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceChange {
    pub previous: Invoice,
    pub current: Invoice,
    pub client_balance: Money,
}

/// An invoice with its derived payment state, as listed to the user
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceView {
    pub invoice: Invoice,
    pub summary: InvoiceSummary,
}

/// An invoice whose live payments exceed its amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Overpayment {
    pub invoice_id: InvoiceId,
    pub client_id: ClientId,
    pub amount: Money,
    pub paid: Money,
    pub excess: Money,
}

/// Manages invoices and clients
pub struct InvoiceService {
    port: Arc<dyn BillingPort>,
}

impl InvoiceService {
    pub fn new(port: Arc<dyn BillingPort>) -> Self {
        Self { port }
    }

    /// Creates a client with a zero balance
    #[instrument(skip(self, metadata))]
    pub async fn create_client(
        &self,
        name: String,
        phone: Option<String>,
        metadata: Option<OperationMetadata>,
    ) -> Result<Client, BillingError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::required("name").into());
        }

        let client = Client::new(name).with_phone(phone);
        let committed = self
            .port
            .commit(BillingCommit::new().client(client), metadata)
            .await?;
        let client = single(committed.clients, "client")?;

        info!(client_id = %client.id, "client created");
        Ok(client)
    }

    /// Cached balance of a client
    pub async fn client_balance(
        &self,
        client_id: ClientId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Money, BillingError> {
        Ok(self.port.get_client(client_id, metadata).await?.balance)
    }

    pub async fn list_clients(
        &self,
        query: ClientQuery,
        page: PageRequest,
        metadata: Option<OperationMetadata>,
    ) -> Result<Page<Client>, BillingError> {
        Ok(self.port.list_clients(query, page, metadata).await?)
    }

    /// Bills a client; the client's balance drops by the invoice amount
    #[instrument(skip_all, fields(client_id = ?request.client_id, amount = %request.amount))]
    pub async fn create_invoice(
        &self,
        request: NewInvoice,
        metadata: Option<OperationMetadata>,
    ) -> Result<Invoice, BillingError> {
        let client_id = require(request.client_id, "client_id")?;
        let car_id = require(request.car_id, "car_id")?;
        let invoice_date = require(request.invoice_date, "invoice_date")?;

        let invoice = Invoice::new(client_id, car_id, request.amount, invoice_date)?
            .with_account_cut(request.account_id, request.account_cut)?
            .with_notes(request.notes);

        let mut client = self.port.get_live_client(client_id, metadata.clone()).await?;
        ClientLedger::apply_invoice(&mut client, invoice.amount)?;

        let committed = self
            .port
            .commit(BillingCommit::new().invoice(invoice).client(client), metadata)
            .await?;
        let invoice = single(committed.invoices, "invoice")?;

        info!(invoice_id = %invoice.id, "invoice created");
        Ok(invoice)
    }

    /// Changes an invoice's terms
    ///
    /// # Errors
    ///
    /// `AmountBelowPaid` when the new amount is less than what the live
    /// payments already cover.
    #[instrument(skip(self, edit, metadata), fields(amount = %edit.amount))]
    pub async fn edit_invoice(
        &self,
        id: InvoiceId,
        edit: InvoiceEdit,
        metadata: Option<OperationMetadata>,
    ) -> Result<InvoiceChange, BillingError> {
        let current = self.port.get_live_invoice(id, metadata.clone()).await?;
        let payments = self.port.payments_for_invoice(id, metadata.clone()).await?;

        let paid = InvoiceLedger::paid_towards(&current, &payments);
        if edit.amount < paid {
            debug!(%paid, "invoice edit rejected");
            return Err(ValidationError::new(
                ValidationKind::AmountBelowPaid,
                format!("invoice amount {} is below the {} already paid", edit.amount, paid),
            )
            .into());
        }

        let mut updated = current.clone();
        updated.amount = edit.amount;
        updated.account_id = edit.account_id;
        updated.account_cut = edit.account_cut;
        if let Some(date) = edit.invoice_date {
            updated.invoice_date = date;
        }
        if edit.notes.is_some() {
            updated.notes = edit.notes;
        }
        updated.validate_terms()?;
        updated.touch();

        let mut client = self.port.get_live_client(current.client_id, metadata.clone()).await?;
        ClientLedger::replace_invoice(&mut client, current.amount, updated.amount)?;

        let committed = self
            .port
            .commit(BillingCommit::new().invoice(updated).client(client), metadata)
            .await?;
        let invoice = single(committed.invoices, "invoice")?;
        let client = single(committed.clients, "client")?;

        info!(previous = %current.amount, "invoice edited");
        Ok(InvoiceChange {
            previous: current,
            current: invoice,
            client_balance: client.balance,
        })
    }

    /// Soft-deletes an invoice and reverses its charge on the client
    ///
    /// Refused with `HasDependents` while the invoice has live payments;
    /// those must be deleted first.
    #[instrument(skip(self, metadata))]
    pub async fn delete_invoice(
        &self,
        id: InvoiceId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Invoice, BillingError> {
        let mut invoice = self.port.get_live_invoice(id, metadata.clone()).await?;
        let payments = self.port.payments_for_invoice(id, metadata.clone()).await?;
        if !payments.is_empty() {
            return Err(BillingError::HasDependents {
                entity: "Invoice",
                id: id.to_string(),
                count: payments.len(),
                dependents: "payments",
            });
        }

        let mut client = self.port.get_client(invoice.client_id, metadata.clone()).await?;
        ClientLedger::retract_invoice(&mut client, invoice.amount)?;
        invoice.mark_deleted(Utc::now());
        invoice.touch();

        let committed = self
            .port
            .commit(BillingCommit::new().invoice(invoice).client(client), metadata)
            .await?;
        let invoice = single(committed.invoices, "invoice")?;

        info!("invoice deleted");
        Ok(invoice)
    }

    /// Restores a soft-deleted invoice and charges the client again
    #[instrument(skip(self, metadata))]
    pub async fn restore_invoice(
        &self,
        id: InvoiceId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Invoice, BillingError> {
        let mut invoice = self.port.get_invoice(id, metadata.clone()).await?;
        if !invoice.is_deleted() {
            return Err(BillingError::invalid_operation(format!(
                "Invoice {id} is not deleted"
            )));
        }

        let mut client = self.port.get_live_client(invoice.client_id, metadata.clone()).await?;
        ClientLedger::apply_invoice(&mut client, invoice.amount)?;
        invoice.restore();
        invoice.touch();

        let committed = self
            .port
            .commit(BillingCommit::new().invoice(invoice).client(client), metadata)
            .await?;
        let invoice = single(committed.invoices, "invoice")?;

        info!("invoice restored");
        Ok(invoice)
    }

    pub async fn get_invoice(
        &self,
        id: InvoiceId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Invoice, BillingError> {
        Ok(self.port.get_invoice(id, metadata).await?)
    }

    /// Lists invoices with their paid, remaining and status
    pub async fn list_invoices(
        &self,
        query: InvoiceQuery,
        page: PageRequest,
        metadata: Option<OperationMetadata>,
    ) -> Result<Page<InvoiceView>, BillingError> {
        let invoices = self.port.list_invoices(query, page, metadata.clone()).await?;

        let mut items = Vec::with_capacity(invoices.items.len());
        for invoice in invoices.items {
            let payments = self.port.payments_for_invoice(invoice.id, metadata.clone()).await?;
            let summary = InvoiceLedger::summarize(&invoice, &payments);
            items.push(InvoiceView { invoice, summary });
        }

        Ok(Page {
            items,
            total: invoices.total,
            page: invoices.page,
            per_page: invoices.per_page,
        })
    }

    /// Derives a client's balance from invoice and payment history
    pub async fn recompute_client_balance(
        &self,
        client_id: ClientId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Money, BillingError> {
        let invoices = self.port.invoice_history(client_id, metadata.clone()).await?;

        let mut payments = Vec::new();
        for invoice in invoices.iter().filter(|i| !i.is_deleted()) {
            payments.extend(self.port.payments_for_invoice(invoice.id, metadata.clone()).await?);
        }

        Ok(ClientLedger::recompute(client_id, &invoices, &payments)?)
    }

    /// Compares a client's cached balance with the one derived from history
    pub async fn client_drift(
        &self,
        client_id: ClientId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Option<Drift>, BillingError> {
        let client = self.port.get_client(client_id, metadata.clone()).await?;
        let recomputed = self.recompute_client_balance(client_id, metadata).await?;
        let drift = detect_drift(client.balance, recomputed)?;

        if let Some(drift) = &drift {
            warn!(%client_id, cached = %drift.cached, recomputed = %drift.recomputed, "client balance drift");
        }
        Ok(drift)
    }

    /// Overwrites a client's cached balance with the derived one
    #[instrument(skip(self, metadata))]
    pub async fn repair_client_balance(
        &self,
        client_id: ClientId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Client, BillingError> {
        let mut client = self.port.get_client(client_id, metadata.clone()).await?;
        let recomputed = self.recompute_client_balance(client_id, metadata.clone()).await?;
        if client.balance == recomputed {
            return Ok(client);
        }

        client.balance = recomputed;
        client.touch();
        let committed = self
            .port
            .commit(BillingCommit::new().client(client), metadata)
            .await?;
        let client = single(committed.clients, "client")?;

        info!(balance = %client.balance, "client balance repaired");
        Ok(client)
    }

    /// Finds live invoices whose live payments exceed the invoice amount
    pub async fn overpaid_invoices(
        &self,
        metadata: Option<OperationMetadata>,
    ) -> Result<Vec<Overpayment>, BillingError> {
        let invoices = self
            .port
            .list_invoices(InvoiceQuery::default(), PageRequest::all(), metadata.clone())
            .await?;

        let mut overpaid = Vec::new();
        for invoice in invoices.items {
            let payments = self.port.payments_for_invoice(invoice.id, metadata.clone()).await?;
            if InvoiceLedger::is_overpaid(&invoice, &payments) {
                let paid = InvoiceLedger::paid_towards(&invoice, &payments);
                overpaid.push(Overpayment {
                    invoice_id: invoice.id,
                    client_id: invoice.client_id,
                    amount: invoice.amount,
                    paid,
                    excess: paid.saturating_sub(invoice.amount),
                });
            }
        }
        Ok(overpaid)
    }
}

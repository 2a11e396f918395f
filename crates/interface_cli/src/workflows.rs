//! Cross-domain workflows
//!
//! An invoice lives in billing while its account cut lives in treasury.
//! [`DealershipLedger`] commits the billing side first and then posts the
//! cut; when the treasury step fails the billing change is undone and the
//! treasury error is returned.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use core_kernel::{CarId, InvoiceId, OperationMetadata, PageRequest};
use domain_billing::{
    BillingError, BillingPort, Invoice, InvoiceChange, InvoiceEdit, InvoiceQuery, InvoiceService,
    NewInvoice, PaymentService,
};
use domain_inventory::{Car, InventoryError, InventoryPort, InventoryPortExt, InventoryService};
use domain_treasury::{CutTarget, TreasuryPort, TreasuryService};

use crate::error::LedgerError;

/// Where an invoice's cut belongs, if anywhere
pub fn cut_target(invoice: &Invoice) -> Option<CutTarget> {
    if invoice.deleted_at.is_some() {
        return None;
    }
    invoice.cut().map(|(account_id, amount)| CutTarget {
        account_id,
        amount,
        entry_date: invoice.invoice_date,
    })
}

/// Every ledger service wired over one set of ports
pub struct DealershipLedger {
    pub invoices: InvoiceService,
    pub payments: PaymentService,
    pub treasury: TreasuryService,
    pub inventory: InventoryService,
    billing_port: Arc<dyn BillingPort>,
    inventory_port: Arc<dyn InventoryPort>,
}

impl DealershipLedger {
    pub fn new(
        billing: Arc<dyn BillingPort>,
        treasury: Arc<dyn TreasuryPort>,
        inventory: Arc<dyn InventoryPort>,
    ) -> Self {
        Self {
            invoices: InvoiceService::new(billing.clone()),
            payments: PaymentService::new(billing.clone()),
            treasury: TreasuryService::new(treasury),
            inventory: InventoryService::new(inventory.clone()),
            billing_port: billing,
            inventory_port: inventory,
        }
    }

    /// Bills a client for a car and posts the invoice's account cut
    #[instrument(skip_all, fields(car_id = ?request.car_id, amount = %request.amount))]
    pub async fn create_invoice(
        &self,
        request: NewInvoice,
        metadata: Option<OperationMetadata>,
    ) -> Result<Invoice, LedgerError> {
        if let Some(car_id) = request.car_id {
            self.inventory_port
                .get_live_car(car_id, metadata.clone())
                .await
                .map_err(InventoryError::from)?;
        }

        let invoice = self.invoices.create_invoice(request, metadata.clone()).await?;

        if let Err(err) = self
            .treasury
            .sync_invoice_cut(invoice.id, cut_target(&invoice), metadata.clone())
            .await
        {
            warn!(invoice_id = %invoice.id, error = %err, "posting account cut failed, removing invoice");
            if let Err(undo) = self.invoices.delete_invoice(invoice.id, metadata).await {
                error!(invoice_id = %invoice.id, error = %undo, "invoice rollback failed");
            }
            return Err(err.into());
        }

        info!(invoice_id = %invoice.id, "invoice created with account cut");
        Ok(invoice)
    }

    /// Edits an invoice and moves or resizes its account cut to match
    #[instrument(skip(self, edit, metadata))]
    pub async fn edit_invoice(
        &self,
        id: InvoiceId,
        edit: InvoiceEdit,
        metadata: Option<OperationMetadata>,
    ) -> Result<InvoiceChange, LedgerError> {
        let change = self.invoices.edit_invoice(id, edit, metadata.clone()).await?;

        if let Err(err) = self
            .treasury
            .sync_invoice_cut(id, cut_target(&change.current), metadata.clone())
            .await
        {
            warn!(invoice_id = %id, error = %err, "moving account cut failed, reverting invoice");
            let previous = InvoiceEdit {
                amount: change.previous.amount,
                account_id: change.previous.account_id,
                account_cut: change.previous.account_cut,
                invoice_date: Some(change.previous.invoice_date),
                notes: change.previous.notes.clone(),
            };
            if let Err(undo) = self.invoices.edit_invoice(id, previous, metadata).await {
                error!(invoice_id = %id, error = %undo, "invoice revert failed");
            }
            return Err(err.into());
        }

        Ok(change)
    }

    /// Deletes an invoice and retracts its account cut
    ///
    /// Refused while the invoice has live payments.
    #[instrument(skip(self, metadata))]
    pub async fn delete_invoice(
        &self,
        id: InvoiceId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Invoice, LedgerError> {
        let invoice = self.invoices.delete_invoice(id, metadata.clone()).await?;

        if let Err(err) = self.treasury.retract_invoice_cut(id, metadata.clone()).await {
            warn!(invoice_id = %id, error = %err, "retracting account cut failed, restoring invoice");
            if let Err(undo) = self.invoices.restore_invoice(id, metadata).await {
                error!(invoice_id = %id, error = %undo, "invoice restore failed");
            }
            return Err(err.into());
        }

        Ok(invoice)
    }

    /// Restores a deleted invoice and posts its account cut again
    #[instrument(skip(self, metadata))]
    pub async fn restore_invoice(
        &self,
        id: InvoiceId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Invoice, LedgerError> {
        let invoice = self.invoices.restore_invoice(id, metadata.clone()).await?;

        if let Err(err) = self
            .treasury
            .sync_invoice_cut(id, cut_target(&invoice), metadata.clone())
            .await
        {
            warn!(invoice_id = %id, error = %err, "reposting account cut failed, deleting invoice again");
            if let Err(undo) = self.invoices.delete_invoice(id, metadata).await {
                error!(invoice_id = %id, error = %undo, "invoice delete failed");
            }
            return Err(err.into());
        }

        Ok(invoice)
    }

    /// Deletes a car; refused while live invoices or expenses reference it
    #[instrument(skip(self, metadata))]
    pub async fn delete_car(
        &self,
        id: CarId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Car, LedgerError> {
        let query = InvoiceQuery {
            car_id: Some(id),
            ..Default::default()
        };
        let invoices = self
            .billing_port
            .list_invoices(query, PageRequest::default(), metadata.clone())
            .await
            .map_err(BillingError::from)?;
        if invoices.total > 0 {
            return Err(LedgerError::HasDependents {
                entity: "Car",
                id: id.to_string(),
                count: invoices.total,
                dependents: "invoices",
            });
        }

        Ok(self.inventory.delete_car(id, metadata).await?)
    }
}

//! Reconciliation audit
//!
//! Every cached balance in the ledger is checked against the value folded
//! from its history: client balances, account balances and car expense
//! totals. Invoice cuts are checked against the entries posted for them and
//! overpaid invoices are flagged. With `repair` set, caches and cuts are
//! rewritten from history; overpayments are only reported. A repair that
//! fails is logged and reported as unrepaired, and the audit moves on.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use core_kernel::{AccountId, Drift, InvoiceId, Money, OperationMetadata, PageRequest};
use domain_billing::{ClientQuery, InvoiceQuery, Overpayment};
use domain_inventory::CarQuery;
use domain_treasury::{AccountQuery, EntryQuery};

use crate::error::LedgerError;
use crate::workflows::{cut_target, DealershipLedger};

/// A cached balance that disagrees with its history
#[derive(Debug, Clone, Serialize)]
pub struct BalanceDrift {
    pub entity: &'static str,
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub drift: Drift,
    pub repaired: bool,
}

/// An invoice whose posted cut differs from its terms
#[derive(Debug, Clone, Serialize)]
pub struct CutMismatch {
    pub invoice_id: InvoiceId,
    pub expected_account: Option<AccountId>,
    pub expected: Money,
    pub posted: Money,
    pub posted_entries: usize,
    pub repaired: bool,
}

/// Result of one audit run
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub generated_at: DateTime<Utc>,
    pub clients_checked: usize,
    pub accounts_checked: usize,
    pub cars_checked: usize,
    pub invoices_checked: usize,
    pub drifts: Vec<BalanceDrift>,
    pub cut_mismatches: Vec<CutMismatch>,
    pub overpaid_invoices: Vec<Overpayment>,
}

impl ReconciliationReport {
    fn new() -> Self {
        Self {
            generated_at: Utc::now(),
            clients_checked: 0,
            accounts_checked: 0,
            cars_checked: 0,
            invoices_checked: 0,
            drifts: Vec::new(),
            cut_mismatches: Vec::new(),
            overpaid_invoices: Vec::new(),
        }
    }

    /// Nothing was found at all
    pub fn is_clean(&self) -> bool {
        self.drifts.is_empty() && self.cut_mismatches.is_empty() && self.overpaid_invoices.is_empty()
    }

    /// Something was rewritten during this run
    pub fn repaired_any(&self) -> bool {
        self.drifts.iter().any(|d| d.repaired) || self.cut_mismatches.iter().any(|m| m.repaired)
    }

    /// Problems still present after the run
    pub fn needs_attention(&self) -> bool {
        !self.overpaid_invoices.is_empty()
            || self.drifts.iter().any(|d| !d.repaired)
            || self.cut_mismatches.iter().any(|m| !m.repaired)
    }
}

impl DealershipLedger {
    /// Audits every client, account, car and invoice
    #[instrument(skip(self, metadata))]
    pub async fn reconcile(
        &self,
        repair: bool,
        metadata: Option<OperationMetadata>,
    ) -> Result<ReconciliationReport, LedgerError> {
        let mut report = ReconciliationReport::new();

        self.audit_cuts(&mut report, repair, &metadata).await?;
        self.audit_clients(&mut report, repair, &metadata).await?;
        self.audit_accounts(&mut report, repair, &metadata).await?;
        self.audit_cars(&mut report, repair, &metadata).await?;

        report.overpaid_invoices = self.invoices.overpaid_invoices(metadata).await?;
        for overpaid in &report.overpaid_invoices {
            warn!(invoice_id = %overpaid.invoice_id, excess = %overpaid.excess, "invoice overpaid");
        }

        info!(
            drifts = report.drifts.len(),
            cut_mismatches = report.cut_mismatches.len(),
            overpaid = report.overpaid_invoices.len(),
            "reconciliation finished"
        );
        Ok(report)
    }

    async fn audit_cuts(
        &self,
        report: &mut ReconciliationReport,
        repair: bool,
        metadata: &Option<OperationMetadata>,
    ) -> Result<(), LedgerError> {
        let invoices = self
            .invoices
            .list_invoices(InvoiceQuery::default().including_deleted(), PageRequest::all(), metadata.clone())
            .await?;
        report.invoices_checked = invoices.items.len();

        for view in invoices.items {
            let invoice = view.invoice;
            let target = cut_target(&invoice);
            let posted = self
                .treasury
                .list_entries(EntryQuery::for_invoice(invoice.id), PageRequest::all(), metadata.clone())
                .await?
                .items;

            let in_sync = match target {
                Some(target) => {
                    posted.len() == 1
                        && posted[0].account_id == target.account_id
                        && posted[0].amount == target.amount
                        && posted[0].entry_date == target.entry_date
                }
                None => posted.is_empty(),
            };
            if in_sync {
                continue;
            }

            warn!(invoice_id = %invoice.id, posted = posted.len(), "invoice cut out of sync");
            let repaired = repair
                && match self.treasury.sync_invoice_cut(invoice.id, target, metadata.clone()).await {
                    Ok(_) => true,
                    Err(err) => {
                        warn!(invoice_id = %invoice.id, error = %err, "invoice cut left unrepaired");
                        false
                    }
                };
            report.cut_mismatches.push(CutMismatch {
                invoice_id: invoice.id,
                expected_account: target.map(|t| t.account_id),
                expected: target.map(|t| t.amount).unwrap_or_default(),
                posted: posted.iter().map(|e| e.amount).sum(),
                posted_entries: posted.len(),
                repaired,
            });
        }
        Ok(())
    }

    async fn audit_clients(
        &self,
        report: &mut ReconciliationReport,
        repair: bool,
        metadata: &Option<OperationMetadata>,
    ) -> Result<(), LedgerError> {
        let query = ClientQuery {
            include_deleted: true,
            ..Default::default()
        };
        let clients = self
            .invoices
            .list_clients(query, PageRequest::all(), metadata.clone())
            .await?;
        report.clients_checked = clients.items.len();

        for client in clients.items {
            if let Some(drift) = self.invoices.client_drift(client.id, metadata.clone()).await? {
                let repaired = repair
                    && match self.invoices.repair_client_balance(client.id, metadata.clone()).await {
                        Ok(_) => true,
                        Err(err) => {
                            warn!(client_id = %client.id, error = %err, "client balance left unrepaired");
                            false
                        }
                    };
                report.drifts.push(BalanceDrift {
                    entity: "Client",
                    id: client.id.to_string(),
                    name: client.name,
                    drift,
                    repaired,
                });
            }
        }
        Ok(())
    }

    async fn audit_accounts(
        &self,
        report: &mut ReconciliationReport,
        repair: bool,
        metadata: &Option<OperationMetadata>,
    ) -> Result<(), LedgerError> {
        let query = AccountQuery {
            include_deleted: true,
            ..Default::default()
        };
        let accounts = self
            .treasury
            .list_accounts(query, PageRequest::all(), metadata.clone())
            .await?;
        report.accounts_checked = accounts.items.len();

        for account in accounts.items {
            if let Some(drift) = self.treasury.account_drift(account.id, metadata.clone()).await? {
                let repaired = repair
                    && match self.treasury.repair_account_balance(account.id, metadata.clone()).await {
                        Ok(_) => true,
                        Err(err) => {
                            warn!(account_id = %account.id, error = %err, "account balance left unrepaired");
                            false
                        }
                    };
                report.drifts.push(BalanceDrift {
                    entity: "Account",
                    id: account.id.to_string(),
                    name: account.name,
                    drift,
                    repaired,
                });
            }
        }
        Ok(())
    }

    async fn audit_cars(
        &self,
        report: &mut ReconciliationReport,
        repair: bool,
        metadata: &Option<OperationMetadata>,
    ) -> Result<(), LedgerError> {
        let cars = self
            .inventory
            .list_cars(CarQuery::default().including_deleted(), PageRequest::all(), metadata.clone())
            .await?;
        report.cars_checked = cars.items.len();

        for car in cars.items {
            if let Some(drift) = self.inventory.car_drift(car.id, metadata.clone()).await? {
                let repaired = repair
                    && match self.inventory.repair_car_expenses(car.id, metadata.clone()).await {
                        Ok(_) => true,
                        Err(err) => {
                            warn!(car_id = %car.id, error = %err, "car expenses left unrepaired");
                            false
                        }
                    };
                report.drifts.push(BalanceDrift {
                    entity: "Car",
                    id: car.id.to_string(),
                    name: car.car_model_id.to_string(),
                    drift,
                    repaired,
                });
            }
        }
        Ok(())
    }
}

//! Dealership Ledger - Command Line Interface
//!
//! Wires the billing, treasury and inventory domains together:
//!
//! - **Workflows**: invoice actions that span billing and treasury
//! - **Reconciliation**: audit of every cached balance against its history
//! - **Snapshots**: JSON dumps of the ledger loaded into in-memory stores
//! - **Configuration**: `LEDGER_*` environment settings
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_cli::{audit_snapshot, config::LedgerConfig};
//!
//! let config = LedgerConfig::from_env()?;
//! let report = audit_snapshot(&config, None).await?;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```

pub mod config;
pub mod error;
pub mod reconcile;
pub mod snapshot;
pub mod workflows;

use tracing::info;

use core_kernel::OperationMetadata;

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::reconcile::ReconciliationReport;
use crate::snapshot::{MemoryStores, Snapshot};

pub use crate::workflows::DealershipLedger;

/// Loads the configured snapshot and audits it
///
/// With `config.repair` set, the repaired rows are written back to the
/// snapshot file.
pub async fn audit_snapshot(
    config: &LedgerConfig,
    metadata: Option<OperationMetadata>,
) -> Result<ReconciliationReport, LedgerError> {
    let snapshot = Snapshot::load(&config.snapshot_path)?;
    let stores = MemoryStores::load(snapshot).await?;

    let report = stores.ledger().reconcile(config.repair, metadata).await?;

    if report.repaired_any() {
        stores.snapshot().await.save(&config.snapshot_path)?;
        info!(path = %config.snapshot_path.display(), "repaired snapshot written");
    }
    Ok(report)
}

//! Dealership Ledger - Reconciliation Audit Binary
//!
//! Loads a JSON snapshot of the ledger, checks every cached balance against
//! its history and prints the report on stdout.
//!
//! # Usage
//!
//! ```bash
//! # Audit ./ledger.json
//! cargo run --bin dealership-ledger
//!
//! # Audit and repair another snapshot
//! LEDGER_REPAIR=true cargo run --bin dealership-ledger -- books.json
//! ```
//!
//! # Environment Variables
//!
//! * `LEDGER_LOG_LEVEL` - Log level when RUST_LOG is unset (default: info)
//! * `LEDGER_SNAPSHOT_PATH` - Snapshot to audit (default: ledger.json)
//! * `LEDGER_REPAIR` - Rewrite drifted caches from history (default: false)
//! * `LEDGER_FAIL_ON_DRIFT` - Exit non-zero when problems remain (default: true)

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use core_kernel::OperationMetadata;
use interface_cli::{audit_snapshot, config::LedgerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let config = LedgerConfig::from_env()
        .context("loading LEDGER_* configuration")?
        .with_snapshot_path(std::env::args().nth(1).map(PathBuf::from));

    init_tracing(&config.log_level);

    let run_id = Uuid::new_v4().to_string();
    tracing::info!(
        %run_id,
        snapshot = %config.snapshot_path.display(),
        repair = config.repair,
        "Starting reconciliation"
    );

    let metadata = OperationMetadata::with_correlation_id(run_id).initiated_by("dealership-ledger");
    let report = match audit_snapshot(&config, Some(metadata)).await {
        Ok(report) => report,
        Err(err) => {
            eprintln!("{}", serde_json::to_string_pretty(&err.report())?);
            return Err(err).context("reconciliation failed");
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    if config.fail_on_drift && report.needs_attention() {
        tracing::warn!("Unrepaired problems remain");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Logs go to stderr so stdout carries only the report
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

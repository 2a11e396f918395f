//! Ledger configuration

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Runtime configuration, read from `LEDGER_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// JSON snapshot to audit
    pub snapshot_path: PathBuf,
    /// Write recomputed balances back to the snapshot
    pub repair: bool,
    /// Exit non-zero when unrepaired drift or overpayment remains
    pub fail_on_drift: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            snapshot_path: PathBuf::from("ledger.json"),
            repair: false,
            fail_on_drift: true,
        }
    }
}

impl LedgerConfig {
    /// Loads configuration from the process environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::load(config::Environment::with_prefix("LEDGER"))
    }

    /// Loads configuration from an explicit set of variables
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, config::ConfigError> {
        Self::load(config::Environment::with_prefix("LEDGER").source(Some(vars)))
    }

    /// Overrides the snapshot path when one was given on the command line
    pub fn with_snapshot_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.snapshot_path = path;
        }
        self
    }

    fn load(environment: config::Environment) -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        config::Config::builder()
            .set_default("log_level", defaults.log_level)?
            .set_default("snapshot_path", defaults.snapshot_path.to_string_lossy().into_owned())?
            .set_default("repair", defaults.repair)?
            .set_default("fail_on_drift", defaults.fail_on_drift)?
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()
    }
}

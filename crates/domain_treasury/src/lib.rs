//! Treasury Domain - Internal Accounts
//!
//! Tracks the dealership's internal accounts. Each account's balance moves
//! with its deposits, withdrawals and the cuts it receives from invoices.
//! Every movement is stored as an [`AccountEntry`] with a signed delta so it
//! can be reversed exactly, and [`AccountLedger`] keeps the cached balance
//! equal to the fold of those deltas.

pub mod account;
pub mod ledger;
pub mod ports;
pub mod services;
pub mod error;

pub use account::{Account, AccountEntry, EntryKind};
pub use ledger::AccountLedger;
pub use ports::{AccountQuery, EntryKindFilter, EntryQuery, TreasuryCommit, TreasuryPort, TreasuryPortExt};
pub use services::{CutTarget, EntryEdit, EntryOutcome, NewEntry, TreasuryService};
pub use error::TreasuryError;

//! Account balance transitions
//!
//! The balance of an account is the fold of its live entries' signed deltas.
//! [`AccountLedger`] keeps the cached `Account::balance` in step with that
//! fold one entry at a time. Negative balances are valid: they record a debt,
//! not an error.

use chrono::NaiveDate;

use core_kernel::{detect_drift, fold, AccountId, Drift, InvoiceId, Money, MoneyError, SoftDelete};

use crate::account::{Account, AccountEntry, EntryKind};
use crate::error::TreasuryError;

/// Balance transitions for an account
pub struct AccountLedger;

impl AccountLedger {
    /// Records a deposit and raises the balance by `amount`
    ///
    /// # Errors
    ///
    /// `AmountNotPositive` if `amount <= 0`; the account is left untouched.
    pub fn apply_deposit(
        account: &mut Account,
        amount: Money,
        date: NaiveDate,
    ) -> Result<AccountEntry, TreasuryError> {
        let entry = AccountEntry::deposit(account.id, amount, date)?;
        Self::apply(account, &entry)?;
        Ok(entry)
    }

    /// Records a withdrawal and lowers the balance by `amount`, even below zero
    pub fn apply_withdrawal(
        account: &mut Account,
        amount: Money,
        date: NaiveDate,
    ) -> Result<AccountEntry, TreasuryError> {
        let entry = AccountEntry::withdrawal(account.id, amount, date)?;
        Self::apply(account, &entry)?;
        Ok(entry)
    }

    /// Records an invoice's cut for this account
    pub fn apply_invoice_cut(
        account: &mut Account,
        invoice_id: InvoiceId,
        amount: Money,
        date: NaiveDate,
    ) -> Result<AccountEntry, TreasuryError> {
        let entry = AccountEntry::invoice_cut(account.id, invoice_id, amount, date)?;
        Self::apply(account, &entry)?;
        Ok(entry)
    }

    /// Adds an entry's stored delta to the balance
    pub fn apply(account: &mut Account, entry: &AccountEntry) -> Result<(), TreasuryError> {
        Self::ensure_owned(account, entry)?;
        account.balance = account.balance.checked_add(entry.delta)?;
        account.touch();
        Ok(())
    }

    /// Exact inverse of [`AccountLedger::apply`], using the entry's stored delta
    pub fn retract(account: &mut Account, entry: &AccountEntry) -> Result<(), TreasuryError> {
        Self::ensure_owned(account, entry)?;
        account.balance = account.balance.checked_sub(entry.delta)?;
        account.touch();
        Ok(())
    }

    /// Reverses a deposit
    pub fn retract_deposit(account: &mut Account, entry: &AccountEntry) -> Result<(), TreasuryError> {
        Self::ensure_kind(entry, EntryKind::Deposit)?;
        Self::retract(account, entry)
    }

    /// Reverses a withdrawal
    pub fn retract_withdrawal(account: &mut Account, entry: &AccountEntry) -> Result<(), TreasuryError> {
        Self::ensure_kind(entry, EntryKind::Withdrawal)?;
        Self::retract(account, entry)
    }

    /// Retracts `old` and applies `new` as one balance update
    pub fn replace(
        account: &mut Account,
        old: &AccountEntry,
        new: &AccountEntry,
    ) -> Result<(), TreasuryError> {
        Self::ensure_owned(account, old)?;
        Self::ensure_owned(account, new)?;
        if old.id != new.id {
            return Err(TreasuryError::invalid_operation(format!(
                "cannot replace entry {} with a different entry {}",
                old.id, new.id
            )));
        }
        account.balance = account.balance.checked_sub(old.delta)?.checked_add(new.delta)?;
        account.touch();
        Ok(())
    }

    /// Derives an account's balance from its entries
    ///
    /// Entries of other accounts and soft-deleted entries are ignored.
    pub fn recompute(account_id: AccountId, entries: &[AccountEntry]) -> Result<Money, MoneyError> {
        let owned: Vec<&AccountEntry> = entries
            .iter()
            .filter(|entry| entry.account_id == account_id)
            .collect();
        fold(Money::ZERO, owned)
    }

    /// Compares the cached balance with the recomputed one
    pub fn reconcile(account: &Account, entries: &[AccountEntry]) -> Result<Option<Drift>, MoneyError> {
        detect_drift(account.balance, Self::recompute(account.id, entries)?)
    }

    /// Live entries that belong to `invoice_id`
    pub fn cuts_for_invoice(entries: &[AccountEntry], invoice_id: InvoiceId) -> Vec<&AccountEntry> {
        entries
            .iter()
            .filter(|entry| entry.kind.invoice_id() == Some(invoice_id) && !entry.is_deleted())
            .collect()
    }

    fn ensure_owned(account: &Account, entry: &AccountEntry) -> Result<(), TreasuryError> {
        if entry.account_id != account.id {
            return Err(TreasuryError::invalid_operation(format!(
                "entry {} belongs to account {}, not {}",
                entry.id, entry.account_id, account.id
            )));
        }
        Ok(())
    }

    fn ensure_kind(entry: &AccountEntry, expected: EntryKind) -> Result<(), TreasuryError> {
        if entry.kind != expected {
            return Err(TreasuryError::invalid_operation(format!(
                "entry {} is a {}, not a {}",
                entry.id,
                entry.kind.label(),
                expected.label()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 2).unwrap()
    }

    #[test]
    fn test_deposit_withdraw_retract() {
        let mut account = Account::new("Cash box");

        AccountLedger::apply_deposit(&mut account, Money::from_major(200), date()).unwrap();
        let withdrawal =
            AccountLedger::apply_withdrawal(&mut account, Money::from_major(250), date()).unwrap();
        assert_eq!(account.balance, Money::from_major(-50));

        AccountLedger::retract_withdrawal(&mut account, &withdrawal).unwrap();
        assert_eq!(account.balance, Money::from_major(200));
    }

    #[test]
    fn test_invalid_deposit_leaves_balance() {
        let mut account = Account::new("Bank");
        assert!(AccountLedger::apply_deposit(&mut account, Money::from_major(-1), date()).is_err());
        assert_eq!(account.balance, Money::ZERO);
    }

    #[test]
    fn test_retract_checks_kind() {
        let mut account = Account::new("Bank");
        let deposit = AccountLedger::apply_deposit(&mut account, Money::from_major(10), date()).unwrap();
        assert!(AccountLedger::retract_withdrawal(&mut account, &deposit).is_err());
        assert_eq!(account.balance, Money::from_major(10));
    }

    #[test]
    fn test_foreign_entry_rejected() {
        let mut account = Account::new("Bank");
        let other = Account::new("Other");
        let entry = AccountEntry::deposit(other.id, Money::from_major(10), date()).unwrap();
        assert!(AccountLedger::apply(&mut account, &entry).is_err());
    }

    #[test]
    fn test_replace_is_one_step() {
        let mut account = Account::new("Bank");
        let entry = AccountLedger::apply_deposit(&mut account, Money::from_major(100), date()).unwrap();
        let edited = entry.with_amount(Money::from_major(30)).unwrap();

        AccountLedger::replace(&mut account, &entry, &edited).unwrap();
        assert_eq!(account.balance, Money::from_major(30));
    }

    #[test]
    fn test_recompute_ignores_deleted() {
        let mut account = Account::new("Bank");
        let deposit = AccountLedger::apply_deposit(&mut account, Money::from_major(200), date()).unwrap();
        let mut withdrawal =
            AccountLedger::apply_withdrawal(&mut account, Money::from_major(250), date()).unwrap();
        AccountLedger::retract(&mut account, &withdrawal).unwrap();
        withdrawal.mark_deleted(Utc::now());

        let entries = vec![deposit, withdrawal];
        assert_eq!(AccountLedger::recompute(account.id, &entries).unwrap(), Money::from_major(200));
        assert!(AccountLedger::reconcile(&account, &entries).unwrap().is_none());
    }
}

//! Balances as folds over transaction history
//!
//! A stored balance (client, account, car expenses) is a materialized cache.
//! The source of truth is the fold of every live entry's signed delta, which
//! is order independent and can be recomputed at any time to detect drift.

use serde::{Deserialize, Serialize};

use crate::money::{Money, MoneyError};

/// A transaction that moves one owner's balance
pub trait LedgerEntry {
    /// Signed effect on the owner's balance
    fn delta(&self) -> Money;

    /// True for entries that no longer count, such as soft-deleted ones
    fn is_void(&self) -> bool {
        false
    }
}

/// Folds live entries onto an opening balance
///
/// # Errors
///
/// `MoneyError::Overflow` if the running balance leaves the `Money` range.
pub fn fold<'a, E, I>(opening: Money, entries: I) -> Result<Money, MoneyError>
where
    E: LedgerEntry + 'a,
    I: IntoIterator<Item = &'a E>,
{
    entries
        .into_iter()
        .filter(|entry| !entry.is_void())
        .try_fold(opening, |balance, entry| balance.checked_add(entry.delta()))
}

/// Mismatch between a cached balance and the one recomputed from history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drift {
    pub cached: Money,
    pub recomputed: Money,
    /// `cached - recomputed`
    pub difference: Money,
}

/// Returns the drift if the cache disagrees with history by any amount
pub fn detect_drift(cached: Money, recomputed: Money) -> Result<Option<Drift>, MoneyError> {
    if cached == recomputed {
        return Ok(None);
    }
    Ok(Some(Drift {
        cached,
        recomputed,
        difference: cached.checked_sub(recomputed)?,
    }))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    struct Delta(Money);

    impl LedgerEntry for Delta {
        fn delta(&self) -> Money {
            self.0
        }
    }

    proptest! {
        #[test]
        fn fold_is_order_independent(units in proptest::collection::vec(-1_000_000i64..1_000_000i64, 0..50)) {
            let forward: Vec<Delta> = units.iter().map(|u| Delta(Money::from_units(*u))).collect();
            let backward: Vec<Delta> = units.iter().rev().map(|u| Delta(Money::from_units(*u))).collect();
            prop_assert_eq!(fold(Money::ZERO, &forward).unwrap(), fold(Money::ZERO, &backward).unwrap());
        }
    }
}

//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating amounts and payment plans
//! that respect the ledger's invariants.

use chrono::{Duration, NaiveDate};
use core_kernel::{ClientId, InvoiceId, Money};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for positive amounts up to one million, on the 4 dp grid
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (1i64..10_000_000_000i64).prop_map(Money::from_units)
}

/// Strategy for positive whole-cent amounts up to one million
pub fn positive_cents_strategy() -> impl Strategy<Value = Money> {
    (1i64..100_000_000i64).prop_map(Money::from_cents)
}

/// Strategy for signed amounts
pub fn money_strategy() -> impl Strategy<Value = Money> {
    (-10_000_000_000i64..10_000_000_000i64).prop_map(Money::from_units)
}

/// Strategy for invoice amounts, zero included
pub fn invoice_amount_strategy() -> impl Strategy<Value = Money> {
    (0i64..100_000_000i64).prop_map(Money::from_cents)
}

/// Strategy for decimals with up to 6 places, some of which need rounding
pub fn decimal_amount_strategy() -> impl Strategy<Value = Decimal> {
    (-1_000_000_000i64..1_000_000_000i64, 0u32..=6u32).prop_map(|(m, s)| Decimal::new(m, s))
}

/// An invoice amount together with payments that never overpay it
///
/// The amount is split by random weights; the last payment takes whatever
/// the rounding left over, so the payments sum to at most the amount.
pub fn payment_plan_strategy() -> impl Strategy<Value = (Money, Vec<Money>)> {
    (100i64..10_000_000i64, proptest::collection::vec(1u32..100u32, 1..8)).prop_map(
        |(cents, weights)| {
            let amount = Money::from_cents(cents);
            let total: u32 = weights.iter().sum();
            let mut remaining = amount.units();
            let mut payments = Vec::with_capacity(weights.len());

            for weight in weights {
                let share = amount.units() * i64::from(weight) / i64::from(total);
                let share = share.min(remaining);
                if share > 0 {
                    payments.push(Money::from_units(share));
                    remaining -= share;
                }
            }
            (amount, payments)
        },
    )
}

/// Strategy for a sequence of signed account movements
pub fn movements_strategy() -> impl Strategy<Value = Vec<Money>> {
    proptest::collection::vec(
        (1i64..10_000_000i64, any::<bool>())
            .prop_map(|(cents, deposit)| if deposit { Money::from_cents(cents) } else { -Money::from_cents(cents) }),
        0..30,
    )
}

/// Strategy for dates within 2024
pub fn date_2024_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..366i64).prop_map(|days| {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default() + Duration::days(days)
    })
}

/// Strategy for generating ClientId
pub fn client_id_strategy() -> impl Strategy<Value = ClientId> {
    any::<[u8; 16]>().prop_map(|bytes| ClientId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for generating InvoiceId
pub fn invoice_id_strategy() -> impl Strategy<Value = InvoiceId> {
    any::<[u8; 16]>().prop_map(|bytes| InvoiceId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for names
pub fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{2,10}".prop_map(|s| s)
}

//! Pre-built Test Fixtures
//!
//! Ready-to-use amounts, dates and identifiers. Amounts are the ones the
//! ledger scenarios are written against, so tests read like the scenarios.

use chrono::NaiveDate;
use core_kernel::{AccountId, CarId, CarModelId, ClientId, Money};
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// A typical invoice amount
    pub fn invoice_100() -> Money {
        Money::from_major(100)
    }

    /// The first payment in the partial payment scenario
    pub fn payment_60() -> Money {
        Money::from_major(60)
    }

    /// Exactly what is left after `payment_60`
    pub fn payment_40() -> Money {
        Money::from_major(40)
    }

    /// One that overpays after `payment_60`
    pub fn payment_45() -> Money {
        Money::from_major(45)
    }

    pub fn deposit_200() -> Money {
        Money::from_major(200)
    }

    pub fn withdrawal_250() -> Money {
        Money::from_major(250)
    }

    /// 20.50, the fractional expense in the car cost scenario
    pub fn expense_20_50() -> Money {
        Money::from_cents(2050)
    }

    /// A third of 100.00 at full internal precision
    pub fn one_third_of_100() -> Money {
        Money::from_decimal(dec!(33.3333)).unwrap_or(Money::ZERO)
    }

    /// Half a cent, below the settlement epsilon
    pub fn half_cent() -> Money {
        Money::from_units(50)
    }

    /// A car purchase price
    pub fn purchase_price() -> Money {
        Money::from_major(15_000)
    }
}

/// Fixture for dates
pub struct DateFixtures;

impl DateFixtures {
    pub fn invoice_date() -> NaiveDate {
        Self::day(2024, 3, 1)
    }

    pub fn payment_date() -> NaiveDate {
        Self::day(2024, 3, 15)
    }

    pub fn expense_date() -> NaiveDate {
        Self::day(2024, 2, 20)
    }

    /// Builds a date; an impossible one falls back to the invoice date
    pub fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day)
            .or_else(|| NaiveDate::from_ymd_opt(2024, 3, 1))
            .unwrap_or_default()
    }
}

/// Fixture for identifiers that must stay stable between runs
pub struct IdFixtures;

impl IdFixtures {
    pub fn client_id() -> ClientId {
        ClientId::from_uuid(Uuid::from_u128(0x0001_0000_0000_0000_0000_0000_0000_0001))
    }

    pub fn car_id() -> CarId {
        CarId::from_uuid(Uuid::from_u128(0x0002_0000_0000_0000_0000_0000_0000_0001))
    }

    pub fn car_model_id() -> CarModelId {
        CarModelId::from_uuid(Uuid::from_u128(0x0003_0000_0000_0000_0000_0000_0000_0001))
    }

    pub fn account_id() -> AccountId {
        AccountId::from_uuid(Uuid::from_u128(0x0004_0000_0000_0000_0000_0000_0000_0001))
    }
}

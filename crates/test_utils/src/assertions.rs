//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for domain types that give
//! more meaningful error messages than standard assertions.

use core_kernel::{Money, SETTLEMENT_EPSILON};

/// Asserts that two Money values are exactly equal
pub fn assert_money_eq(actual: Money, expected: Money) {
    assert_eq!(
        actual,
        expected,
        "Money mismatch: actual={} ({} units), expected={} ({} units)",
        actual,
        actual.units(),
        expected,
        expected.units()
    );
}

/// Asserts that two Money values are equal within the settlement epsilon
pub fn assert_money_approx_eq(actual: Money, expected: Money) {
    assert!(
        actual.approx_eq(&expected),
        "Money amounts differ by more than {}: actual={}, expected={}, diff={}",
        SETTLEMENT_EPSILON,
        actual,
        expected,
        (actual - expected).abs()
    );
}

/// Asserts that a Money value is zero within the settlement epsilon
pub fn assert_money_zero(money: Money) {
    assert!(
        money.is_zero(),
        "Expected zero money, got {} ({} units)",
        money,
        money.units()
    );
}

/// Asserts that a Money value is positive
pub fn assert_money_positive(money: Money) {
    assert!(money.is_positive(), "Expected positive money, got {}", money);
}

/// Asserts that a Money value is negative
pub fn assert_money_negative(money: Money) {
    assert!(money.is_negative(), "Expected negative money, got {}", money);
}

/// Asserts that a Money value is never below zero
pub fn assert_money_non_negative(money: Money) {
    assert!(!money.is_negative(), "Expected non-negative money, got {}", money);
}

/// Asserts that money values sum exactly to a total
pub fn assert_money_sum_equals(parts: &[Money], total: Money) {
    let sum: Money = parts.iter().sum();
    assert_eq!(
        sum,
        total,
        "Sum of parts ({}) doesn't equal total ({})",
        sum,
        total
    );
}

/// Asserts that a result is Ok and returns the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Asserts that a result is Err and returns the error
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => panic!("{}: {:?}", $msg, value),
            Err(e) => e,
        }
    };
}

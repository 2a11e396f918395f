//! Unit tests for the Money module
//!
//! Covers construction at the boundary, exact arithmetic, and the
//! settlement tolerance used wherever "paid" or "zero balance" is decided.

use core_kernel::{Money, MoneyError, SETTLEMENT_EPSILON};
use rust_decimal_macros::dec;
use std::cmp::Ordering;
use std::str::FromStr;

fn money(s: &str) -> Money {
    Money::from_str(s).unwrap()
}

mod creation {
    use super::*;

    #[test]
    fn test_from_decimal_keeps_four_places() {
        let m = Money::from_decimal(dec!(100.123456)).unwrap();
        assert_eq!(m.to_decimal(), dec!(100.1235));
    }

    #[test]
    fn test_from_decimal_rounds_half_away_from_zero() {
        assert_eq!(Money::from_decimal(dec!(0.00005)).unwrap(), Money::from_units(1));
        assert_eq!(Money::from_decimal(dec!(-0.00005)).unwrap(), Money::from_units(-1));
    }

    #[test]
    fn test_from_major_and_cents_agree() {
        assert_eq!(Money::from_major(250), Money::from_cents(25_000));
    }

    #[test]
    fn test_from_str_trims_whitespace() {
        assert_eq!(money(" 20.50 "), Money::from_cents(2050));
    }

    #[test]
    fn test_from_str_rejects_garbage() {
        assert!(matches!(Money::from_str("12,50"), Err(MoneyError::InvalidAmount(_))));
    }

    #[test]
    fn test_from_f64_rejects_infinity() {
        assert!(Money::from_f64(f64::INFINITY).is_err());
    }

    #[test]
    fn test_from_decimal_overflow() {
        let huge = rust_decimal::Decimal::MAX;
        assert_eq!(Money::from_decimal(huge), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_to_f64_at_boundary() {
        assert_eq!(money("100.50").to_f64(), 100.5);
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_summing_many_small_payments_is_exact() {
        let total: Money = std::iter::repeat(money("0.10")).take(1000).sum();
        assert_eq!(total, Money::from_major(100));
    }

    #[test]
    fn test_add_and_subtract() {
        let a = money("100.00");
        let b = money("60.00");
        assert_eq!(a - b, money("40.00"));
        assert_eq!(a + b, money("160.00"));
    }

    #[test]
    fn test_subtract_can_go_negative() {
        assert!((money("200.00") - money("250.00")).is_negative());
    }

    #[test]
    fn test_assign_operators() {
        let mut balance = Money::ZERO;
        balance += money("200.00");
        balance -= money("250.00");
        assert_eq!(balance, money("-50.00"));
    }

    #[test]
    fn test_checked_add_overflow() {
        let max = Money::from_units(i64::MAX);
        assert_eq!(max.checked_add(Money::from_units(1)), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_negation() {
        assert_eq!(-money("12.34"), money("-12.34"));
    }
}

mod tolerance {
    use super::*;

    #[test]
    fn test_epsilon_is_one_cent() {
        assert_eq!(SETTLEMENT_EPSILON, Money::from_cents(1));
    }

    #[test]
    fn test_is_zero_is_tolerant() {
        assert!(money("0.0099").is_zero());
        assert!(money("-0.0099").is_zero());
        assert!(!money("0.01").is_zero());
        assert!(!money("0.0099").is_exactly_zero());
    }

    #[test]
    fn test_clamp_to_zero_if_negligible() {
        assert_eq!(money("0.004").clamp_to_zero_if_negligible(SETTLEMENT_EPSILON), Money::ZERO);
        assert_eq!(money("-0.004").clamp_to_zero_if_negligible(SETTLEMENT_EPSILON), Money::ZERO);
        assert_eq!(money("0.02").clamp_to_zero_if_negligible(SETTLEMENT_EPSILON), money("0.02"));
    }

    #[test]
    fn test_compare_is_tolerant_but_ord_is_exact() {
        let a = money("99.9999");
        let b = money("100.00");
        assert_eq!(a.compare(&b), Ordering::Equal);
        assert!(a.approx_eq(&b));
        assert!(a < b);
    }

    #[test]
    fn test_compare_outside_epsilon() {
        assert_eq!(money("40.00").compare(&money("45.00")), Ordering::Less);
        assert_eq!(money("45.00").compare(&money("40.00")), Ordering::Greater);
    }
}

mod display {
    use super::*;

    #[test]
    fn test_display_two_places() {
        assert_eq!(money("100.5").to_string(), "100.50");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn test_display_rounds_sub_cent() {
        assert_eq!(money("33.3333").to_string(), "33.33");
        assert_eq!(money("0.005").to_string(), "0.01");
    }
}

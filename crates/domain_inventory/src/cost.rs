//! Car cost accumulation
//!
//! `Car::total_expenses` is a cache of the sum of the car's live expenses.
//! There is no upper bound: an expense may exceed the purchase price.

use core_kernel::{detect_drift, fold, require_positive, CarId, Drift, Money, MoneyError};

use crate::car::Car;
use crate::error::InventoryError;
use crate::expense::CarExpense;

/// Keeps a car's expense total in step with its expenses
pub struct CarCostAccumulator;

impl CarCostAccumulator {
    /// Adds an expense to the car's total
    ///
    /// # Errors
    ///
    /// `AmountNotPositive` if the expense amount is not above zero, or
    /// `InvalidOperation` if the expense belongs to another car. The car is
    /// left untouched on error.
    pub fn apply_expense(car: &mut Car, expense: &CarExpense) -> Result<(), InventoryError> {
        Self::ensure_owned(car, expense)?;
        require_positive("Expense", expense.amount)?;
        car.total_expenses = car.total_expenses.checked_add(expense.amount)?;
        car.touch();
        Ok(())
    }

    /// Exact inverse of [`CarCostAccumulator::apply_expense`]
    pub fn retract_expense(car: &mut Car, expense: &CarExpense) -> Result<(), InventoryError> {
        Self::ensure_owned(car, expense)?;
        car.total_expenses = car.total_expenses.checked_sub(expense.amount)?;
        car.touch();
        Ok(())
    }

    /// Swaps an expense's old amount for its new one in a single update
    pub fn replace_expense(
        car: &mut Car,
        old: &CarExpense,
        new: &CarExpense,
    ) -> Result<(), InventoryError> {
        Self::ensure_owned(car, old)?;
        Self::ensure_owned(car, new)?;
        require_positive("Expense", new.amount)?;
        if old.id != new.id {
            return Err(InventoryError::invalid_operation(format!(
                "cannot replace expense {} with a different expense {}",
                old.id, new.id
            )));
        }
        car.total_expenses = car.total_expenses.checked_sub(old.amount)?.checked_add(new.amount)?;
        car.touch();
        Ok(())
    }

    /// Sum of a car's live expenses
    pub fn recompute(car_id: CarId, expenses: &[CarExpense]) -> Result<Money, MoneyError> {
        let owned: Vec<&CarExpense> = expenses.iter().filter(|e| e.car_id == car_id).collect();
        fold(Money::ZERO, owned)
    }

    pub fn reconcile(car: &Car, expenses: &[CarExpense]) -> Result<Option<Drift>, MoneyError> {
        detect_drift(car.total_expenses, Self::recompute(car.id, expenses)?)
    }

    /// Purchase price plus the recomputed expense total
    pub fn total_cost(car: &Car, expenses: &[CarExpense]) -> Result<Money, MoneyError> {
        car.purchase_price.checked_add(Self::recompute(car.id, expenses)?)
    }

    fn ensure_owned(car: &Car, expense: &CarExpense) -> Result<(), InventoryError> {
        if expense.car_id != car.id {
            return Err(InventoryError::invalid_operation(format!(
                "expense {} belongs to car {}, not {}",
                expense.id, expense.car_id, car.id
            )));
        }
        Ok(())
    }
}

//! Inventory domain services
//!
//! Every expense action commits the expense together with its car so the
//! cached expense total always matches the expense history.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use core_kernel::{
    require, CarExpenseId, CarId, CarModelId, Drift, Money, OperationMetadata, Page,
    PageRequest, SoftDelete,
};

use crate::car::{Car, CarCost, CarStatus};
use crate::cost::CarCostAccumulator;
use crate::error::InventoryError;
use crate::expense::CarExpense;
use crate::ports::{single, CarQuery, ExpenseQuery, InventoryCommit, InventoryPort, InventoryPortExt};

/// Form input for registering a car
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCar {
    pub car_model_id: Option<CarModelId>,
    pub purchase_price: Money,
    pub purchase_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Form input for a new expense
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewExpense {
    pub car_id: Option<CarId>,
    pub amount: Money,
    pub description: String,
    pub expense_date: Option<NaiveDate>,
}

/// Form input for editing an expense; `None` keeps the stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpenseEdit {
    pub amount: Money,
    pub description: Option<String>,
    pub expense_date: Option<NaiveDate>,
}

/// An expense after a mutation, with its car's new cost
#[derive(Debug, Clone, Serialize)]
pub struct ExpenseOutcome {
    pub expense: CarExpense,
    pub cost: CarCost,
}

/// Manages cars and their expenses
pub struct InventoryService {
    port: Arc<dyn InventoryPort>,
}

impl InventoryService {
    pub fn new(port: Arc<dyn InventoryPort>) -> Self {
        Self { port }
    }

    #[instrument(skip_all, fields(price = %request.purchase_price))]
    pub async fn register_car(
        &self,
        request: NewCar,
        metadata: Option<OperationMetadata>,
    ) -> Result<Car, InventoryError> {
        let car_model_id = require(request.car_model_id, "car_model_id")?;
        let car = Car::new(car_model_id, request.purchase_price)?
            .with_purchase_date(request.purchase_date)
            .with_notes(request.notes);

        let committed = self.port.commit(InventoryCommit::new().car(car), metadata).await?;
        let car = single(committed.cars, "car")?;

        info!(car_id = %car.id, "car registered");
        Ok(car)
    }

    /// Marks a car available or sold
    #[instrument(skip(self, metadata))]
    pub async fn set_status(
        &self,
        id: CarId,
        status: CarStatus,
        metadata: Option<OperationMetadata>,
    ) -> Result<Car, InventoryError> {
        let mut car = self.port.get_live_car(id, metadata.clone()).await?;
        if car.status == status {
            return Ok(car);
        }

        car.status = status;
        car.touch();
        let committed = self.port.commit(InventoryCommit::new().car(car), metadata).await?;

        info!(status = status.label(), "car status changed");
        Ok(single(committed.cars, "car")?)
    }

    /// Soft-deletes a car; refused while it has live expenses
    #[instrument(skip(self, metadata))]
    pub async fn delete_car(
        &self,
        id: CarId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Car, InventoryError> {
        let mut car = self.port.get_live_car(id, metadata.clone()).await?;
        let live = self
            .port
            .list_expenses(ExpenseQuery::for_car(id), PageRequest::default(), metadata.clone())
            .await?;
        if live.total > 0 {
            debug!(expenses = live.total, "car still has expenses");
            return Err(InventoryError::HasDependents {
                entity: "Car",
                id: id.to_string(),
                count: live.total,
                dependents: "expenses",
            });
        }

        car.mark_deleted(Utc::now());
        car.touch();
        let committed = self.port.commit(InventoryCommit::new().car(car), metadata).await?;

        info!("car deleted");
        Ok(single(committed.cars, "car")?)
    }

    #[instrument(skip(self, metadata))]
    pub async fn restore_car(
        &self,
        id: CarId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Car, InventoryError> {
        let mut car = self.port.get_car(id, metadata.clone()).await?;
        if !car.is_deleted() {
            return Err(InventoryError::invalid_operation(format!("Car {id} is not deleted")));
        }

        car.restore();
        car.touch();
        let committed = self.port.commit(InventoryCommit::new().car(car), metadata).await?;

        info!("car restored");
        Ok(single(committed.cars, "car")?)
    }

    /// Records an expense and adds it to the car's total
    #[instrument(skip_all, fields(car_id = ?request.car_id, amount = %request.amount))]
    pub async fn record_expense(
        &self,
        request: NewExpense,
        metadata: Option<OperationMetadata>,
    ) -> Result<ExpenseOutcome, InventoryError> {
        let car_id = require(request.car_id, "car_id")?;
        let expense_date = require(request.expense_date, "expense_date")?;
        let expense = CarExpense::new(car_id, request.amount, request.description, expense_date)?;

        let mut car = self.port.get_live_car(car_id, metadata.clone()).await?;
        CarCostAccumulator::apply_expense(&mut car, &expense)?;

        let outcome = self.commit_one(car, expense, metadata).await?;
        info!(
            expense_id = %outcome.expense.id,
            total_expenses = %outcome.cost.total_expenses,
            "expense recorded"
        );
        Ok(outcome)
    }

    /// Changes an expense, retracting the old amount and applying the new one
    #[instrument(skip(self, edit, metadata), fields(amount = %edit.amount))]
    pub async fn edit_expense(
        &self,
        id: CarExpenseId,
        edit: ExpenseEdit,
        metadata: Option<OperationMetadata>,
    ) -> Result<ExpenseOutcome, InventoryError> {
        let current = self.port.get_live_expense(id, metadata.clone()).await?;
        let mut updated = current.with_amount(edit.amount)?;
        if let Some(description) = edit.description {
            updated.description = description;
        }
        if let Some(date) = edit.expense_date {
            updated.expense_date = date;
        }

        let mut car = self.port.get_car(current.car_id, metadata.clone()).await?;
        CarCostAccumulator::replace_expense(&mut car, &current, &updated)?;

        let outcome = self.commit_one(car, updated, metadata).await?;
        info!(previous = %current.amount, total_expenses = %outcome.cost.total_expenses, "expense edited");
        Ok(outcome)
    }

    /// Soft-deletes an expense and removes it from the car's total
    #[instrument(skip(self, metadata))]
    pub async fn delete_expense(
        &self,
        id: CarExpenseId,
        metadata: Option<OperationMetadata>,
    ) -> Result<ExpenseOutcome, InventoryError> {
        let mut expense = self.port.get_live_expense(id, metadata.clone()).await?;
        let mut car = self.port.get_car(expense.car_id, metadata.clone()).await?;
        CarCostAccumulator::retract_expense(&mut car, &expense)?;
        expense.mark_deleted(Utc::now());
        expense.touch();

        let outcome = self.commit_one(car, expense, metadata).await?;
        info!(total_expenses = %outcome.cost.total_expenses, "expense deleted");
        Ok(outcome)
    }

    #[instrument(skip(self, metadata))]
    pub async fn restore_expense(
        &self,
        id: CarExpenseId,
        metadata: Option<OperationMetadata>,
    ) -> Result<ExpenseOutcome, InventoryError> {
        let mut expense = self.port.get_expense(id, metadata.clone()).await?;
        if !expense.is_deleted() {
            return Err(InventoryError::invalid_operation(format!("Expense {id} is not deleted")));
        }

        let mut car = self.port.get_live_car(expense.car_id, metadata.clone()).await?;
        expense.restore();
        expense.touch();
        CarCostAccumulator::apply_expense(&mut car, &expense)?;

        let outcome = self.commit_one(car, expense, metadata).await?;
        info!(total_expenses = %outcome.cost.total_expenses, "expense restored");
        Ok(outcome)
    }

    /// Purchase price plus accumulated expenses
    pub async fn total_cost(
        &self,
        car_id: CarId,
        metadata: Option<OperationMetadata>,
    ) -> Result<CarCost, InventoryError> {
        let car = self.port.get_car(car_id, metadata).await?;
        Ok(CarCost::from(&car))
    }

    pub async fn list_cars(
        &self,
        query: CarQuery,
        page: PageRequest,
        metadata: Option<OperationMetadata>,
    ) -> Result<Page<Car>, InventoryError> {
        Ok(self.port.list_cars(query, page, metadata).await?)
    }

    pub async fn list_expenses(
        &self,
        query: ExpenseQuery,
        page: PageRequest,
        metadata: Option<OperationMetadata>,
    ) -> Result<Page<CarExpense>, InventoryError> {
        Ok(self.port.list_expenses(query, page, metadata).await?)
    }

    /// Compares a car's cached expense total with its expense history
    pub async fn car_drift(
        &self,
        car_id: CarId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Option<Drift>, InventoryError> {
        let car = self.port.get_car(car_id, metadata.clone()).await?;
        let history = self.port.expense_history(car_id, metadata).await?;
        let drift = CarCostAccumulator::reconcile(&car, &history)?;

        if let Some(drift) = &drift {
            warn!(%car_id, cached = %drift.cached, recomputed = %drift.recomputed, "car expense drift");
        }
        Ok(drift)
    }

    /// Overwrites a car's cached expense total with the recomputed one
    #[instrument(skip(self, metadata))]
    pub async fn repair_car_expenses(
        &self,
        car_id: CarId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Car, InventoryError> {
        let mut car = self.port.get_car(car_id, metadata.clone()).await?;
        let history = self.port.expense_history(car_id, metadata.clone()).await?;
        let recomputed = CarCostAccumulator::recompute(car_id, &history)?;
        if car.total_expenses == recomputed {
            return Ok(car);
        }

        car.total_expenses = recomputed;
        car.touch();
        let committed = self.port.commit(InventoryCommit::new().car(car), metadata).await?;
        let car = single(committed.cars, "car")?;

        info!(total_expenses = %car.total_expenses, "car expenses repaired");
        Ok(car)
    }

    async fn commit_one(
        &self,
        car: Car,
        expense: CarExpense,
        metadata: Option<OperationMetadata>,
    ) -> Result<ExpenseOutcome, InventoryError> {
        let committed = self
            .port
            .commit(InventoryCommit::new().car(car).expense(expense), metadata)
            .await?;
        let car = single(committed.cars, "car")?;
        let expense = single(committed.expenses, "expense")?;

        Ok(ExpenseOutcome {
            expense,
            cost: CarCost::from(&car),
        })
    }
}

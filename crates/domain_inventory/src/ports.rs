//! Inventory Domain Ports
//!
//! `InventoryPort` reads cars and expenses and writes them back through a
//! single atomic, version-checked [`InventoryPort::commit`].

use async_trait::async_trait;
use chrono::NaiveDate;

use core_kernel::{
    CarExpenseId, CarId, CarModelId, DomainPort, OperationMetadata, Page, PageRequest, PortError,
    SoftDelete,
};

use crate::car::{Car, CarStatus};
use crate::expense::CarExpense;

/// Query parameters for listing cars
#[derive(Debug, Clone, Default)]
pub struct CarQuery {
    pub car_model_id: Option<CarModelId>,
    pub status: Option<CarStatus>,
    pub include_deleted: bool,
}

impl CarQuery {
    pub fn with_status(mut self, status: CarStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

/// Query parameters for listing expenses
#[derive(Debug, Clone, Default)]
pub struct ExpenseQuery {
    pub car_id: Option<CarId>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub include_deleted: bool,
}

impl ExpenseQuery {
    pub fn for_car(car_id: CarId) -> Self {
        Self {
            car_id: Some(car_id),
            ..Default::default()
        }
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

/// Rows to write in one transaction
#[derive(Debug, Clone, Default)]
pub struct InventoryCommit {
    pub cars: Vec<Car>,
    pub expenses: Vec<CarExpense>,
}

impl InventoryCommit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn car(mut self, car: Car) -> Self {
        self.cars.push(car);
        self
    }

    pub fn expense(mut self, expense: CarExpense) -> Self {
        self.expenses.push(expense);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cars.is_empty() && self.expenses.is_empty()
    }
}

/// Port for inventory persistence
#[async_trait]
pub trait InventoryPort: DomainPort {
    /// Gets a car by id, including soft-deleted ones
    async fn get_car(&self, id: CarId, metadata: Option<OperationMetadata>) -> Result<Car, PortError>;

    /// Lists cars, newest first
    async fn list_cars(
        &self,
        query: CarQuery,
        page: PageRequest,
        metadata: Option<OperationMetadata>,
    ) -> Result<Page<Car>, PortError>;

    /// Gets an expense by id, including soft-deleted ones
    async fn get_expense(
        &self,
        id: CarExpenseId,
        metadata: Option<OperationMetadata>,
    ) -> Result<CarExpense, PortError>;

    /// Lists expenses, newest first
    async fn list_expenses(
        &self,
        query: ExpenseQuery,
        page: PageRequest,
        metadata: Option<OperationMetadata>,
    ) -> Result<Page<CarExpense>, PortError>;

    /// Writes a batch atomically, returning the rows with their new versions
    async fn commit(
        &self,
        batch: InventoryCommit,
        metadata: Option<OperationMetadata>,
    ) -> Result<InventoryCommit, PortError>;
}

/// Convenience operations built on top of InventoryPort
#[async_trait]
pub trait InventoryPortExt: InventoryPort {
    /// Every expense of a car, soft-deleted ones included
    async fn expense_history(
        &self,
        car_id: CarId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Vec<CarExpense>, PortError> {
        let page = self
            .list_expenses(
                ExpenseQuery::for_car(car_id).including_deleted(),
                PageRequest::all(),
                metadata,
            )
            .await?;
        Ok(page.items)
    }

    /// Gets a car, treating a soft-deleted one as missing
    async fn get_live_car(
        &self,
        id: CarId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Car, PortError> {
        let car = self.get_car(id, metadata).await?;
        if car.is_deleted() {
            return Err(PortError::not_found("Car", id));
        }
        Ok(car)
    }

    /// Gets an expense, treating a soft-deleted one as missing
    async fn get_live_expense(
        &self,
        id: CarExpenseId,
        metadata: Option<OperationMetadata>,
    ) -> Result<CarExpense, PortError> {
        let expense = self.get_expense(id, metadata).await?;
        if expense.is_deleted() {
            return Err(PortError::not_found("CarExpense", id));
        }
        Ok(expense)
    }
}

impl<T: InventoryPort + ?Sized> InventoryPortExt for T {}

pub(crate) fn single<T>(rows: Vec<T>, entity: &str) -> Result<T, PortError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| PortError::internal(format!("commit returned no {entity}")))
}

/// In-memory implementation of InventoryPort
#[cfg(any(test, feature = "memory"))]
pub mod memory {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use tracing::debug;

    use core_kernel::VersionedTable;

    #[derive(Debug, Default)]
    struct InventoryTables {
        cars: VersionedTable<Car>,
        expenses: VersionedTable<CarExpense>,
    }

    /// In-memory inventory store
    #[derive(Debug, Default, Clone)]
    pub struct InMemoryInventoryPort {
        tables: Arc<RwLock<InventoryTables>>,
    }

    impl InMemoryInventoryPort {
        pub fn new() -> Self {
            Self::default()
        }

        /// Loads rows as they are, bypassing version checks and entity rules
        ///
        /// Untrusted rows belong behind a validating loader such as the
        /// CLI snapshot loader.
        pub async fn seed(&self, cars: Vec<Car>, expenses: Vec<CarExpense>) {
            let mut tables = self.tables.write().await;
            for car in cars {
                tables.cars.seed(car);
            }
            for expense in expenses {
                tables.expenses.seed(expense);
            }
        }

        /// Copies every stored row, soft-deleted ones included
        pub async fn dump(&self) -> (Vec<Car>, Vec<CarExpense>) {
            let tables = self.tables.read().await;
            (
                tables.cars.values().cloned().collect(),
                tables.expenses.values().cloned().collect(),
            )
        }
    }

    impl DomainPort for InMemoryInventoryPort {}

    #[async_trait]
    impl InventoryPort for InMemoryInventoryPort {
        async fn get_car(
            &self,
            id: CarId,
            _metadata: Option<OperationMetadata>,
        ) -> Result<Car, PortError> {
            self.tables
                .read()
                .await
                .cars
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Car", id))
        }

        async fn list_cars(
            &self,
            query: CarQuery,
            page: PageRequest,
            _metadata: Option<OperationMetadata>,
        ) -> Result<Page<Car>, PortError> {
            let tables = self.tables.read().await;
            let mut results: Vec<Car> = tables
                .cars
                .values()
                .filter(|c| query.include_deleted || !c.is_deleted())
                .filter(|c| query.car_model_id.map_or(true, |id| c.car_model_id == id))
                .filter(|c| query.status.map_or(true, |s| c.status == s))
                .cloned()
                .collect();

            results.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

            Ok(Page::paginate(results, page))
        }

        async fn get_expense(
            &self,
            id: CarExpenseId,
            _metadata: Option<OperationMetadata>,
        ) -> Result<CarExpense, PortError> {
            self.tables
                .read()
                .await
                .expenses
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("CarExpense", id))
        }

        async fn list_expenses(
            &self,
            query: ExpenseQuery,
            page: PageRequest,
            _metadata: Option<OperationMetadata>,
        ) -> Result<Page<CarExpense>, PortError> {
            let tables = self.tables.read().await;
            let mut results: Vec<CarExpense> = tables
                .expenses
                .values()
                .filter(|e| query.include_deleted || !e.is_deleted())
                .filter(|e| query.car_id.map_or(true, |id| e.car_id == id))
                .filter(|e| query.date_from.map_or(true, |d| e.expense_date >= d))
                .filter(|e| query.date_to.map_or(true, |d| e.expense_date <= d))
                .cloned()
                .collect();

            results.sort_by(|a, b| {
                b.expense_date
                    .cmp(&a.expense_date)
                    .then_with(|| b.id.cmp(&a.id))
            });

            Ok(Page::paginate(results, page))
        }

        async fn commit(
            &self,
            batch: InventoryCommit,
            metadata: Option<OperationMetadata>,
        ) -> Result<InventoryCommit, PortError> {
            let mut tables = self.tables.write().await;

            tables.cars.check_batch(&batch.cars)?;
            tables.expenses.check_batch(&batch.expenses)?;

            debug!(
                cars = batch.cars.len(),
                expenses = batch.expenses.len(),
                correlation_id = ?metadata.and_then(|m| m.correlation_id),
                "committing inventory batch"
            );

            Ok(InventoryCommit {
                cars: tables.cars.write_batch(batch.cars),
                expenses: tables.expenses.write_batch(batch.expenses),
            })
        }
    }
}

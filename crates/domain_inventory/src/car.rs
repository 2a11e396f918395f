//! Cars held in stock

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{CarId, CarModelId, Money, SoftDelete, ValidationError, ValidationKind, Versioned};

/// Sale status of a car
///
/// Set by hand; the ledgers never change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarStatus {
    #[default]
    Available,
    Sold,
}

impl CarStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CarStatus::Available => "Available",
            CarStatus::Sold => "Sold",
        }
    }
}

/// A car in the dealership's stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: CarId,
    pub car_model_id: CarModelId,
    #[serde(default)]
    pub status: CarStatus,
    pub purchase_price: Money,
    /// Cached sum of the car's live expenses
    #[serde(default)]
    pub total_expenses: Money,
    pub purchase_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Car {
    /// Registers an available car with no expenses
    ///
    /// # Errors
    ///
    /// `AmountNegative` if the purchase price is below zero
    pub fn new(car_model_id: CarModelId, purchase_price: Money) -> Result<Self, ValidationError> {
        let now = Utc::now();
        let car = Self {
            id: CarId::new_v7(),
            car_model_id,
            status: CarStatus::Available,
            purchase_price,
            total_expenses: Money::ZERO,
            purchase_date: None,
            notes: None,
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        car.validate()?;
        Ok(car)
    }

    /// Checks the purchase price is not negative
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.purchase_price.is_negative() {
            return Err(ValidationError::new(
                ValidationKind::AmountNegative,
                format!("Purchase price cannot be negative, got {}", self.purchase_price),
            ));
        }
        Ok(())
    }

    pub fn with_purchase_date(mut self, date: Option<NaiveDate>) -> Self {
        self.purchase_date = date;
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Purchase price plus everything spent on the car since
    /// Purchase price plus cached expenses, clamped to the `Money` range
    pub fn total_cost(&self) -> Money {
        self.purchase_price.saturating_add(self.total_expenses)
    }

    pub fn is_sold(&self) -> bool {
        self.status == CarStatus::Sold
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Versioned for Car {
    type Id = CarId;
    const ENTITY: &'static str = "Car";

    fn id(&self) -> CarId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl SoftDelete for Car {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

/// What a car has cost so far
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CarCost {
    pub car_id: CarId,
    pub purchase_price: Money,
    pub total_expenses: Money,
    pub total_cost: Money,
}

impl From<&Car> for CarCost {
    fn from(car: &Car) -> Self {
        Self {
            car_id: car.id,
            purchase_price: car.purchase_price,
            total_expenses: car.total_expenses,
            total_cost: car.total_cost(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_car_is_available() {
        let car = Car::new(CarModelId::new(), Money::from_major(15_000)).unwrap();
        assert_eq!(car.status, CarStatus::Available);
        assert_eq!(car.total_expenses, Money::ZERO);
        assert_eq!(car.total_cost(), Money::from_major(15_000));
    }

    #[test]
    fn test_negative_price_rejected() {
        let err = Car::new(CarModelId::new(), Money::from_major(-1)).unwrap_err();
        assert_eq!(err.kind, ValidationKind::AmountNegative);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_value(CarStatus::Sold).unwrap(), "sold");
    }
}

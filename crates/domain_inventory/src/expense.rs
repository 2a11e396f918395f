//! Money spent on a car after purchase

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{
    require_positive, CarExpenseId, CarId, LedgerEntry, Money, SoftDelete, ValidationError,
    Versioned,
};

/// One expense recorded against a car (repairs, transport, paperwork, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarExpense {
    pub id: CarExpenseId,
    pub car_id: CarId,
    /// Always positive
    pub amount: Money,
    pub description: String,
    pub expense_date: NaiveDate,
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl CarExpense {
    /// # Errors
    ///
    /// `AmountNotPositive` if `amount <= 0`
    pub fn new(
        car_id: CarId,
        amount: Money,
        description: impl Into<String>,
        expense_date: NaiveDate,
    ) -> Result<Self, ValidationError> {
        require_positive("Expense", amount)?;
        let now = Utc::now();

        Ok(Self {
            id: CarExpenseId::new_v7(),
            car_id,
            amount,
            description: description.into(),
            expense_date,
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Checks a stored expense still has a positive amount
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_positive("Expense", self.amount).map(|_| ())
    }

    /// Returns a copy with a new amount
    pub fn with_amount(&self, amount: Money) -> Result<Self, ValidationError> {
        require_positive("Expense", amount)?;
        let mut updated = self.clone();
        updated.amount = amount;
        updated.touch();
        Ok(updated)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Versioned for CarExpense {
    type Id = CarExpenseId;
    const ENTITY: &'static str = "CarExpense";

    fn id(&self) -> CarExpenseId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl SoftDelete for CarExpense {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

impl LedgerEntry for CarExpense {
    fn delta(&self) -> Money {
        self.amount
    }

    fn is_void(&self) -> bool {
        self.is_deleted()
    }
}

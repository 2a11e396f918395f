//! Inventory Domain - Cars and Their Cost
//!
//! Tracks the cars in stock and what has been spent on them after purchase.
//! [`CarCostAccumulator`] keeps each car's cached `total_expenses` equal to
//! the sum of its live [`CarExpense`] records.

pub mod car;
pub mod expense;
pub mod cost;
pub mod ports;
pub mod services;
pub mod error;

pub use car::{Car, CarCost, CarStatus};
pub use expense::CarExpense;
pub use cost::CarCostAccumulator;
pub use ports::{CarQuery, ExpenseQuery, InventoryCommit, InventoryPort, InventoryPortExt};
pub use services::{ExpenseEdit, ExpenseOutcome, InventoryService, NewCar, NewExpense};
pub use error::InventoryError;

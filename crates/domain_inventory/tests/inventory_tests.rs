//! Comprehensive tests for domain_inventory

use std::sync::Arc;

use core_kernel::{CarId, Money, PageRequest, SoftDelete, ValidationKind};

use domain_inventory::car::{Car, CarStatus};
use domain_inventory::cost::CarCostAccumulator;
use domain_inventory::expense::CarExpense;
use domain_inventory::ports::memory::InMemoryInventoryPort;
use domain_inventory::ports::{CarQuery, InventoryPort};
use domain_inventory::services::{ExpenseEdit, InventoryService, NewCar, NewExpense};
use domain_inventory::InventoryError;

use test_utils::{assert_money_eq, DateFixtures, IdFixtures, MoneyFixtures};

fn stock_car() -> Car {
    Car::new(IdFixtures::car_model_id(), MoneyFixtures::purchase_price()).unwrap()
}

fn expense_on(car: &Car, amount: Money) -> CarExpense {
    CarExpense::new(car.id, amount, "Work", DateFixtures::expense_date()).unwrap()
}

// ============================================================================
// Accumulator Tests
// ============================================================================

mod accumulator_tests {
    use super::*;

    #[test]
    fn test_expense_scenario() {
        let mut car = stock_car();
        let expenses = vec![
            expense_on(&car, Money::from_major(50)),
            expense_on(&car, Money::from_major(30)),
            expense_on(&car, MoneyFixtures::expense_20_50()),
        ];
        for expense in &expenses {
            CarCostAccumulator::apply_expense(&mut car, expense).unwrap();
        }
        assert_money_eq(car.total_expenses, Money::from_cents(10_050));

        CarCostAccumulator::retract_expense(&mut car, &expenses[1]).unwrap();
        assert_money_eq(car.total_expenses, Money::from_cents(7050));
    }

    #[test]
    fn test_foreign_expense_rejected() {
        let mut car = stock_car();
        let other = stock_car();
        let err = CarCostAccumulator::apply_expense(&mut car, &expense_on(&other, Money::from_major(5)))
            .unwrap_err();
        assert!(matches!(err, InventoryError::InvalidOperation(_)));
        assert_eq!(car.total_expenses, Money::ZERO);
    }

    #[test]
    fn test_total_cost_adds_price() {
        let mut car = stock_car();
        let expense = expense_on(&car, Money::from_major(500));
        CarCostAccumulator::apply_expense(&mut car, &expense).unwrap();

        assert_money_eq(car.total_cost(), Money::from_major(15_500));
        assert_money_eq(CarCostAccumulator::total_cost(&car, &[expense]).unwrap(), Money::from_major(15_500));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use test_utils::positive_cents_strategy;

    proptest! {
        #[test]
        fn total_is_order_independent(amounts in proptest::collection::vec(positive_cents_strategy(), 0..20)) {
            let mut forward = stock_car();
            let expenses: Vec<CarExpense> = amounts.iter().map(|a| expense_on(&forward, *a)).collect();
            for expense in &expenses {
                CarCostAccumulator::apply_expense(&mut forward, expense).unwrap();
            }

            let mut backward = forward.clone();
            backward.total_expenses = Money::ZERO;
            for expense in expenses.iter().rev() {
                CarCostAccumulator::apply_expense(&mut backward, expense).unwrap();
            }

            prop_assert_eq!(forward.total_expenses, backward.total_expenses);
            prop_assert_eq!(CarCostAccumulator::recompute(forward.id, &expenses).unwrap(), forward.total_expenses);
        }

        #[test]
        fn apply_then_retract_is_identity(amount in positive_cents_strategy()) {
            let mut car = stock_car();
            let before = car.total_expenses;
            let expense = expense_on(&car, amount);

            CarCostAccumulator::apply_expense(&mut car, &expense).unwrap();
            CarCostAccumulator::retract_expense(&mut car, &expense).unwrap();
            prop_assert_eq!(car.total_expenses, before);
        }
    }
}

// ============================================================================
// Service Tests
// ============================================================================

mod service_tests {
    use super::*;

    struct Harness {
        port: Arc<InMemoryInventoryPort>,
        inventory: InventoryService,
    }

    impl Harness {
        fn new() -> Self {
            let port = Arc::new(InMemoryInventoryPort::new());
            let dyn_port: Arc<dyn InventoryPort> = port.clone();
            Self {
                inventory: InventoryService::new(dyn_port),
                port,
            }
        }

        async fn car(&self) -> Car {
            self.inventory
                .register_car(
                    NewCar {
                        car_model_id: Some(IdFixtures::car_model_id()),
                        purchase_price: MoneyFixtures::purchase_price(),
                        ..Default::default()
                    },
                    None,
                )
                .await
                .unwrap()
        }

        fn expense(&self, car: &Car, amount: Money) -> NewExpense {
            NewExpense {
                car_id: Some(car.id),
                amount,
                description: "Service".to_string(),
                expense_date: Some(DateFixtures::expense_date()),
            }
        }
    }

    #[tokio::test]
    async fn test_expense_lifecycle() {
        let harness = Harness::new();
        let car = harness.car().await;

        let mut recorded = Vec::new();
        for amount in [Money::from_major(50), Money::from_major(30), MoneyFixtures::expense_20_50()] {
            recorded.push(
                harness
                    .inventory
                    .record_expense(harness.expense(&car, amount), None)
                    .await
                    .unwrap(),
            );
        }
        assert_money_eq(recorded[2].cost.total_expenses, Money::from_cents(10_050));

        let deleted = harness
            .inventory
            .delete_expense(recorded[1].expense.id, None)
            .await
            .unwrap();
        assert_money_eq(deleted.cost.total_expenses, Money::from_cents(7050));
        assert_money_eq(deleted.cost.total_cost, Money::from_cents(1_507_050));

        let restored = harness
            .inventory
            .restore_expense(recorded[1].expense.id, None)
            .await
            .unwrap();
        assert_money_eq(restored.cost.total_expenses, Money::from_cents(10_050));
        assert!(harness.inventory.car_drift(car.id, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_edit_expense_replaces_amount() {
        let harness = Harness::new();
        let car = harness.car().await;
        let outcome = harness
            .inventory
            .record_expense(harness.expense(&car, Money::from_major(50)), None)
            .await
            .unwrap();

        let edited = harness
            .inventory
            .edit_expense(
                outcome.expense.id,
                ExpenseEdit {
                    amount: Money::from_major(65),
                    description: Some("Brakes".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_money_eq(edited.cost.total_expenses, Money::from_major(65));
        assert_eq!(edited.expense.description, "Brakes");
    }

    #[tokio::test]
    async fn test_invalid_expense_writes_nothing() {
        let harness = Harness::new();
        let car = harness.car().await;

        let err = harness
            .inventory
            .record_expense(harness.expense(&car, Money::from_major(-3)), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ValidationKind::AmountNotPositive));

        let (cars, expenses) = harness.port.dump().await;
        assert!(expenses.is_empty());
        assert_eq!(cars[0].total_expenses, Money::ZERO);
    }

    #[tokio::test]
    async fn test_expense_for_unknown_car() {
        let harness = Harness::new();
        let err = harness
            .inventory
            .record_expense(
                NewExpense {
                    car_id: Some(CarId::new()),
                    amount: Money::from_major(10),
                    description: "Wash".to_string(),
                    expense_date: Some(DateFixtures::expense_date()),
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_car_with_expenses_cannot_be_deleted() {
        let harness = Harness::new();
        let car = harness.car().await;
        let outcome = harness
            .inventory
            .record_expense(harness.expense(&car, Money::from_major(10)), None)
            .await
            .unwrap();

        let err = harness.inventory.delete_car(car.id, None).await.unwrap_err();
        assert!(matches!(err, InventoryError::HasDependents { count: 1, .. }));

        harness.inventory.delete_expense(outcome.expense.id, None).await.unwrap();
        let deleted = harness.inventory.delete_car(car.id, None).await.unwrap();
        assert!(deleted.is_deleted());

        let restored = harness.inventory.restore_car(car.id, None).await.unwrap();
        assert!(!restored.is_deleted());
    }

    #[tokio::test]
    async fn test_status_does_not_touch_costs() {
        let harness = Harness::new();
        let car = harness.car().await;
        harness
            .inventory
            .record_expense(harness.expense(&car, Money::from_major(40)), None)
            .await
            .unwrap();

        let sold = harness.inventory.set_status(car.id, CarStatus::Sold, None).await.unwrap();
        assert!(sold.is_sold());
        assert_money_eq(sold.total_expenses, Money::from_major(40));

        let listed = harness
            .inventory
            .list_cars(CarQuery::default().with_status(CarStatus::Sold), PageRequest::default(), None)
            .await
            .unwrap();
        assert_eq!(listed.total, 1);
    }

    #[tokio::test]
    async fn test_repair_restores_expense_total() {
        let harness = Harness::new();
        let mut car = stock_car();
        let expense = expense_on(&car, Money::from_major(25));
        car.total_expenses = Money::from_major(90);
        harness.port.seed(vec![car.clone()], vec![expense]).await;

        assert!(harness.inventory.car_drift(car.id, None).await.unwrap().is_some());
        let repaired = harness.inventory.repair_car_expenses(car.id, None).await.unwrap();
        assert_money_eq(repaired.total_expenses, Money::from_major(25));

        let cost = harness.inventory.total_cost(car.id, None).await.unwrap();
        assert_money_eq(cost.total_cost, Money::from_major(15_025));
    }

    #[tokio::test]
    async fn test_car_model_required() {
        let harness = Harness::new();
        let err = harness
            .inventory
            .register_car(NewCar::default(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ValidationKind::RequiredFieldMissing));
    }
}

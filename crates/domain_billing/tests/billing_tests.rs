//! Comprehensive tests for domain_billing

use std::sync::Arc;

use chrono::Utc;

use core_kernel::{CarId, Money, SoftDelete, ValidationKind};

use domain_billing::client::{Client, ClientLedger};
use domain_billing::invoice::{Invoice, InvoiceLedger, InvoiceStatus};
use domain_billing::payment::{Payment, PaymentRegister};
use domain_billing::ports::memory::InMemoryBillingPort;
use domain_billing::ports::{BillingPort, InvoiceQuery};
use domain_billing::services::{
    InvoiceEdit, InvoiceService, NewInvoice, NewPayment, PaymentEdit, PaymentService,
};
use domain_billing::BillingError;

use test_utils::{
    assert_err, assert_money_eq, assert_money_zero, assert_ok, DateFixtures, MoneyFixtures,
};

fn invoice_for(client: &Client, amount: Money) -> Invoice {
    Invoice::new(client.id, CarId::new(), amount, DateFixtures::invoice_date()).unwrap()
}

fn payment_on(invoice: &Invoice, amount: Money) -> Payment {
    Payment::new(invoice.id, amount, DateFixtures::payment_date()).unwrap()
}

// ============================================================================
// Invoice Ledger Tests
// ============================================================================

mod invoice_ledger_tests {
    use super::*;

    #[test]
    fn test_total_paid_sums_exactly() {
        let client = Client::new("Test");
        let invoice = invoice_for(&client, MoneyFixtures::invoice_100());
        let payments: Vec<Payment> = (0..10)
            .map(|_| payment_on(&invoice, Money::from_cents(10)))
            .collect();

        assert_money_eq(InvoiceLedger::total_paid(&payments), Money::from_major(1));
    }

    #[test]
    fn test_total_paid_is_idempotent() {
        let client = Client::new("Test");
        let invoice = invoice_for(&client, MoneyFixtures::invoice_100());
        let payments = vec![
            payment_on(&invoice, MoneyFixtures::one_third_of_100()),
            payment_on(&invoice, MoneyFixtures::expense_20_50()),
        ];

        let first = InvoiceLedger::total_paid(&payments);
        let second = InvoiceLedger::total_paid(&payments);
        assert_eq!(first, second);
    }

    #[test]
    fn test_remaining_within_epsilon_snaps_to_zero() {
        let client = Client::new("Test");
        let invoice = invoice_for(&client, MoneyFixtures::invoice_100());
        let payments = vec![payment_on(&invoice, Money::from_units(999_950))];

        let summary = InvoiceLedger::summarize(&invoice, &payments);
        assert_money_zero(summary.remaining);
        assert_eq!(summary.remaining, Money::ZERO);
        assert_eq!(summary.status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_remaining_of_one_cent_is_not_paid() {
        let client = Client::new("Test");
        let invoice = invoice_for(&client, MoneyFixtures::invoice_100());
        let payments = vec![payment_on(&invoice, Money::from_cents(9999))];

        let summary = InvoiceLedger::summarize(&invoice, &payments);
        assert_money_eq(summary.remaining, Money::from_cents(1));
        assert_eq!(summary.status, InvoiceStatus::Partial);
    }

    #[test]
    fn test_status_moves_back_when_payment_removed() {
        let client = Client::new("Test");
        let invoice = invoice_for(&client, MoneyFixtures::invoice_100());
        let first = payment_on(&invoice, MoneyFixtures::payment_60());
        let second = payment_on(&invoice, MoneyFixtures::payment_40());
        let mut payments = vec![first.clone(), second.clone()];
        assert_eq!(InvoiceLedger::status(&invoice, &payments), InvoiceStatus::Paid);

        PaymentRegister::retract(&mut payments, second.id);
        assert_eq!(InvoiceLedger::status(&invoice, &payments), InvoiceStatus::Partial);

        PaymentRegister::retract(&mut payments, first.id);
        assert_eq!(InvoiceLedger::status(&invoice, &payments), InvoiceStatus::Unpaid);
    }
}

// ============================================================================
// Payment Register Tests
// ============================================================================

mod payment_register_tests {
    use super::*;

    #[test]
    fn test_overpayment_rejected() {
        let client = Client::new("Test");
        let invoice = invoice_for(&client, MoneyFixtures::invoice_100());
        let payments = vec![payment_on(&invoice, MoneyFixtures::payment_60())];

        let err = assert_err!(PaymentRegister::validate_new_payment(
            &invoice,
            &payments,
            MoneyFixtures::payment_45()
        ));
        assert_eq!(err.kind, ValidationKind::ExceedsRemainingBalance);
    }

    #[test]
    fn test_paying_the_remainder_settles() {
        let client = Client::new("Test");
        let invoice = invoice_for(&client, MoneyFixtures::invoice_100());
        let mut payments = vec![payment_on(&invoice, MoneyFixtures::payment_60())];

        assert_ok!(PaymentRegister::validate_new_payment(
            &invoice,
            &payments,
            MoneyFixtures::payment_40()
        ));
        PaymentRegister::apply(&mut payments, payment_on(&invoice, MoneyFixtures::payment_40()));

        let summary = InvoiceLedger::summarize(&invoice, &payments);
        assert_eq!(summary.status, InvoiceStatus::Paid);
        assert_money_eq(summary.remaining, Money::ZERO);
    }

    #[test]
    fn test_edit_may_use_own_contribution() {
        let client = Client::new("Test");
        let invoice = invoice_for(&client, MoneyFixtures::invoice_100());
        let existing = payment_on(&invoice, MoneyFixtures::payment_60());
        let mut payments = vec![existing.clone()];

        assert_ok!(PaymentRegister::validate_updated_payment(
            &invoice,
            &payments,
            &existing,
            MoneyFixtures::invoice_100()
        ));

        let mut edited = existing.clone();
        edited.amount = MoneyFixtures::invoice_100();
        PaymentRegister::replace(&mut payments, edited);

        assert_eq!(InvoiceLedger::status(&invoice, &payments), InvoiceStatus::Paid);
    }

    #[test]
    fn test_edit_cannot_exceed_headroom() {
        let client = Client::new("Test");
        let invoice = invoice_for(&client, MoneyFixtures::invoice_100());
        let first = payment_on(&invoice, MoneyFixtures::payment_60());
        let second = payment_on(&invoice, Money::from_major(30));
        let payments = vec![first, second.clone()];

        let err = assert_err!(PaymentRegister::validate_updated_payment(
            &invoice,
            &payments,
            &second,
            Money::from_cents(4001)
        ));
        assert_eq!(err.kind, ValidationKind::ExceedsRemainingBalance);
    }

    #[test]
    fn test_negative_payment_rejected() {
        let client = Client::new("Test");
        let invoice = invoice_for(&client, MoneyFixtures::invoice_100());

        let err = assert_err!(PaymentRegister::validate_new_payment(
            &invoice,
            &[],
            Money::from_major(-5)
        ));
        assert_eq!(err.kind, ValidationKind::AmountNotPositive);
    }

    #[test]
    fn test_deleted_payment_frees_headroom() {
        let client = Client::new("Test");
        let invoice = invoice_for(&client, MoneyFixtures::invoice_100());
        let mut cancelled = payment_on(&invoice, MoneyFixtures::invoice_100());
        cancelled.mark_deleted(Utc::now());

        assert_ok!(PaymentRegister::validate_new_payment(
            &invoice,
            &[cancelled],
            MoneyFixtures::invoice_100()
        ));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use test_utils::{invoice_amount_strategy, payment_plan_strategy, positive_money_strategy};

    proptest! {
        #[test]
        fn remaining_is_never_negative(
            amount in invoice_amount_strategy(),
            paid in proptest::collection::vec(positive_money_strategy(), 0..6),
        ) {
            let client = Client::new("Prop");
            let invoice = invoice_for(&client, amount);
            let payments: Vec<Payment> = paid.into_iter().map(|p| payment_on(&invoice, p)).collect();

            prop_assert!(!InvoiceLedger::remaining_balance(&invoice, &payments).is_negative());
        }

        #[test]
        fn paid_iff_remaining_below_epsilon(
            amount in invoice_amount_strategy(),
            paid in proptest::collection::vec(positive_money_strategy(), 0..6),
        ) {
            let client = Client::new("Prop");
            let invoice = invoice_for(&client, amount);
            let payments: Vec<Payment> = paid.into_iter().map(|p| payment_on(&invoice, p)).collect();

            let remaining = InvoiceLedger::remaining_balance(&invoice, &payments);
            let status = InvoiceLedger::status(&invoice, &payments);
            prop_assert_eq!(status == InvoiceStatus::Paid, remaining.is_zero());
        }

        #[test]
        fn apply_then_retract_restores_state(
            (amount, plan) in payment_plan_strategy(),
            index in any::<prop::sample::Index>(),
        ) {
            let client = Client::new("Prop");
            let invoice = invoice_for(&client, amount);
            let mut payments: Vec<Payment> = plan.iter().map(|p| payment_on(&invoice, *p)).collect();
            let candidate = payments.remove(index.index(payments.len()));

            let before = InvoiceLedger::summarize(&invoice, &payments);
            PaymentRegister::apply(&mut payments, candidate.clone());
            PaymentRegister::retract(&mut payments, candidate.id);
            let after = InvoiceLedger::summarize(&invoice, &payments);

            prop_assert_eq!(before, after);
        }

        #[test]
        fn planned_payments_always_validate((amount, plan) in payment_plan_strategy()) {
            let client = Client::new("Prop");
            let invoice = invoice_for(&client, amount);
            let mut payments = Vec::new();

            for amount in plan {
                prop_assert!(PaymentRegister::validate_new_payment(&invoice, &payments, amount).is_ok());
                PaymentRegister::apply(&mut payments, payment_on(&invoice, amount));
            }
            prop_assert!(InvoiceLedger::total_paid(&payments) <= invoice.amount);
        }

        #[test]
        fn client_recompute_matches_incremental((amount, plan) in payment_plan_strategy()) {
            let mut client = Client::new("Prop");
            let invoice = invoice_for(&client, amount);
            ClientLedger::apply_invoice(&mut client, invoice.amount).unwrap();

            let payments: Vec<Payment> = plan.iter().map(|p| payment_on(&invoice, *p)).collect();
            for payment in &payments {
                ClientLedger::apply_payment(&mut client, payment.amount).unwrap();
            }

            let recomputed = ClientLedger::recompute(client.id, std::slice::from_ref(&invoice), &payments).unwrap();
            prop_assert_eq!(recomputed, client.balance);
        }
    }
}

// ============================================================================
// Service Tests
// ============================================================================

mod service_tests {
    use super::*;

    struct Harness {
        port: Arc<InMemoryBillingPort>,
        invoices: InvoiceService,
        payments: PaymentService,
    }

    impl Harness {
        fn new() -> Self {
            let port = Arc::new(InMemoryBillingPort::new());
            let dyn_port: Arc<dyn BillingPort> = port.clone();
            Self {
                invoices: InvoiceService::new(dyn_port.clone()),
                payments: PaymentService::new(dyn_port),
                port,
            }
        }

        async fn invoice(&self, amount: Money) -> (Client, Invoice) {
            let client = self
                .invoices
                .create_client("Yasmin".to_string(), None, None)
                .await
                .unwrap();
            let invoice = self
                .invoices
                .create_invoice(
                    NewInvoice {
                        client_id: Some(client.id),
                        car_id: Some(CarId::new()),
                        amount,
                        invoice_date: Some(DateFixtures::invoice_date()),
                        ..Default::default()
                    },
                    None,
                )
                .await
                .unwrap();
            (client, invoice)
        }

        fn payment(&self, invoice: &Invoice, amount: Money) -> NewPayment {
            NewPayment {
                invoice_id: Some(invoice.id),
                amount,
                payment_date: Some(DateFixtures::payment_date()),
                notes: None,
            }
        }
    }

    #[tokio::test]
    async fn test_create_invoice_charges_client() {
        let harness = Harness::new();
        let (client, _) = harness.invoice(MoneyFixtures::invoice_100()).await;

        let balance = harness.invoices.client_balance(client.id, None).await.unwrap();
        assert_money_eq(balance, Money::from_major(-100));
    }

    #[tokio::test]
    async fn test_partial_then_full_payment() {
        let harness = Harness::new();
        let (client, invoice) = harness.invoice(MoneyFixtures::invoice_100()).await;

        let outcome = harness
            .payments
            .record_payment(harness.payment(&invoice, MoneyFixtures::payment_60()), None)
            .await
            .unwrap();
        assert_eq!(outcome.summary.status, InvoiceStatus::Partial);
        assert_money_eq(outcome.summary.remaining, MoneyFixtures::payment_40());
        assert_money_eq(outcome.client_balance, Money::from_major(-40));

        let err = harness
            .payments
            .record_payment(harness.payment(&invoice, MoneyFixtures::payment_45()), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ValidationKind::ExceedsRemainingBalance));

        let outcome = harness
            .payments
            .record_payment(harness.payment(&invoice, MoneyFixtures::payment_40()), None)
            .await
            .unwrap();
        assert_eq!(outcome.summary.status, InvoiceStatus::Paid);
        assert_money_zero(outcome.client_balance);

        let balance = harness.invoices.client_balance(client.id, None).await.unwrap();
        assert_money_eq(balance, Money::ZERO);
    }

    #[tokio::test]
    async fn test_rejected_payment_writes_nothing() {
        let harness = Harness::new();
        let (client, invoice) = harness.invoice(MoneyFixtures::invoice_100()).await;

        let result = harness
            .payments
            .record_payment(harness.payment(&invoice, Money::from_major(101)), None)
            .await;
        assert!(result.is_err());

        let (_, _, payments) = harness.port.dump().await;
        assert!(payments.is_empty());
        let balance = harness.invoices.client_balance(client.id, None).await.unwrap();
        assert_money_eq(balance, Money::from_major(-100));
    }

    #[tokio::test]
    async fn test_edit_payment_in_place() {
        let harness = Harness::new();
        let (client, invoice) = harness.invoice(MoneyFixtures::invoice_100()).await;
        let recorded = harness
            .payments
            .record_payment(harness.payment(&invoice, MoneyFixtures::payment_60()), None)
            .await
            .unwrap();

        let outcome = harness
            .payments
            .edit_payment(
                recorded.payment.id,
                PaymentEdit {
                    amount: MoneyFixtures::invoice_100(),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome.summary.status, InvoiceStatus::Paid);
        assert_eq!(outcome.payment.version, 2);
        let balance = harness.invoices.client_balance(client.id, None).await.unwrap();
        assert_money_eq(balance, Money::ZERO);
    }

    #[tokio::test]
    async fn test_delete_and_restore_payment() {
        let harness = Harness::new();
        let (client, invoice) = harness.invoice(MoneyFixtures::invoice_100()).await;
        let recorded = harness
            .payments
            .record_payment(harness.payment(&invoice, MoneyFixtures::payment_60()), None)
            .await
            .unwrap();

        let deleted = harness
            .payments
            .delete_payment(recorded.payment.id, None)
            .await
            .unwrap();
        assert!(deleted.payment.is_deleted());
        assert_eq!(deleted.summary.status, InvoiceStatus::Unpaid);
        assert_money_eq(deleted.client_balance, Money::from_major(-100));

        let restored = harness
            .payments
            .restore_payment(recorded.payment.id, None)
            .await
            .unwrap();
        assert!(!restored.payment.is_deleted());
        assert_eq!(restored.summary.status, InvoiceStatus::Partial);

        let drift = harness.invoices.client_drift(client.id, None).await.unwrap();
        assert!(drift.is_none());
    }

    #[tokio::test]
    async fn test_restore_rejected_when_it_would_overpay() {
        let harness = Harness::new();
        let (_, invoice) = harness.invoice(MoneyFixtures::invoice_100()).await;
        let first = harness
            .payments
            .record_payment(harness.payment(&invoice, MoneyFixtures::payment_60()), None)
            .await
            .unwrap();
        harness.payments.delete_payment(first.payment.id, None).await.unwrap();
        harness
            .payments
            .record_payment(harness.payment(&invoice, MoneyFixtures::payment_60()), None)
            .await
            .unwrap();

        let err = harness
            .payments
            .restore_payment(first.payment.id, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ValidationKind::ExceedsRemainingBalance));
    }

    #[tokio::test]
    async fn test_payment_requires_invoice() {
        let harness = Harness::new();
        let err = harness
            .payments
            .record_payment(
                NewPayment {
                    amount: Money::from_major(10),
                    payment_date: Some(DateFixtures::payment_date()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ValidationKind::RequiredFieldMissing));
    }

    #[tokio::test]
    async fn test_payment_on_missing_invoice_is_not_found() {
        let harness = Harness::new();
        let err = harness
            .payments
            .record_payment(
                NewPayment {
                    invoice_id: Some(core_kernel::InvoiceId::new()),
                    amount: Money::from_major(10),
                    payment_date: Some(DateFixtures::payment_date()),
                    notes: None,
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_invoice_forbidden_with_payments() {
        let harness = Harness::new();
        let (client, invoice) = harness.invoice(MoneyFixtures::invoice_100()).await;
        let recorded = harness
            .payments
            .record_payment(harness.payment(&invoice, MoneyFixtures::payment_60()), None)
            .await
            .unwrap();

        let err = harness.invoices.delete_invoice(invoice.id, None).await.unwrap_err();
        assert!(matches!(err, BillingError::HasDependents { count: 1, .. }));

        harness.payments.delete_payment(recorded.payment.id, None).await.unwrap();
        let deleted = harness.invoices.delete_invoice(invoice.id, None).await.unwrap();
        assert!(deleted.is_deleted());

        let balance = harness.invoices.client_balance(client.id, None).await.unwrap();
        assert_money_zero(balance);

        let restored = harness.invoices.restore_invoice(invoice.id, None).await.unwrap();
        assert!(!restored.is_deleted());
        let balance = harness.invoices.client_balance(client.id, None).await.unwrap();
        assert_money_eq(balance, Money::from_major(-100));
    }

    #[tokio::test]
    async fn test_edit_invoice_below_paid_rejected() {
        let harness = Harness::new();
        let (client, invoice) = harness.invoice(MoneyFixtures::invoice_100()).await;
        harness
            .payments
            .record_payment(harness.payment(&invoice, MoneyFixtures::payment_60()), None)
            .await
            .unwrap();

        let err = harness
            .invoices
            .edit_invoice(
                invoice.id,
                InvoiceEdit {
                    amount: Money::from_major(50),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ValidationKind::AmountBelowPaid));

        let change = harness
            .invoices
            .edit_invoice(
                invoice.id,
                InvoiceEdit {
                    amount: Money::from_major(80),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_money_eq(change.previous.amount, MoneyFixtures::invoice_100());
        assert_money_eq(change.client_balance, Money::from_major(-20));

        let drift = harness.invoices.client_drift(client.id, None).await.unwrap();
        assert!(drift.is_none());
    }

    #[tokio::test]
    async fn test_list_invoices_carries_summary() {
        let harness = Harness::new();
        let (client, invoice) = harness.invoice(MoneyFixtures::invoice_100()).await;
        harness
            .payments
            .record_payment(harness.payment(&invoice, MoneyFixtures::payment_60()), None)
            .await
            .unwrap();

        let page = harness
            .invoices
            .list_invoices(
                InvoiceQuery::for_client(client.id),
                core_kernel::PageRequest::default(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].summary.status, InvoiceStatus::Partial);
        assert_money_eq(page.items[0].summary.paid, MoneyFixtures::payment_60());
    }

    #[tokio::test]
    async fn test_repair_client_drift() {
        let harness = Harness::new();
        let (client, _) = harness.invoice(MoneyFixtures::invoice_100()).await;

        let mut broken = harness.port.get_client(client.id, None).await.unwrap();
        broken.balance = Money::from_major(7);
        harness.port.seed(vec![broken], vec![], vec![]).await;

        let drift = harness.invoices.client_drift(client.id, None).await.unwrap().unwrap();
        assert_money_eq(drift.difference, Money::from_major(107));

        let repaired = harness.invoices.repair_client_balance(client.id, None).await.unwrap();
        assert_money_eq(repaired.balance, Money::from_major(-100));
        assert!(harness.invoices.client_drift(client.id, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overpaid_invoices_flagged() {
        let harness = Harness::new();
        let (client, invoice) = harness.invoice(MoneyFixtures::invoice_100()).await;
        let legacy = payment_on(&invoice, Money::from_major(130));
        harness.port.seed(vec![], vec![], vec![legacy]).await;

        let overpaid = harness.invoices.overpaid_invoices(None).await.unwrap();
        assert_eq!(overpaid.len(), 1);
        assert_eq!(overpaid[0].client_id, client.id);
        assert_money_eq(overpaid[0].excess, Money::from_major(30));
    }

    #[tokio::test]
    async fn test_blank_client_name_rejected() {
        let harness = Harness::new();
        let err = harness
            .invoices
            .create_client("   ".to_string(), None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ValidationKind::RequiredFieldMissing));
    }
}

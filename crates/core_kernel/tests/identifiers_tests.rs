//! Unit tests for the Identifiers module

use core_kernel::{
    ClientId, InvoiceId, PaymentId, AccountId, AccountEntryId,
    CarId, CarModelId, CarExpenseId,
};
use uuid::Uuid;

mod invoice_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        assert_ne!(InvoiceId::new(), InvoiceId::new());
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = InvoiceId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = InvoiceId::new_v7();
        assert!(id1 < id2);
    }

    #[test]
    fn test_from_str_rejects_invalid() {
        assert!("INV-not-a-uuid".parse::<InvoiceId>().is_err());
    }

    #[test]
    fn test_serde_is_transparent() {
        let uuid = Uuid::new_v4();
        let id = InvoiceId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }
}

#[test]
fn test_prefixes_are_distinct() {
    let prefixes = [
        ClientId::prefix(),
        InvoiceId::prefix(),
        PaymentId::prefix(),
        AccountId::prefix(),
        AccountEntryId::prefix(),
        CarId::prefix(),
        CarModelId::prefix(),
        CarExpenseId::prefix(),
    ];
    let unique: std::collections::HashSet<_> = prefixes.iter().collect();
    assert_eq!(unique.len(), prefixes.len());
}

#[test]
fn test_display_uses_prefix() {
    assert!(CarExpenseId::new().to_string().starts_with("EXP-"));
    assert!(AccountEntryId::new().to_string().starts_with("ENT-"));
}

//! Billing Domain - Invoices, Payments and Client Balances
//!
//! This crate keeps three things consistent as payments are recorded, edited
//! and deleted:
//!
//! - an invoice's paid amount, remaining balance and status, always derived
//!   from its live payments ([`InvoiceLedger`])
//! - the rule that payments never overpay an invoice ([`PaymentRegister`])
//! - each client's running balance ([`ClientLedger`])
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{InvoiceLedger, PaymentRegister};
//!
//! PaymentRegister::validate_new_payment(&invoice, &payments, amount)?;
//! PaymentRegister::apply(&mut payments, payment);
//!
//! let summary = InvoiceLedger::summarize(&invoice, &payments);
//! ```

pub mod invoice;
pub mod payment;
pub mod client;
pub mod ports;
pub mod services;
pub mod error;

pub use invoice::{Invoice, InvoiceLedger, InvoiceStatus, InvoiceSummary};
pub use payment::{Payment, PaymentRegister};
pub use client::{Client, ClientCharge, ClientLedger};
pub use ports::{
    BillingCommit, BillingPort, BillingPortExt, ClientQuery, InvoiceQuery, PaymentQuery,
};
pub use services::{
    InvoiceChange, InvoiceEdit, InvoiceService, InvoiceView, NewInvoice, NewPayment,
    Overpayment, PaymentEdit, PaymentOutcome, PaymentService,
};
pub use error::BillingError;

//! Domain models for the billing backend.

mod client;
mod invoice;
mod payment;
mod report;
mod sequence;

pub use client::{Client, CreateClient, UpdateClient};
pub use invoice::{
    CreateInvoice, CreateInvoiceItem, Invoice, InvoiceItem, InvoiceStatus, InvoiceWithItems,
    UpdateInvoice,
};
pub use payment::{CreatePayment, Payment, PaymentMethod, PaymentOutcome, PaymentWithInvoice};
pub use report::{
    CashReceived, InvoicedTotals, OutstandingInvoice, OutstandingReport, SalesReport, VatReport,
};
pub use sequence::SequenceKind;

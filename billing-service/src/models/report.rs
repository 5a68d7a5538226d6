//! Read-only reporting views derived from committed invoice and payment rows.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Invoiced sums over issued and paid invoices in a date range.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InvoicedTotals {
    pub subtotal: Decimal,
    pub vat: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CashReceived {
    pub received: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub invoices: InvoicedTotals,
    pub cash: CashReceived,
}

#[derive(Debug, Clone, Serialize)]
pub struct VatReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub vatable_sales: Decimal,
    pub vat_invoiced: Decimal,
}

/// One issued invoice with an unpaid balance as of the report date.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OutstandingInvoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub client_id: Uuid,
    pub client_name: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutstandingReport {
    pub as_of: NaiveDate,
    pub count: usize,
    pub total_due: Decimal,
    pub invoices: Vec<OutstandingInvoice>,
}

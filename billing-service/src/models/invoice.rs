//! Invoice and invoice item models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice lifecycle state. `draft -> issued -> paid`, one way only; `paid`
/// is reached exclusively through payment application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Paid => "paid",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "issued" => InvoiceStatus::Issued,
            "paid" => InvoiceStatus::Paid,
            _ => InvoiceStatus::Draft,
        }
    }
}

/// Invoice row. Money columns are NUMERIC with 2-decimal scale; the
/// invariant `total == round2(subtotal + tax_total)` holds at all times.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub client_id: Uuid,
    pub status: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub currency: String,
    pub notes: Option<String>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn status(&self) -> InvoiceStatus {
        InvoiceStatus::from_string(&self.status)
    }
}

/// Invoice item row, owned by its invoice and cascade-deleted with it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub product_id: Option<Uuid>,
    pub description: String,
    pub qty: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// An invoice together with its items, ordered by sort_order.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceWithItems {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

/// Input for one item of a new invoice or an item replacement set.
#[derive(Debug, Clone)]
pub struct CreateInvoiceItem {
    pub product_id: Option<Uuid>,
    pub description: String,
    pub qty: Decimal,
    pub unit_price: Decimal,
    pub sort_order: Option<i32>,
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub client_id: Uuid,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub tax_rate: Option<Decimal>,
    pub items: Vec<CreateInvoiceItem>,
}

/// Whitelisted draft-only invoice updates. status and invoice_number are
/// deliberately absent; they cannot be set through this path.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoice {
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub tax_rate: Option<Decimal>,
}

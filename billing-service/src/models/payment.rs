//! Payment models.

use crate::models::Invoice;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Cheque,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::Other => "other",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "bank_transfer" => PaymentMethod::BankTransfer,
            "cheque" => PaymentMethod::Cheque,
            "other" => PaymentMethod::Other,
            _ => PaymentMethod::Cash,
        }
    }
}

/// Payment row. Immutable once created; there are no update or delete
/// operations for payments.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub method: String,
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
    pub note: Option<String>,
    pub receipt_number: String,
    pub created_at: DateTime<Utc>,
}

/// Payment row joined with its invoice number, for the global listing.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentWithInvoice {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub method: String,
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
    pub note: Option<String>,
    pub receipt_number: String,
    pub created_at: DateTime<Utc>,
}

/// Input for applying a payment to an issued invoice.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub method: Option<PaymentMethod>,
    pub amount: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

/// Result of a successful payment application.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub invoice: Invoice,
    pub paid_total: Decimal,
    pub balance_due: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_round_trips_through_strings() {
        for method in [
            PaymentMethod::Cash,
            PaymentMethod::BankTransfer,
            PaymentMethod::Cheque,
            PaymentMethod::Other,
        ] {
            assert_eq!(PaymentMethod::from_string(method.as_str()), method);
        }
    }
}

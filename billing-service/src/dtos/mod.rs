//! Request DTOs with validation rules.
//!
//! Validation rejects malformed input at the edge; business rules (status
//! transitions, balance checks) live in the database service. Monetary
//! fields accept JSON numbers or strings and deserialize to `Decimal`.

use crate::models::{
    CreateClient, CreateInvoice, CreateInvoiceItem, CreatePayment, PaymentMethod, UpdateClient,
    UpdateInvoice,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_qty(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("must_be_positive"));
    }
    if value.normalize().scale() > 3 {
        return Err(ValidationError::new("at_most_three_decimal_places"));
    }
    Ok(())
}

fn validate_unit_price(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("must_be_non_negative"));
    }
    if value.normalize().scale() > 3 {
        return Err(ValidationError::new("at_most_three_decimal_places"));
    }
    Ok(())
}

// Payments are settled cash; anything finer than a cent would be silently
// rounded by the 2-decimal column, so the boundary rejects it instead.
fn validate_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("must_be_positive"));
    }
    if value.normalize().scale() > 2 {
        return Err(ValidationError::new("at_most_two_decimal_places"));
    }
    Ok(())
}

fn validate_percentage(value: &Decimal) -> Result<(), ValidationError> {
    if *value >= Decimal::ZERO && *value <= Decimal::from(100) {
        Ok(())
    } else {
        Err(ValidationError::new("must_be_between_0_and_100"))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub address_line1: Option<String>,
    #[validate(length(max = 200))]
    pub address_line2: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
}

impl CreateClientRequest {
    pub fn into_model(self) -> CreateClient {
        CreateClient {
            name: self.name,
            email: self.email,
            phone: self.phone,
            address_line1: self.address_line1,
            address_line2: self.address_line2,
            city: self.city,
            country: self.country,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateClientRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub address_line1: Option<String>,
    #[validate(length(max = 200))]
    pub address_line2: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
}

impl UpdateClientRequest {
    pub fn into_model(self) -> UpdateClient {
        UpdateClient {
            name: self.name,
            email: self.email,
            phone: self.phone,
            address_line1: self.address_line1,
            address_line2: self.address_line2,
            city: self.city,
            country: self.country,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateInvoiceItemRequest {
    pub product_id: Option<Uuid>,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    /// Defaults to 1 when omitted.
    #[validate(custom(function = validate_qty))]
    pub qty: Option<Decimal>,
    #[validate(custom(function = validate_unit_price))]
    pub unit_price: Decimal,
    pub sort_order: Option<i32>,
}

impl CreateInvoiceItemRequest {
    pub fn into_model(self) -> CreateInvoiceItem {
        CreateInvoiceItem {
            product_id: self.product_id,
            description: self.description,
            qty: self.qty.unwrap_or(Decimal::ONE),
            unit_price: self.unit_price,
            sort_order: self.sort_order,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub client_id: Uuid,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 8))]
    pub currency: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate(custom(function = validate_percentage))]
    pub tax_rate: Option<Decimal>,
    #[validate(length(min = 1), nested)]
    pub items: Vec<CreateInvoiceItemRequest>,
}

impl CreateInvoiceRequest {
    pub fn into_model(self) -> CreateInvoice {
        CreateInvoice {
            client_id: self.client_id,
            issue_date: self.issue_date,
            due_date: self.due_date,
            currency: self.currency,
            notes: self.notes,
            tax_rate: self.tax_rate,
            items: self.items.into_iter().map(|it| it.into_model()).collect(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateInvoiceRequest {
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 8))]
    pub currency: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate(custom(function = validate_percentage))]
    pub tax_rate: Option<Decimal>,
}

impl UpdateInvoiceRequest {
    pub fn into_model(self) -> UpdateInvoice {
        UpdateInvoice {
            issue_date: self.issue_date,
            due_date: self.due_date,
            currency: self.currency,
            notes: self.notes,
            tax_rate: self.tax_rate,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReplaceItemsRequest {
    #[validate(length(min = 1), nested)]
    pub items: Vec<CreateInvoiceItemRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    /// Defaults to cash when omitted.
    pub method: Option<PaymentMethod>,
    #[validate(custom(function = validate_amount))]
    pub amount: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

impl CreatePaymentRequest {
    pub fn into_model(self) -> CreatePayment {
        CreatePayment {
            method: self.method,
            amount: self.amount,
            paid_at: self.paid_at,
            note: self.note,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReportRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct OutstandingQuery {
    pub as_of: Option<NaiveDate>,
}

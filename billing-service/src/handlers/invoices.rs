//! Invoice lifecycle handlers.

use crate::dtos::{CreateInvoiceRequest, ReplaceItemsRequest, UpdateInvoiceRequest};
use crate::models::CreateInvoiceItem;
use crate::startup::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use service_core::error::AppError;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

#[instrument(skip(state, payload))]
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let invoice = state.db.create_invoice(&payload.into_model()).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

#[instrument(skip(state))]
pub async fn list_invoices(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let invoices = state.db.list_invoices().await?;
    Ok(Json(invoices))
}

#[instrument(skip(state), fields(invoice_id = %invoice_id))]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state
        .db
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::not_found("InvoiceNotFound", "Invoice not found"))?;
    Ok(Json(invoice))
}

#[instrument(skip(state), fields(invoice_id = %invoice_id))]
pub async fn issue_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state.db.issue_invoice(invoice_id).await?;
    Ok(Json(serde_json::json!({ "invoice": invoice })))
}

#[instrument(skip(state, payload), fields(invoice_id = %invoice_id))]
pub async fn update_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<UpdateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let invoice = state
        .db
        .update_invoice(invoice_id, &payload.into_model())
        .await?;
    Ok(Json(serde_json::json!({ "invoice": invoice })))
}

#[instrument(skip(state, payload), fields(invoice_id = %invoice_id))]
pub async fn replace_invoice_items(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<ReplaceItemsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let items: Vec<CreateInvoiceItem> = payload
        .items
        .into_iter()
        .map(|it| it.into_model())
        .collect();
    let invoice = state.db.replace_invoice_items(invoice_id, &items).await?;
    Ok(Json(invoice))
}

#[instrument(skip(state), fields(invoice_id = %invoice_id))]
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.db.delete_invoice(invoice_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

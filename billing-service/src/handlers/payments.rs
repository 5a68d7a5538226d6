//! Payment handlers.

use crate::dtos::CreatePaymentRequest;
use crate::startup::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use service_core::error::AppError;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

#[instrument(skip(state, payload), fields(invoice_id = %invoice_id))]
pub async fn apply_payment(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let outcome = state
        .db
        .apply_payment(invoice_id, &payload.into_model())
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Payments of one invoice, oldest first. 404 when the invoice is unknown.
#[instrument(skip(state), fields(invoice_id = %invoice_id))]
pub async fn list_invoice_payments(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let payments = state.db.list_payments_for_invoice(invoice_id).await?;
    Ok(Json(payments))
}

#[instrument(skip(state))]
pub async fn list_payments(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let payments = state.db.list_payments().await?;
    Ok(Json(payments))
}

//! Client CRUD handlers.

use crate::dtos::{CreateClientRequest, UpdateClientRequest};
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
pub async fn create_client(
    State(state): State<AppState>,
    Json(payload): Json<CreateClientRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let client = state.db.create_client(&payload.into_model()).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

#[instrument(skip(state))]
pub async fn list_clients(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let clients = state.db.list_clients().await?;
    Ok(Json(clients))
}

#[instrument(skip(state), fields(client_id = %client_id))]
pub async fn get_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let client = state
        .db
        .get_client(client_id)
        .await?
        .ok_or_else(|| AppError::not_found("ClientNotFound", "Client not found"))?;
    Ok(Json(client))
}

#[instrument(skip(state, payload), fields(client_id = %client_id))]
pub async fn update_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Json(payload): Json<UpdateClientRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let client = state
        .db
        .update_client(client_id, &payload.into_model())
        .await?
        .ok_or_else(|| AppError::not_found("ClientNotFound", "Client not found"))?;
    Ok(Json(client))
}

#[instrument(skip(state), fields(client_id = %client_id))]
pub async fn delete_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.db.delete_client(client_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Invoices referencing a client. An unknown client yields an empty list,
/// not a 404.
#[instrument(skip(state), fields(client_id = %client_id))]
pub async fn list_client_invoices(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invoices = state.db.list_invoices_for_client(client_id).await?;
    Ok(Json(invoices))
}

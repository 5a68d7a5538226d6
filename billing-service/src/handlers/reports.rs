//! Reporting handlers. Read-only aggregations over committed rows.

use crate::dtos::{OutstandingQuery, ReportRangeQuery};
use crate::startup::AppState;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use service_core::error::AppError;
use tracing::instrument;

#[instrument(skip(state))]
pub async fn sales_report(
    State(state): State<AppState>,
    Query(query): Query<ReportRangeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let report = state.db.sales_report(query.from, query.to).await?;
    Ok(Json(report))
}

#[instrument(skip(state))]
pub async fn vat_report(
    State(state): State<AppState>,
    Query(query): Query<ReportRangeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let report = state.db.vat_report(query.from, query.to).await?;
    Ok(Json(report))
}

#[instrument(skip(state))]
pub async fn outstanding_report(
    State(state): State<AppState>,
    Query(query): Query<OutstandingQuery>,
) -> Result<impl IntoResponse, AppError> {
    let report = state.db.outstanding_report(query.as_of).await?;
    Ok(Json(report))
}

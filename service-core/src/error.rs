use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Application error taxonomy.
///
/// Every variant carries a stable machine-readable code that ends up in the
/// JSON body, so clients can branch on `error` without parsing messages.
/// Business-rule violations (`NotFound`, `StateConflict`, `DomainRule`) are
/// raised inside the owning transaction, which rolls back before the error
/// surfaces here.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    #[error("{message}")]
    StateConflict {
        code: &'static str,
        message: String,
        meta: Option<serde_json::Value>,
    },

    #[error("{message}")]
    DomainRule {
        code: &'static str,
        message: String,
        meta: Option<serde_json::Value>,
    },

    #[error("Database error: {0}")]
    Database(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(anyhow::Error),
}

impl AppError {
    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        AppError::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn state_conflict(code: &'static str, message: impl Into<String>) -> Self {
        AppError::StateConflict {
            code,
            message: message.into(),
            meta: None,
        }
    }

    pub fn state_conflict_with_meta(
        code: &'static str,
        message: impl Into<String>,
        meta: serde_json::Value,
    ) -> Self {
        AppError::StateConflict {
            code,
            message: message.into(),
            meta: Some(meta),
        }
    }

    pub fn domain_rule(code: &'static str, message: impl Into<String>) -> Self {
        AppError::DomainRule {
            code,
            message: message.into(),
            meta: None,
        }
    }

    pub fn domain_rule_with_meta(
        code: &'static str,
        message: impl Into<String>,
        meta: serde_json::Value,
    ) -> Self {
        AppError::DomainRule {
            code,
            message: message.into(),
            meta: Some(meta),
        }
    }

    /// HTTP status the variant maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::DomainRule { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::StateConflict { .. } => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) | AppError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

/// Raw causes of 5xx errors go to the response body only in debug builds;
/// release builds log them and return an opaque message.
fn internal_details(err: &anyhow::Error) -> Option<serde_json::Value> {
    if cfg!(debug_assertions) {
        Some(serde_json::Value::String(format!("{err:#}")))
    } else {
        None
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            AppError::Validation(errors) => ErrorResponse {
                error: "ValidationError".to_string(),
                message: "Request validation failed".to_string(),
                meta: None,
                details: serde_json::to_value(&errors).ok(),
            },
            AppError::NotFound { code, message } => ErrorResponse {
                error: code.to_string(),
                message,
                meta: None,
                details: None,
            },
            AppError::StateConflict {
                code,
                message,
                meta,
            }
            | AppError::DomainRule {
                code,
                message,
                meta,
            } => ErrorResponse {
                error: code.to_string(),
                message,
                meta,
                details: None,
            },
            AppError::Database(err) | AppError::Internal(err) | AppError::Config(err) => {
                tracing::error!(error = %err, "Request failed with internal error");
                ErrorResponse {
                    error: "InternalError".to_string(),
                    message: "Internal server error".to_string(),
                    meta: None,
                    details: internal_details(&err),
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

use anyhow::Context;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use service_core::config::Config as CoreConfig;
use service_core::error::AppError;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BillingConfig {
    pub common: CoreConfig,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    /// Origin of the admin UI, the only origin allowed by CORS.
    pub cors_allowed_origin: String,
}

impl BillingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let common = CoreConfig::load()?;

        let db_url = env::var("BILLING_DATABASE_URL")
            .context("BILLING_DATABASE_URL must be set")
            .map_err(AppError::Config)?;
        let max_connections = env::var("BILLING_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("BILLING_DATABASE_MAX_CONNECTIONS must be an integer")
            .map_err(AppError::Config)?;
        let min_connections = env::var("BILLING_DATABASE_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .context("BILLING_DATABASE_MIN_CONNECTIONS must be an integer")
            .map_err(AppError::Config)?;

        let log_level = env::var("BILLING_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let otlp_endpoint = env::var("BILLING_OTLP_ENDPOINT").ok();
        let cors_allowed_origin = env::var("BILLING_CORS_ALLOWED_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        Ok(Self {
            common,
            service_name: "billing-service".to_string(),
            log_level,
            otlp_endpoint,
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
            cors_allowed_origin,
        })
    }
}

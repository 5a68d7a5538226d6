//! HTTP handlers. Thin adapters: validate the payload, call the database
//! service, map the outcome to a status code.

pub mod clients;
pub mod invoices;
pub mod payments;
pub mod reports;

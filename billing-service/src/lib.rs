pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod money;
pub mod services;
pub mod startup;

pub mod constants;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod schema;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;

pub mod observability;

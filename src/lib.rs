pub mod audit;
pub mod auth;
pub mod client;
pub mod configuration;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod validators;

//! Health endpoint server.

pub mod routes;
pub mod server;

pub use server::{AppState, HealthServer, HealthServerConfig};

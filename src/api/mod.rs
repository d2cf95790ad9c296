//! HTTP API: routes, handlers, and wire types.

pub mod auth;
pub mod routes;
pub mod tasks;
pub mod types;

pub use routes::{app, serve, AppState};

//! # taskdeck
//!
//! A self-hosted personal task tracker.
//!
//! Authenticated users create, edit, complete, and delete tasks (with
//! priority, category, due date, and nested subtasks) over an HTTP API
//! backed by SQLite. The interesting part is the reconciliation engine:
//! each user's task list is held as an in-memory authoritative view that
//! mutations hit optimistically before the durable write confirms, with
//! compensating rollback on failure and temp-id reconciliation for
//! optimistic creates.
//!
//! ## Modules
//! - `api`: axum routes, handlers, auth middleware
//! - `auth`: password hashing, registration validation, JWT sessions
//! - `engine`: the optimistic state machine and per-user sessions
//! - `store`: SQLite persistence with transactional subtask replacement
//! - `model`: tasks, subtasks, and the closed priority/category enums

pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod store;

pub use config::Config;
pub use error::ApiError;

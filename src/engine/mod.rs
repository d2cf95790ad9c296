//! Task reconciliation engine.
//!
//! The optimistic core of the application:
//! - `state`: the pure ADD/UPDATE/DELETE state machine with compensating
//!   snapshots and temp-id reconciliation
//! - `session`: per-user async glue between the state machine and the
//!   repository, with per-task write serialization

pub mod session;
pub mod state;

pub use session::{ListView, SessionRegistry, TaskSession};
pub use state::{progress, sorted_view, ListState, Mutation};

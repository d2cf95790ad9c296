//! SQLite-backed persistence for users, tasks, and subtasks.
//!
//! The store owns the only cross-session shared mutable state in the
//! system. Consistency guarantees live here, not in the engine:
//! - task-field update + whole-collection subtask replace run in one
//!   transaction (all-or-nothing)
//! - every task read/update/delete goes through the ownership guard
//! - task deletion cascades to subtasks via foreign keys

mod sqlite;

pub use sqlite::TaskStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{NewTask, Task, TaskPatch};

/// Errors from the persistence boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Task missing or owned by a different user. Deliberately one
    /// variant: callers must not learn which.
    #[error("task not found")]
    Rejected,

    /// Session identity resolves to no user row (e.g. stale session after
    /// a database reset). List degrades to empty; writes fail with this.
    #[error("user not found")]
    UserNotFound,

    /// Email already registered.
    #[error("email already in use")]
    EmailTaken,

    /// A stored row failed to decode (bad enum tag, bad uuid).
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Persistence boundary the reconciliation engine writes through.
///
/// Every operation takes the requesting identity explicitly; there is no
/// ambient session.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// All tasks owned by `owner_id`, full subtask collections included,
    /// ordered by creation time descending. An owner with no user row
    /// yields an empty list, not an error.
    async fn list_tasks(&self, owner_id: Uuid) -> Result<Vec<Task>, StoreError>;

    /// Insert a new task for `owner_id` and return it with the
    /// server-assigned id.
    async fn create_task(&self, owner_id: Uuid, new: NewTask) -> Result<Task, StoreError>;

    /// Partial update; `patch.subtasks`, when present, replaces the whole
    /// collection atomically with the field update.
    async fn update_task(
        &self,
        task_id: Uuid,
        requester_id: Uuid,
        patch: TaskPatch,
    ) -> Result<(), StoreError>;

    /// Delete a task and all its subtasks.
    async fn delete_task(&self, task_id: Uuid, requester_id: Uuid) -> Result<(), StoreError>;
}

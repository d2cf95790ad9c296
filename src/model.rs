//! Core task-tracking types.
//!
//! All timestamps (`created_at`, `due_date`) cross every boundary as epoch
//! milliseconds. The store converts to its native representation at the
//! boundary; nothing here does timezone-aware arithmetic.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task priority. Closed set so sorting stays exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Sort weight: high > medium > low.
    pub fn weight(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

/// Task category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Personal,
    Work,
    Study,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Personal => "personal",
            Category::Work => "work",
            Category::Study => "study",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "personal" => Some(Category::Personal),
            "work" => Some(Category::Work),
            "study" => Some(Category::Study),
            _ => None,
        }
    }
}

/// A subtask. Lives only inside its parent task: the whole collection is
/// replaced as a unit on update, never patched per member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: Uuid,
    pub text: String,
    pub completed: bool,
}

/// A task owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: Priority,
    pub category: Category,
    /// Epoch milliseconds; absent means no deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<i64>,
    /// Insertion order as provided by the caller; no implicit sort persisted.
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    pub completed: bool,
    /// Epoch milliseconds.
    pub created_at: i64,
    #[serde(skip)]
    pub owner_id: Uuid,
}

impl Task {
    /// Overdue iff the due date has passed and the task is not completed.
    /// `completed` dominates: a done task is never overdue.
    pub fn is_overdue(&self, now_ms: i64) -> bool {
        match self.due_date {
            Some(due) => due < now_ms && !self.completed,
            None => false,
        }
    }
}

/// Fields for creating a task. Subtasks always start empty and
/// `completed` false; the server assigns id and creation time.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub text: String,
    #[serde(default)]
    pub description: Option<String>,
    pub priority: Priority,
    pub category: Category,
    #[serde(default)]
    pub due_date: Option<i64>,
}

/// Deserializes a field that distinguishes "absent" from "explicitly null":
/// absent stays `None`, `null` becomes `Some(None)`, a value `Some(Some(v))`.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Field-level partial update. Absent fields are untouched. `description`
/// and `due_date` can be explicitly cleared with `null`. `subtasks`, when
/// present, replaces the whole collection (caller ids honored).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<i64>>,
    #[serde(default)]
    pub subtasks: Option<Vec<Subtask>>,
    #[serde(default)]
    pub completed: Option<bool>,
}

impl TaskPatch {
    /// Apply this patch to an in-memory task. The store applies the same
    /// semantics row-wise; the optimistic engine uses this directly.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(text) = &self.text {
            task.text = text.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(category) = self.category {
            task.category = category;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(subtasks) = &self.subtasks {
            task.subtasks = subtasks.clone();
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
    }
}

/// A registered user. Only existence-checked by the task logic; never
/// mutated by it.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
}

/// Current time as epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

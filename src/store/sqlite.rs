//! rusqlite implementation of the task repository.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{StoreError, TaskRepository};
use crate::model::{now_ms, NewTask, Subtask, Task, TaskPatch, User};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    name          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id          TEXT PRIMARY KEY,
    owner_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    text        TEXT NOT NULL,
    description TEXT,
    priority    TEXT NOT NULL,
    category    TEXT NOT NULL,
    due_date    INTEGER,
    completed   INTEGER NOT NULL DEFAULT 0,
    created_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS subtasks (
    id        TEXT PRIMARY KEY,
    task_id   TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    text      TEXT NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0,
    position  INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_owner ON tasks(owner_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_subtasks_task ON subtasks(task_id, position);
";

/// SQLite-backed store. One connection guarded by an async mutex; writes
/// are short and transactional.
pub struct TaskStore {
    conn: Mutex<Connection>,
}

impl TaskStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ── users ───────────────────────────────────────────────────────────

    /// Insert a new user. The password must already be hashed.
    pub async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: &str,
    ) -> Result<User, StoreError> {
        let conn = self.conn.lock().await;
        let exists: Option<String> = conn
            .query_row(
                "SELECT id FROM users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(StoreError::EmailTaken);
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            name: name.to_string(),
        };
        conn.execute(
            "INSERT INTO users (id, email, password_hash, name) VALUES (?1, ?2, ?3, ?4)",
            params![user.id.to_string(), user.email, user.password_hash, user.name],
        )?;
        Ok(user)
    }

    pub async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT id, email, password_hash, name FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id, email, password_hash, name)) => Ok(Some(User {
                id: parse_uuid(&id)?,
                email,
                password_hash,
                name,
            })),
            None => Ok(None),
        }
    }

    pub async fn user_exists(&self, id: Uuid) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM users WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|_| StoreError::Corrupt(format!("bad uuid: {}", s)))
}

/// Raw task columns before enum/uuid decoding.
type TaskRow = (
    String,         // id
    String,         // owner_id
    String,         // text
    Option<String>, // description
    String,         // priority
    String,         // category
    Option<i64>,    // due_date
    bool,           // completed
    i64,            // created_at
);

fn decode_task(row: TaskRow, subtasks: Vec<Subtask>) -> Result<Task, StoreError> {
    let (id, owner_id, text, description, priority, category, due_date, completed, created_at) =
        row;
    Ok(Task {
        id: parse_uuid(&id)?,
        owner_id: parse_uuid(&owner_id)?,
        text,
        description,
        priority: crate::model::Priority::parse(&priority)
            .ok_or_else(|| StoreError::Corrupt(format!("bad priority: {}", priority)))?,
        category: crate::model::Category::parse(&category)
            .ok_or_else(|| StoreError::Corrupt(format!("bad category: {}", category)))?,
        due_date,
        subtasks,
        completed,
        created_at,
    })
}

fn load_subtasks(conn: &Connection, task_id: &str) -> Result<Vec<Subtask>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, text, completed FROM subtasks WHERE task_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![task_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, bool>(2)?,
        ))
    })?;

    let mut subtasks = Vec::new();
    for row in rows {
        let (id, text, completed) = row?;
        subtasks.push(Subtask {
            id: parse_uuid(&id)?,
            text,
            completed,
        });
    }
    Ok(subtasks)
}

/// Ownership guard: resolve the task and verify the requester owns it.
/// Missing task and foreign task produce the same `Rejected`.
fn owned_task(conn: &Connection, task_id: Uuid, requester_id: Uuid) -> Result<Task, StoreError> {
    let row: Option<TaskRow> = conn
        .query_row(
            "SELECT id, owner_id, text, description, priority, category, due_date, completed, \
             created_at FROM tasks WHERE id = ?1",
            params![task_id.to_string()],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                ))
            },
        )
        .optional()?;

    let row = row.ok_or(StoreError::Rejected)?;
    let subtasks = load_subtasks(conn, &row.0)?;
    let task = decode_task(row, subtasks)?;
    if task.owner_id != requester_id {
        return Err(StoreError::Rejected);
    }
    Ok(task)
}

#[async_trait]
impl TaskRepository for TaskStore {
    async fn list_tasks(&self, owner_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, text, description, priority, category, due_date, completed, \
             created_at FROM tasks WHERE owner_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![owner_id.to_string()], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
            ))
        })?;

        let raw: Vec<TaskRow> = rows.collect::<Result<_, _>>()?;
        drop(stmt);

        let mut tasks = Vec::with_capacity(raw.len());
        for row in raw {
            let subtasks = load_subtasks(&conn, &row.0)?;
            tasks.push(decode_task(row, subtasks)?);
        }
        Ok(tasks)
    }

    async fn create_task(&self, owner_id: Uuid, new: NewTask) -> Result<Task, StoreError> {
        let conn = self.conn.lock().await;
        let owner_exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM users WHERE id = ?1",
                params![owner_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if owner_exists.is_none() {
            return Err(StoreError::UserNotFound);
        }

        let task = Task {
            id: Uuid::new_v4(),
            owner_id,
            text: new.text,
            description: new.description,
            priority: new.priority,
            category: new.category,
            due_date: new.due_date,
            subtasks: Vec::new(),
            completed: false,
            created_at: now_ms(),
        };
        conn.execute(
            "INSERT INTO tasks (id, owner_id, text, description, priority, category, due_date, \
             completed, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                task.id.to_string(),
                task.owner_id.to_string(),
                task.text,
                task.description,
                task.priority.as_str(),
                task.category.as_str(),
                task.due_date,
                task.completed,
                task.created_at,
            ],
        )?;
        Ok(task)
    }

    async fn update_task(
        &self,
        task_id: Uuid,
        requester_id: Uuid,
        patch: TaskPatch,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let mut task = owned_task(&tx, task_id, requester_id)?;
        let replace_subtasks = patch.subtasks.is_some();
        patch.apply_to(&mut task);

        tx.execute(
            "UPDATE tasks SET text = ?1, description = ?2, priority = ?3, category = ?4, \
             due_date = ?5, completed = ?6 WHERE id = ?7",
            params![
                task.text,
                task.description,
                task.priority.as_str(),
                task.category.as_str(),
                task.due_date,
                task.completed,
                task_id.to_string(),
            ],
        )?;

        if replace_subtasks {
            // Whole-collection replace: drop every existing row and insert
            // the supplied collection fresh, caller ids honored.
            tx.execute(
                "DELETE FROM subtasks WHERE task_id = ?1",
                params![task_id.to_string()],
            )?;
            for (position, subtask) in task.subtasks.iter().enumerate() {
                tx.execute(
                    "INSERT INTO subtasks (id, task_id, text, completed, position) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        subtask.id.to_string(),
                        task_id.to_string(),
                        subtask.text,
                        subtask.completed,
                        position as i64,
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    async fn delete_task(&self, task_id: Uuid, requester_id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        owned_task(&tx, task_id, requester_id)?;
        // Subtask rows go with the task via ON DELETE CASCADE.
        tx.execute(
            "DELETE FROM tasks WHERE id = ?1",
            params![task_id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

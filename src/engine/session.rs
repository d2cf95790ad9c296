//! Per-user reconciliation session.
//!
//! A [`TaskSession`] pairs the optimistic [`ListState`] with the durable
//! [`TaskRepository`]. Each operation:
//! 1. applies the optimistic transform under the state lock (synchronous,
//!    no I/O), then
//! 2. issues the durable write, serialized per task id, and
//! 3. settles the pending operation: confirm on success, compensating
//!    rollback on failure. Failures are logged and returned to the caller.
//!
//! A create inverts steps 1 and 2's locking: it takes the task's write
//! lock before the optimistic entry becomes visible, so concurrent edits
//! keyed by the temp id always queue behind the in-flight create.
//!
//! Edits addressing a task whose create is still in flight queue on that
//! task's write lock and are retargeted to the server-assigned id once the
//! create confirms. If the create fails, queued edits find the entry gone
//! and are rolled back too.
//!
//! Session identity is fixed at construction and passed explicitly to the
//! repository on every call; there is no ambient session state.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::state::{sorted_view, ListState, Mutation, OpId};
use crate::model::{now_ms, NewTask, Task, TaskPatch};
use crate::store::{StoreError, TaskRepository};

pub struct TaskSession {
    user_id: Uuid,
    repo: Arc<dyn TaskRepository>,
    state: Mutex<ListState>,
    /// Per-task write locks. A create registers the lock under the temp id
    /// and re-registers the same lock under the server id on confirmation,
    /// so both ids serialize against the same queue.
    write_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

/// Derived list view: sorted tasks plus the progress header the UI shows.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ListView {
    pub tasks: Vec<Task>,
    pub completed_count: usize,
    pub total_count: usize,
    /// Incomplete tasks whose due date has passed.
    pub overdue_count: usize,
    pub progress: f64,
}

impl TaskSession {
    /// Create a session for `user_id` and load its confirmed list.
    pub async fn load(user_id: Uuid, repo: Arc<dyn TaskRepository>) -> Result<Self, StoreError> {
        let session = Self {
            user_id,
            repo,
            state: Mutex::new(ListState::new()),
            write_locks: Mutex::new(HashMap::new()),
        };
        session.refresh().await?;
        Ok(session)
    }

    /// Refetch the confirmed list, dropping any pending reconciliation.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        let tasks = self.repo.list_tasks(self.user_id).await?;
        self.state.lock().await.reset(tasks);
        Ok(())
    }

    /// The display view: completion status dominates priority dominates
    /// recency. Recomputed on every call.
    pub async fn view(&self) -> ListView {
        let state = self.state.lock().await;
        let tasks = sorted_view(state.tasks());
        let total_count = tasks.len();
        let completed_count = tasks.iter().filter(|t| t.completed).count();
        let now = now_ms();
        let overdue_count = tasks.iter().filter(|t| t.is_overdue(now)).count();
        ListView {
            tasks,
            completed_count,
            total_count,
            overdue_count,
            progress: super::state::progress(completed_count, total_count),
        }
    }

    /// Create a task. `temp_id` is the client-generated id the optimistic
    /// entry carries until the server assigns the real one. Returns the
    /// reconciled task.
    pub async fn create(&self, temp_id: Uuid, new: NewTask) -> Result<Task, StoreError> {
        let temp = Task {
            id: temp_id,
            owner_id: self.user_id,
            text: new.text.clone(),
            description: new.description.clone(),
            priority: new.priority,
            category: new.category,
            due_date: new.due_date,
            subtasks: Vec::new(),
            completed: false,
            created_at: now_ms(),
        };

        // Take the task's write lock before the optimistic entry becomes
        // visible, so a concurrent edit that sees the temp id queues here
        // and cannot reach the repository ahead of the create.
        let lock = self.write_lock(temp_id).await;
        let _guard = lock.lock().await;

        let op = self.state.lock().await.begin(Mutation::Add(temp));

        match self.repo.create_task(self.user_id, new).await {
            Ok(server) => {
                let mut state = self.state.lock().await;
                let server_id = state.confirm_create(op, temp_id, &server);
                let reconciled = state
                    .get(server_id)
                    .cloned()
                    .unwrap_or(server);
                drop(state);

                // Re-register the lock so edits keyed by either id queue
                // on the same mutex.
                self.write_locks
                    .lock()
                    .await
                    .insert(server_id, Arc::clone(&lock));
                Ok(reconciled)
            }
            Err(e) => {
                tracing::warn!(user = %self.user_id, "task create failed, rolling back: {}", e);
                self.state.lock().await.rollback(op);
                Err(e)
            }
        }
    }

    /// Apply a partial update. The optimistic transform lands immediately;
    /// the durable write queues behind any in-flight write to the same
    /// task (including its create).
    pub async fn update(&self, id: Uuid, patch: TaskPatch) -> Result<(), StoreError> {
        let (op, lock_key) = {
            let mut state = self.state.lock().await;
            let target = state.resolve(id);
            let Some(current) = state.get(target).cloned() else {
                return Err(StoreError::Rejected);
            };
            let mut updated = current;
            patch.apply_to(&mut updated);
            (state.begin(Mutation::Update(updated)), target)
        };

        let lock = self.write_lock(lock_key).await;
        let _guard = lock.lock().await;

        // Resolve again: the id may have been remapped (or the entry
        // rolled away) while we queued.
        let target = {
            let state = self.state.lock().await;
            let target = state.resolve(id);
            if state.get(target).is_none() {
                drop(state);
                self.state.lock().await.rollback(op);
                return Err(StoreError::Rejected);
            }
            target
        };

        match self.repo.update_task(target, self.user_id, patch).await {
            Ok(()) => {
                self.state.lock().await.confirm(op);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(user = %self.user_id, task = %target, "task update failed, rolling back: {}", e);
                self.state.lock().await.rollback(op);
                Err(e)
            }
        }
    }

    /// Delete a task, optimistically first.
    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let (op, lock_key) = {
            let mut state = self.state.lock().await;
            let target = state.resolve(id);
            if state.get(target).is_none() {
                return Err(StoreError::Rejected);
            }
            (state.begin(Mutation::Delete(target)), target)
        };

        let lock = self.write_lock(lock_key).await;
        let _guard = lock.lock().await;

        let target = self.state.lock().await.resolve(id);

        match self.repo.delete_task(target, self.user_id).await {
            Ok(()) => {
                self.settle_delete(op, target).await;
                Ok(())
            }
            // The store has no such task (e.g. its create failed while the
            // delete queued). Both sides already agree the entry is gone;
            // rolling back would resurrect a phantom.
            Err(e @ StoreError::Rejected) => {
                tracing::warn!(user = %self.user_id, task = %target, "task delete rejected: {}", e);
                self.settle_delete(op, target).await;
                Err(e)
            }
            Err(e) => {
                tracing::warn!(user = %self.user_id, task = %target, "task delete failed, rolling back: {}", e);
                self.state.lock().await.rollback(op);
                Err(e)
            }
        }
    }

    /// A delete is settled once both sides agree the task is gone: drop
    /// the pending operation plus the alias and write-lock entries keyed
    /// by the dead id, so neither map grows with the session's history.
    async fn settle_delete(&self, op: OpId, target: Uuid) {
        let stale = {
            let mut state = self.state.lock().await;
            state.confirm(op);
            state.forget(target)
        };
        let mut locks = self.write_locks.lock().await;
        locks.remove(&target);
        for temp in stale {
            locks.remove(&temp);
        }
    }

    async fn write_lock(&self, id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        Arc::clone(locks.entry(id).or_default())
    }
}

/// One session per authenticated user, created lazily on first access.
pub struct SessionRegistry {
    repo: Arc<dyn TaskRepository>,
    sessions: RwLock<HashMap<Uuid, Arc<TaskSession>>>,
}

impl SessionRegistry {
    pub fn new(repo: Arc<dyn TaskRepository>) -> Self {
        Self {
            repo,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn session(&self, user_id: Uuid) -> Result<Arc<TaskSession>, StoreError> {
        if let Some(session) = self.sessions.read().await.get(&user_id) {
            return Ok(Arc::clone(session));
        }

        let mut sessions = self.sessions.write().await;
        // Another request may have raced us here.
        if let Some(session) = sessions.get(&user_id) {
            return Ok(Arc::clone(session));
        }
        let session = Arc::new(TaskSession::load(user_id, Arc::clone(&self.repo)).await?);
        sessions.insert(user_id, Arc::clone(&session));
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Priority};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    /// Scriptable repository: records calls, can fail writes, and can hold
    /// a create open until the test releases it.
    #[derive(Default)]
    struct MockRepo {
        calls: Mutex<Vec<String>>,
        fail_update: std::sync::atomic::AtomicBool,
        fail_delete: std::sync::atomic::AtomicBool,
        create_gate: Option<Arc<Notify>>,
        server_id: Mutex<Option<Uuid>>,
    }

    impl MockRepo {
        async fn recorded(&self) -> Vec<String> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl TaskRepository for MockRepo {
        async fn list_tasks(&self, _owner_id: Uuid) -> Result<Vec<Task>, StoreError> {
            Ok(Vec::new())
        }

        async fn create_task(&self, owner_id: Uuid, new: NewTask) -> Result<Task, StoreError> {
            if let Some(gate) = &self.create_gate {
                gate.notified().await;
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
                created_at: 42,
            };
            *self.server_id.lock().await = Some(task.id);
            self.calls.lock().await.push(format!("create {}", task.id));
            Ok(task)
        }

        async fn update_task(
            &self,
            task_id: Uuid,
            _requester_id: Uuid,
            _patch: TaskPatch,
        ) -> Result<(), StoreError> {
            self.calls.lock().await.push(format!("update {}", task_id));
            if self.fail_update.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(StoreError::Rejected);
            }
            Ok(())
        }

        async fn delete_task(&self, task_id: Uuid, _requester_id: Uuid) -> Result<(), StoreError> {
            self.calls.lock().await.push(format!("delete {}", task_id));
            if self.fail_delete.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(StoreError::Rejected);
            }
            Ok(())
        }
    }

    fn new_task(text: &str) -> NewTask {
        NewTask {
            text: text.to_string(),
            description: None,
            priority: Priority::High,
            category: Category::Work,
            due_date: None,
        }
    }

    #[tokio::test]
    async fn create_reconciles_temp_id_to_server_id() {
        let repo = Arc::new(MockRepo::default());
        let session = TaskSession::load(Uuid::new_v4(), repo.clone()).await.unwrap();

        let temp_id = Uuid::new_v4();
        let created = session.create(temp_id, new_task("t")).await.unwrap();
        assert_ne!(created.id, temp_id);
        assert_eq!(created.created_at, 42);

        // A later mutation addressing the stale temp id lands on the
        // server id at the repository.
        session
            .update(
                temp_id,
                TaskPatch {
                    completed: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let calls = repo.recorded().await;
        assert_eq!(calls[1], format!("update {}", created.id));

        let view = session.view().await;
        assert_eq!(view.total_count, 1);
        assert_eq!(view.completed_count, 1);
        assert_eq!(view.progress, 100.0);
    }

    #[tokio::test]
    async fn view_counts_overdue_tasks() {
        let repo = Arc::new(MockRepo::default());
        let session = TaskSession::load(Uuid::new_v4(), repo.clone()).await.unwrap();

        session
            .create(
                Uuid::new_v4(),
                NewTask {
                    due_date: Some(1),
                    ..new_task("late")
                },
            )
            .await
            .unwrap();
        session.create(Uuid::new_v4(), new_task("no deadline")).await.unwrap();

        let view = session.view().await;
        assert_eq!(view.total_count, 2);
        assert_eq!(view.overdue_count, 1);
    }

    #[tokio::test]
    async fn failed_update_rolls_back_and_surfaces() {
        let repo = Arc::new(MockRepo::default());
        let session = TaskSession::load(Uuid::new_v4(), repo.clone()).await.unwrap();
        let created = session.create(Uuid::new_v4(), new_task("t")).await.unwrap();

        repo.fail_update
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let err = session
            .update(
                created.id,
                TaskPatch {
                    completed: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected));

        // Client state matches the pre-mutation snapshot again.
        let view = session.view().await;
        assert!(!view.tasks[0].completed);
        assert_eq!(view.completed_count, 0);
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_rejected_without_repo_call() {
        let repo = Arc::new(MockRepo::default());
        let session = TaskSession::load(Uuid::new_v4(), repo.clone()).await.unwrap();
        let err = session
            .update(Uuid::new_v4(), TaskPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected));
        assert!(repo.recorded().await.is_empty());
    }

    #[tokio::test]
    async fn edit_during_in_flight_create_queues_until_confirmed() {
        let gate = Arc::new(Notify::new());
        let repo = Arc::new(MockRepo {
            create_gate: Some(Arc::clone(&gate)),
            ..Default::default()
        });
        let session = Arc::new(
            TaskSession::load(Uuid::new_v4(), repo.clone() as Arc<dyn TaskRepository>)
                .await
                .unwrap(),
        );

        let temp_id = Uuid::new_v4();
        let create = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.create(temp_id, new_task("t")).await })
        };
        // Let the create reach the gate, then issue an edit against the
        // temp id while the create is still in flight.
        tokio::task::yield_now().await;

        let edit = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                session
                    .update(
                        temp_id,
                        TaskPatch {
                            completed: Some(true),
                            ..Default::default()
                        },
                    )
                    .await
            })
        };
        // The optimistic toggle is already visible while both writes are
        // pending.
        tokio::task::yield_now().await;
        assert!(session.view().await.tasks[0].completed);

        gate.notify_one();
        create.await.unwrap().unwrap();
        edit.await.unwrap().unwrap();

        let server_id = repo.server_id.lock().await.unwrap();
        let calls = repo.recorded().await;
        assert_eq!(calls, vec![
            format!("create {}", server_id),
            format!("update {}", server_id),
        ]);
        // The temp id never reaches the repository.
        assert!(!calls.iter().any(|c| c.contains(&temp_id.to_string())));
    }

    #[tokio::test]
    async fn failed_edit_queued_across_create_confirmation_rolls_back() {
        let gate = Arc::new(Notify::new());
        let repo = Arc::new(MockRepo {
            create_gate: Some(Arc::clone(&gate)),
            ..Default::default()
        });
        let session = Arc::new(
            TaskSession::load(Uuid::new_v4(), repo.clone() as Arc<dyn TaskRepository>)
                .await
                .unwrap(),
        );

        let temp_id = Uuid::new_v4();
        let create = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.create(temp_id, new_task("t")).await })
        };
        tokio::task::yield_now().await;

        // The edit applies optimistically against the temp id, then its
        // durable write queues behind the create and fails.
        repo.fail_update
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let edit = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                session
                    .update(
                        temp_id,
                        TaskPatch {
                            completed: Some(true),
                            ..Default::default()
                        },
                    )
                    .await
            })
        };
        tokio::task::yield_now().await;

        gate.notify_one();
        let created = create.await.unwrap().unwrap();
        let err = edit.await.unwrap().unwrap_err();
        assert!(matches!(err, StoreError::Rejected));

        // The compensation lands on the reconciled entry: the toggle is
        // reverted, the task itself survives under the server id.
        let view = session.view().await;
        assert_eq!(view.total_count, 1);
        assert_eq!(view.tasks[0].id, created.id);
        assert!(!view.tasks[0].completed);
    }

    #[tokio::test]
    async fn confirmed_delete_prunes_write_locks() {
        let repo = Arc::new(MockRepo::default());
        let session = TaskSession::load(Uuid::new_v4(), repo.clone()).await.unwrap();

        let temp_id = Uuid::new_v4();
        let created = session.create(temp_id, new_task("t")).await.unwrap();
        // The create registered the lock under both ids.
        assert_eq!(session.write_locks.lock().await.len(), 2);

        session.delete(temp_id).await.unwrap();
        assert!(session.write_locks.lock().await.is_empty());
        assert_eq!(session.view().await.total_count, 0);
        assert_eq!(
            repo.recorded().await.last().unwrap(),
            &format!("delete {}", created.id)
        );
    }

    #[tokio::test]
    async fn rejected_delete_does_not_resurrect_the_entry() {
        let repo = Arc::new(MockRepo::default());
        let session = TaskSession::load(Uuid::new_v4(), repo.clone()).await.unwrap();
        let created = session.create(Uuid::new_v4(), new_task("t")).await.unwrap();

        repo.fail_delete
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let err = session.delete(created.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected));

        // Both sides agree the task is gone; the optimistic removal stays.
        assert_eq!(session.view().await.total_count, 0);
    }

    #[tokio::test]
    async fn delete_removes_and_registry_reuses_sessions() {
        let repo = Arc::new(MockRepo::default());
        let registry = SessionRegistry::new(repo.clone() as Arc<dyn TaskRepository>);
        let user = Uuid::new_v4();

        let session = registry.session(user).await.unwrap();
        let created = session.create(Uuid::new_v4(), new_task("t")).await.unwrap();
        session.delete(created.id).await.unwrap();
        assert_eq!(session.view().await.total_count, 0);

        let again = registry.session(user).await.unwrap();
        assert!(Arc::ptr_eq(&session, &again));
    }
}

//! Pure optimistic state machine over one user's task list.
//!
//! The list held here is the authoritative client-visible view. Every
//! mutation is applied immediately and recorded as a pending operation
//! carrying a compensating snapshot; the caller later settles each
//! operation with [`ListState::confirm`], [`ListState::confirm_create`],
//! or [`ListState::rollback`] once the durable write reports back.
//!
//! Optimistic creates enter the list under a client-generated temp id.
//! `confirm_create` remaps the entry to the server-assigned id and records
//! the alias so later mutations addressing the stale temp id still resolve.

use std::collections::HashMap;
use uuid::Uuid;

use crate::model::Task;

/// The three optimistic transforms.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Prepend the task to the list.
    Add(Task),
    /// Replace the entry with a matching id in place; no-op if absent.
    Update(Task),
    /// Remove the entry with a matching id, wherever it sits.
    Delete(Uuid),
}

/// Handle for settling a pending optimistic operation.
pub type OpId = u64;

/// Compensating transform captured before the mutation was applied.
#[derive(Debug, Clone)]
enum Snapshot {
    /// Undo an Add: remove the entry again.
    Added { id: Uuid },
    /// Undo an Update: restore the pre-mutation record.
    Replaced { task: Task },
    /// Undo a Delete: reinsert the removed record near its old position.
    Removed { index: usize, task: Task },
    /// The mutation matched nothing; nothing to undo.
    Noop,
}

#[derive(Debug, Default)]
pub struct ListState {
    tasks: Vec<Task>,
    pending: HashMap<OpId, Snapshot>,
    next_op: OpId,
    /// temp id -> server id, recorded when a create confirms.
    aliases: HashMap<Uuid, Uuid>,
}

impl ListState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the confirmed list wholesale (initial load or refetch).
    /// Pending operations are dropped; the fetched state is authoritative.
    pub fn reset(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.pending.clear();
        self.aliases.clear();
    }

    /// The current visible list in stored order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        let id = self.resolve(id);
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Map a possibly-stale temp id to the id the entry currently carries.
    pub fn resolve(&self, id: Uuid) -> Uuid {
        self.aliases.get(&id).copied().unwrap_or(id)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Apply a mutation optimistically and record its compensation.
    pub fn begin(&mut self, mutation: Mutation) -> OpId {
        let snapshot = match mutation {
            Mutation::Add(task) => {
                let id = task.id;
                self.tasks.insert(0, task);
                Snapshot::Added { id }
            }
            Mutation::Update(task) => {
                match self.tasks.iter_mut().find(|t| t.id == task.id) {
                    Some(slot) => {
                        let previous = std::mem::replace(slot, task);
                        Snapshot::Replaced { task: previous }
                    }
                    None => Snapshot::Noop,
                }
            }
            Mutation::Delete(id) => match self.tasks.iter().position(|t| t.id == id) {
                Some(index) => {
                    let task = self.tasks.remove(index);
                    Snapshot::Removed { index, task }
                }
                None => Snapshot::Noop,
            },
        };

        let op = self.next_op;
        self.next_op += 1;
        self.pending.insert(op, snapshot);
        op
    }

    /// Durable write succeeded with no reconciling id change: the
    /// optimistic state already matches, so just drop the compensation.
    pub fn confirm(&mut self, op: OpId) {
        self.pending.remove(&op);
    }

    /// Durable create succeeded: adopt the server-assigned id and creation
    /// time while keeping any optimistic edits that landed on the entry in
    /// the meantime. Returns the server id.
    pub fn confirm_create(&mut self, op: OpId, temp_id: Uuid, server: &Task) -> Uuid {
        self.pending.remove(&op);
        if let Some(entry) = self.tasks.iter_mut().find(|t| t.id == temp_id) {
            entry.id = server.id;
            entry.created_at = server.created_at;
            entry.owner_id = server.owner_id;
        }
        if temp_id != server.id {
            self.aliases.insert(temp_id, server.id);
            // Snapshots recorded against the temp id must follow the
            // remap, or a later rollback of a pending edit would search
            // for an id the entry no longer carries and drop the
            // compensation.
            for snapshot in self.pending.values_mut() {
                match snapshot {
                    Snapshot::Replaced { task } | Snapshot::Removed { task, .. }
                        if task.id == temp_id =>
                    {
                        task.id = server.id;
                        task.created_at = server.created_at;
                        task.owner_id = server.owner_id;
                    }
                    _ => {}
                }
            }
        }
        server.id
    }

    /// Drop the alias bookkeeping for a task that is confirmed gone.
    /// Returns the stale temp ids that pointed at it.
    pub fn forget(&mut self, id: Uuid) -> Vec<Uuid> {
        let stale: Vec<Uuid> = self
            .aliases
            .iter()
            .filter(|(_, server)| **server == id)
            .map(|(temp, _)| *temp)
            .collect();
        for temp in &stale {
            self.aliases.remove(temp);
        }
        stale
    }

    /// Durable write failed: apply the compensating transform, restoring
    /// the exact pre-mutation state of the affected record.
    pub fn rollback(&mut self, op: OpId) {
        let Some(snapshot) = self.pending.remove(&op) else {
            return;
        };
        match snapshot {
            Snapshot::Added { id } => {
                self.tasks.retain(|t| t.id != id);
            }
            Snapshot::Replaced { task } => {
                if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task.id) {
                    *slot = task;
                }
            }
            Snapshot::Removed { index, task } => {
                let index = index.min(self.tasks.len());
                self.tasks.insert(index, task);
            }
            Snapshot::Noop => {}
        }
    }
}

/// Display ordering: incomplete before completed; within each group,
/// priority high > medium > low; ties broken by creation time descending.
/// Recomputed per call; never mutates stored order.
pub fn sorted_view(tasks: &[Task]) -> Vec<Task> {
    let mut view = tasks.to_vec();
    view.sort_by(|a, b| {
        a.completed
            .cmp(&b.completed)
            .then(b.priority.weight().cmp(&a.priority.weight()))
            .then(b.created_at.cmp(&a.created_at))
    });
    view
}

/// Completion percentage; 0 for an empty list.
pub fn progress(completed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    }
}

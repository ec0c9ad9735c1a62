//! Task collection manager.
//!
//! # Responsibility
//! - Own the ordered task collection and be its only mutation point.
//! - Compose filter/sort/search queries and aggregate statistics.
//! - Persist snapshots to a durable key-value store and broadcast changes.
//!
//! # Invariants
//! - Insertion order is the canonical base order.
//! - Every mutation is applied, then persisted, then broadcast, before the
//!   call returns.
//! - Persistence and listener failures are logged and isolated; they never
//!   fail the mutation that triggered them.
//! - Load failures degrade to an empty collection instead of failing
//!   construction.

use crate::model::query::{SortKey, SortOrder, TaskFilter};
use crate::model::task::{
    Category, Priority, Task, TaskId, TaskPatch, TaskValidationError, ValidationReport,
};
use crate::repo::kv_store::{KeyValueStore, StoreError};
use crate::service::observer::{
    ObserverId, ObserverRegistry, ObserverResult, TaskAction, TaskEvent,
};
use crate::service::stats::TaskStatistics;
use crate::service::transfer::{decode_tasks, encode_tasks, encode_tasks_pretty, DecodeError};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage key holding the task snapshot unless configured otherwise.
pub const DEFAULT_NAMESPACE_KEY: &str = "qtask_manager_tasks";

pub type TaskResult<T> = Result<T, TaskError>;

/// Errors surfaced to callers of manager operations.
#[derive(Debug)]
pub enum TaskError {
    /// Hard field rule violated; `context` names the failed operation.
    Validation {
        context: &'static str,
        source: TaskValidationError,
    },
    NotFound(TaskId),
    /// Import payload rejected; the collection is unchanged.
    Import(DecodeError),
    Export(serde_json::Error),
}

impl Display for TaskError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation { context, source } => write!(f, "{context}: {source}"),
            Self::NotFound(id) => write!(f, "Task not found: {id}"),
            Self::Import(err) => write!(f, "Failed to import tasks: {err}"),
            Self::Export(err) => write!(f, "Failed to export tasks: {err}"),
        }
    }
}

impl Error for TaskError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation { source, .. } => Some(source),
            Self::NotFound(_) => None,
            Self::Import(err) => Some(err),
            Self::Export(err) => Some(err),
        }
    }
}

/// Durable store read/write failure.
#[derive(Debug)]
pub enum PersistenceError {
    Store(StoreError),
    Encode(serde_json::Error),
    /// Stored snapshot exists but cannot be decoded.
    Corrupt(DecodeError),
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "task store failure: {err}"),
            Self::Encode(err) => write!(f, "failed to encode tasks: {err}"),
            Self::Corrupt(err) => write!(f, "stored tasks are corrupt: {err}"),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::Corrupt(err) => Some(err),
        }
    }
}

/// Diagnostic snapshot of the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerInfo {
    pub version: &'static str,
    pub total_tasks: usize,
    pub is_valid: bool,
    pub categories: Vec<Category>,
    pub has_saved_snapshot: bool,
    pub statistics: TaskStatistics,
}

/// Owner of the task collection.
pub struct TaskManager<S: KeyValueStore> {
    store: S,
    namespace_key: String,
    tasks: Vec<Task>,
    observers: ObserverRegistry,
    load_error: Option<PersistenceError>,
    last_persistence_error: Option<PersistenceError>,
}

impl<S: KeyValueStore> TaskManager<S> {
    /// Creates a manager over `store` and loads the default namespace.
    pub fn new(store: S) -> Self {
        Self::with_namespace_key(store, DEFAULT_NAMESPACE_KEY)
    }

    /// Creates a manager over `store` and loads `namespace_key`.
    ///
    /// Never fails: an unreadable snapshot yields an empty collection and is
    /// reported through [`TaskManager::load_error`].
    pub fn with_namespace_key(store: S, namespace_key: impl Into<String>) -> Self {
        let mut manager = Self {
            store,
            namespace_key: namespace_key.into(),
            tasks: Vec::new(),
            observers: ObserverRegistry::new(),
            load_error: None,
            last_persistence_error: None,
        };
        // Failure stays readable through `load_error()`.
        let _ = manager.load();
        manager
    }

    pub fn namespace_key(&self) -> &str {
        &self.namespace_key
    }

    /// Failure from the most recent load, if it fell back to empty.
    pub fn load_error(&self) -> Option<&PersistenceError> {
        self.load_error.as_ref()
    }

    /// Failure from the most recent swallowed write, cleared on success.
    pub fn last_persistence_error(&self) -> Option<&PersistenceError> {
        self.last_persistence_error.as_ref()
    }

    // ---- observers ----

    pub fn subscribe<F>(&mut self, listener: F) -> ObserverId
    where
        F: FnMut(&TaskEvent<'_>) -> ObserverResult + 'static,
    {
        self.observers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    // ---- mutations ----

    /// Creates and appends a task.
    ///
    /// # Errors
    /// - `Validation` when the title is blank or too long.
    pub fn add_task(
        &mut self,
        title: &str,
        description: &str,
        priority: impl Into<Priority>,
        category: impl Into<Category>,
    ) -> TaskResult<Task> {
        let task = Task::new(title, description, priority, category).map_err(|source| {
            TaskError::Validation {
                context: "Failed to create task",
                source,
            }
        })?;
        self.tasks.push(task);
        let index = self.tasks.len() - 1;
        self.commit(TaskAction::Add, Some(index));
        Ok(self.tasks[index].clone())
    }

    /// Applies a partial patch to one task.
    pub fn update_task(&mut self, id: &TaskId, patch: &TaskPatch) -> TaskResult<Task> {
        let index = self.index_of(id)?;
        self.tasks[index]
            .update(patch)
            .map_err(|source| TaskError::Validation {
                context: "Failed to update task",
                source,
            })?;
        self.commit(TaskAction::Update, Some(index));
        Ok(self.tasks[index].clone())
    }

    /// Removes one task and returns it.
    pub fn delete_task(&mut self, id: &TaskId) -> TaskResult<Task> {
        let index = self.index_of(id)?;
        let removed = self.tasks.remove(index);
        self.persist_or_record();
        Self::broadcast(
            &mut self.observers,
            TaskAction::Delete,
            Some(&removed),
            &self.tasks,
        );
        info!(
            "event=task_mutation module=service status=ok action=delete task_id={} total={}",
            removed.id(),
            self.tasks.len()
        );
        Ok(removed)
    }

    pub fn toggle_completion(&mut self, id: &TaskId) -> TaskResult<Task> {
        self.change_completion(id, TaskAction::Toggle, |task| {
            task.toggle_completion();
        })
    }

    pub fn complete_task(&mut self, id: &TaskId) -> TaskResult<Task> {
        self.change_completion(id, TaskAction::Complete, |task| {
            task.mark_completed();
        })
    }

    pub fn uncomplete_task(&mut self, id: &TaskId) -> TaskResult<Task> {
        self.change_completion(id, TaskAction::Uncomplete, |task| {
            task.mark_pending();
        })
    }

    /// Appends an independent pending copy with a new id and " (Copy)" title.
    pub fn duplicate_task(&mut self, id: &TaskId) -> TaskResult<Task> {
        let index = self.index_of(id)?;
        let mut copy = self.tasks[index].clone();
        copy.reset_as_copy();
        self.tasks.push(copy);
        let copy_index = self.tasks.len() - 1;
        self.commit(TaskAction::Duplicate, Some(copy_index));
        Ok(self.tasks[copy_index].clone())
    }

    /// Removes every completed task and returns how many were removed.
    pub fn clear_completed(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|task| !task.is_completed());
        let cleared = before - self.tasks.len();
        self.commit(TaskAction::ClearCompleted, None);
        cleared
    }

    /// Removes every task and returns the prior count.
    pub fn clear_all(&mut self) -> usize {
        let cleared = self.tasks.len();
        self.tasks.clear();
        self.commit(TaskAction::ClearAll, None);
        cleared
    }

    /// Appends every record in `payload` and returns how many were added.
    ///
    /// Existing tasks are kept. Imported ids that collide with a task already
    /// in the collection (or earlier in the payload) are replaced with fresh
    /// ones.
    ///
    /// # Errors
    /// - `Import` when the payload or any record is malformed; nothing is
    ///   added in that case.
    pub fn import(&mut self, payload: &str) -> TaskResult<usize> {
        let mut imported = decode_tasks(payload).map_err(|err| {
            warn!(
                "event=tasks_import module=service status=error error={}",
                err
            );
            TaskError::Import(err)
        })?;

        let mut known: HashSet<TaskId> = self.tasks.iter().map(|task| task.id().clone()).collect();
        let mut reassigned = 0usize;
        for task in &mut imported {
            if known.contains(task.id()) {
                task.assign_id(TaskId::generate());
                reassigned += 1;
            }
            known.insert(task.id().clone());
        }

        let count = imported.len();
        self.tasks.extend(imported);
        info!(
            "event=tasks_import module=service status=ok count={} reassigned_ids={}",
            count, reassigned
        );
        self.commit(TaskAction::Import, None);
        Ok(count)
    }

    // ---- queries ----

    pub fn get_by_id(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id() == id)
    }

    /// Read-only view in canonical order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Owned copy in canonical order.
    pub fn get_all(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks matching the filter's search text and predicates.
    pub fn get_filtered(&self, filter: &TaskFilter) -> Vec<Task> {
        let search = filter.search_text();
        self.tasks
            .iter()
            .filter(|task| search.map_or(true, |text| task.matches_search(text)))
            .filter(|task| task.matches_filters(filter))
            .cloned()
            .collect()
    }

    pub fn get_sorted(&self, key: SortKey, order: SortOrder) -> Vec<Task> {
        let mut sorted = self.get_all();
        sort_tasks(&mut sorted, key, order);
        sorted
    }

    /// Filters first, then sorts the survivors.
    pub fn get_filtered_and_sorted(
        &self,
        filter: &TaskFilter,
        key: SortKey,
        order: SortOrder,
    ) -> Vec<Task> {
        let mut tasks = self.get_filtered(filter);
        sort_tasks(&mut tasks, key, order);
        tasks
    }

    /// Blank queries return every task.
    pub fn search(&self, query: &str) -> Vec<Task> {
        if query.trim().is_empty() {
            return self.get_all();
        }
        self.collect_where(|task| task.matches_search(query))
    }

    pub fn tasks_by_category(&self, category: Category) -> Vec<Task> {
        self.collect_where(|task| task.category() == category)
    }

    pub fn tasks_by_priority(&self, priority: Priority) -> Vec<Task> {
        self.collect_where(|task| task.priority() == priority)
    }

    pub fn completed_tasks(&self) -> Vec<Task> {
        self.collect_where(Task::is_completed)
    }

    pub fn pending_tasks(&self) -> Vec<Task> {
        self.collect_where(|task| !task.is_completed())
    }

    pub fn statistics(&self) -> TaskStatistics {
        TaskStatistics::compute(&self.tasks)
    }

    /// Distinct categories in use, sorted by name.
    pub fn categories(&self) -> Vec<Category> {
        let mut categories: Vec<Category> = self
            .tasks
            .iter()
            .map(Task::category)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        categories.sort_by_key(|category| category.as_str());
        categories
    }

    /// Pretty-printed record array of the whole collection.
    pub fn export(&self) -> TaskResult<String> {
        encode_tasks_pretty(&self.tasks).map_err(TaskError::Export)
    }

    /// Checks id uniqueness and every task's own rules.
    ///
    /// Task messages are prefixed with the 1-based position of the task.
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for (index, task) in self.tasks.iter().enumerate() {
            if !seen.insert(task.id()) {
                errors.push(format!("Duplicate task ID found: {}", task.id()));
            }
            let report = task.validate();
            if !report.is_valid() {
                errors.push(format!("Task {}: {}", index + 1, report.errors.join(", ")));
            }
        }

        ValidationReport { errors }
    }

    pub fn info(&self) -> ManagerInfo {
        let has_saved_snapshot = matches!(self.store.get_item(&self.namespace_key), Ok(Some(_)));
        ManagerInfo {
            version: crate::core_version(),
            total_tasks: self.tasks.len(),
            is_valid: self.validate().is_valid(),
            categories: self.categories(),
            has_saved_snapshot,
            statistics: self.statistics(),
        }
    }

    // ---- persistence ----

    /// Writes the full collection under the namespace key.
    ///
    /// A failure is also kept in [`TaskManager::last_persistence_error`].
    pub fn persist(&mut self) -> Result<(), &PersistenceError> {
        let outcome = encode_tasks(&self.tasks)
            .map_err(PersistenceError::Encode)
            .and_then(|snapshot| {
                self.store
                    .set_item(&self.namespace_key, &snapshot)
                    .map_err(PersistenceError::Store)
            });

        match outcome {
            Ok(()) => {
                self.last_persistence_error = None;
                debug!(
                    "event=tasks_persist module=service status=ok count={}",
                    self.tasks.len()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=tasks_persist module=service status=error count={} error={}",
                    self.tasks.len(),
                    err
                );
                Err(&*self.last_persistence_error.insert(err))
            }
        }
    }

    /// Replaces the in-memory collection with the stored snapshot.
    ///
    /// A missing snapshot loads as empty. On failure the collection is left
    /// empty and the error is kept in [`TaskManager::load_error`].
    pub fn load(&mut self) -> Result<usize, &PersistenceError> {
        let outcome = self
            .store
            .get_item(&self.namespace_key)
            .map_err(PersistenceError::Store)
            .and_then(|snapshot| match snapshot {
                Some(payload) => decode_tasks(&payload).map_err(PersistenceError::Corrupt),
                None => Ok(Vec::new()),
            });

        match outcome {
            Ok(tasks) => {
                self.tasks = tasks;
                self.load_error = None;
                info!(
                    "event=tasks_load module=service status=ok count={}",
                    self.tasks.len()
                );
                Ok(self.tasks.len())
            }
            Err(err) => {
                self.tasks.clear();
                warn!(
                    "event=tasks_load module=service status=error fallback=empty error={}",
                    err
                );
                Err(&*self.load_error.insert(err))
            }
        }
    }

    // ---- internals ----

    fn index_of(&self, id: &TaskId) -> TaskResult<usize> {
        self.tasks
            .iter()
            .position(|task| task.id() == id)
            .ok_or_else(|| TaskError::NotFound(id.clone()))
    }

    fn change_completion(
        &mut self,
        id: &TaskId,
        action: TaskAction,
        apply: impl FnOnce(&mut Task),
    ) -> TaskResult<Task> {
        let index = self.index_of(id)?;
        apply(&mut self.tasks[index]);
        self.commit(action, Some(index));
        Ok(self.tasks[index].clone())
    }

    /// Persists, then broadcasts `action` for the task at `index`.
    fn commit(&mut self, action: TaskAction, index: Option<usize>) {
        self.persist_or_record();
        let affected = index.and_then(|index| self.tasks.get(index));
        Self::broadcast(&mut self.observers, action, affected, &self.tasks);
        info!(
            "event=task_mutation module=service status=ok action={} task_id={} total={}",
            action,
            affected.map_or("-", |task| task.id().as_str()),
            self.tasks.len()
        );
    }

    fn persist_or_record(&mut self) {
        // Failure stays readable through `last_persistence_error()`.
        let _ = self.persist();
    }

    fn broadcast(
        observers: &mut ObserverRegistry,
        action: TaskAction,
        task: Option<&Task>,
        tasks: &[Task],
    ) {
        let report = observers.notify(&TaskEvent {
            action,
            task,
            tasks,
        });
        if report.failed > 0 {
            debug!(
                "event=observer_notify module=service status=partial action={} delivered={} failed={}",
                action, report.delivered, report.failed
            );
        }
    }

    fn collect_where(&self, predicate: impl Fn(&Task) -> bool) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|task| predicate(task))
            .cloned()
            .collect()
    }
}

fn sort_tasks(tasks: &mut [Task], key: SortKey, order: SortOrder) {
    tasks.sort_by(|left, right| order.apply(left.compare_to(right, key)));
}

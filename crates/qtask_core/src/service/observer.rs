//! Change-notification registry.
//!
//! # Responsibility
//! - Keep an identity-keyed table of listeners.
//! - Deliver every collection change to every listener, best-effort.
//!
//! # Invariants
//! - Listeners run in subscription order.
//! - A listener that errors or panics never stops delivery to the rest and
//!   never reaches the caller that triggered the change.

use crate::model::task::Task;
use log::warn;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Kind of collection change being broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskAction {
    Add,
    Update,
    Delete,
    Toggle,
    Complete,
    Uncomplete,
    Duplicate,
    ClearCompleted,
    ClearAll,
    Import,
}

impl TaskAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Toggle => "toggle",
            Self::Complete => "complete",
            Self::Uncomplete => "uncomplete",
            Self::Duplicate => "duplicate",
            Self::ClearCompleted => "clear_completed",
            Self::ClearAll => "clear_all",
            Self::Import => "import",
        }
    }
}

impl Display for TaskAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot handed to listeners after a change has been applied and persisted.
#[derive(Debug, Clone, Copy)]
pub struct TaskEvent<'a> {
    pub action: TaskAction,
    /// Affected task; `None` for bulk actions.
    pub task: Option<&'a Task>,
    /// Full post-change collection in canonical order.
    pub tasks: &'a [Task],
}

pub type ObserverResult = Result<(), Box<dyn Error>>;

type Listener = Box<dyn FnMut(&TaskEvent<'_>) -> ObserverResult>;

/// Registration handle returned by [`ObserverRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(u64);

impl Display for ObserverId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct ObserverRegistry {
    next_id: u64,
    listeners: Vec<(ObserverId, Listener)>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ObserverId
    where
        F: FnMut(&TaskEvent<'_>) -> ObserverResult + 'static,
    {
        self.next_id += 1;
        let id = ObserverId(self.next_id);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` when the handle is unknown.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(registered, _)| *registered != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Invokes every listener with `event`, isolating failures.
    ///
    /// Listeners should report failure by returning `Err`. A panic is also
    /// contained, but the process panic hook still runs first, so it prints
    /// the usual panic message on stderr, and logs `event=panic_captured`
    /// when file logging is active.
    pub fn notify(&mut self, event: &TaskEvent<'_>) -> NotifyReport {
        let mut report = NotifyReport::default();

        for (id, listener) in &mut self.listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    report.failed += 1;
                    warn!(
                        "event=observer_notify module=service status=error action={} observer_id={} error={}",
                        event.action, id, err
                    );
                }
                Err(_) => {
                    report.failed += 1;
                    warn!(
                        "event=observer_notify module=service status=error action={} observer_id={} error_code=observer_panicked",
                        event.action, id
                    );
                }
            }
        }

        report
    }
}

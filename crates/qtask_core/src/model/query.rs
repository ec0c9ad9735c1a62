//! Query vocabulary shared by the task entity and the task manager.
//!
//! # Invariants
//! - Unset filter fields impose no constraint.
//! - Filtering always happens before sorting.
//! - `SortOrder::Desc` keeps the comparator order, `SortOrder::Asc` reverses it.

use crate::model::task::{Category, Priority};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Completion status predicate used by [`TaskFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    Completed,
    Pending,
}

impl StatusFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Pending => "pending",
        }
    }

    /// Strict parse; blank or unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "completed" => Some(Self::Completed),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }

    pub fn matches(self, completed: bool) -> bool {
        match self {
            Self::Completed => completed,
            Self::Pending => !completed,
        }
    }
}

/// Optional-field task filter.
///
/// Each populated field is one predicate; a task matches when every
/// populated predicate holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Free-text search; blank text matches everything.
    pub search: Option<String>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub status: Option<StatusFilter>,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn status(mut self, status: StatusFilter) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns the search text when it is non-blank.
    pub fn search_text(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Sort key selecting comparator behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Urgency first (high, medium, low).
    Priority,
    Title,
    Category,
    /// Pending before completed.
    Completed,
    /// Newest first.
    #[default]
    Created,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::Title => "title",
            Self::Category => "category",
            Self::Completed => "completed",
            Self::Created => "created",
        }
    }
}

impl From<&str> for SortKey {
    /// Unknown keys fall back to [`SortKey::Created`].
    fn from(value: &str) -> Self {
        match value.trim() {
            "priority" => Self::Priority,
            "title" => Self::Title,
            "category" => Self::Category,
            "completed" => Self::Completed,
            _ => Self::Created,
        }
    }
}

/// Direction applied on top of a [`SortKey`] comparator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Reverses the comparator.
    Asc,
    /// Keeps the comparator order.
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    /// Applies this direction to a raw comparator result.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering.reverse(),
            Self::Desc => ordering,
        }
    }
}

impl From<&str> for SortOrder {
    /// Anything other than `asc` keeps the comparator order.
    fn from(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }
}

/// Locale-style string comparison: case-insensitive first, lowercase before
/// uppercase on ties.
pub(crate) fn locale_compare(left: &str, right: &str) -> Ordering {
    left.to_lowercase()
        .cmp(&right.to_lowercase())
        .then_with(|| right.cmp(left))
}

//! Task entity.
//!
//! # Responsibility
//! - Own field validation and soft coercion for one task.
//! - Own the completion lifecycle and timestamp bookkeeping.
//! - Provide derived values used by sorting, filtering and rendering.
//!
//! # Invariants
//! - `title` is trimmed, non-empty and at most 100 characters.
//! - `priority`/`category` are always members of their enums.
//! - `completed_at.is_some() == completed`.
//! - `updated_at >= created_at`.
//! - `created_at` never changes after construction.

use crate::model::query::{locale_compare, SortKey, TaskFilter};
use crate::model::time_fmt::{
    age_in_days_at, format_date, now_millis, parse_iso_string, relative_time_at, to_iso_string,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Maximum title length in characters (after trimming).
pub const TITLE_MAX_CHARS: usize = 100;
/// Maximum description length in characters.
pub const DESCRIPTION_MAX_CHARS: usize = 500;

const COPY_SUFFIX: &str = " (Copy)";

/// Opaque, stable task identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generates a new collision-resistant id (`task_<uuid-v4>`).
    pub fn generate() -> Self {
        Self(format!("task_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Task urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Exact-match parse used by callers that must reject unknown input.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// Sort rank: high=1, medium=2, low=3.
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::High => "🔴",
            Self::Medium => "🟡",
            Self::Low => "🟢",
        }
    }
}

impl From<&str> for Priority {
    /// Unknown input coerces to [`Priority::Medium`].
    fn from(value: &str) -> Self {
        Self::parse(value).unwrap_or_default()
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[default]
    Personal,
    Work,
    Urgent,
    Education,
    Health,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Personal,
        Category::Work,
        Category::Urgent,
        Category::Education,
        Category::Health,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "Personal",
            Self::Work => "Work",
            Self::Urgent => "Urgent",
            Self::Education => "Education",
            Self::Health => "Health",
        }
    }

    /// Exact-match, case-sensitive parse.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Personal => "👤",
            Self::Work => "💼",
            Self::Urgent => "🚨",
            Self::Education => "📚",
            Self::Health => "🏥",
        }
    }
}

impl From<&str> for Category {
    /// Unknown input coerces to [`Category::Personal`].
    fn from(value: &str) -> Self {
        Self::parse(value).unwrap_or_default()
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hard validation failures for task fields and wire records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyTitle,
    TitleTooLong { chars: usize },
    DescriptionTooLong { chars: usize },
    InvalidTimestamp { field: &'static str, value: String },
    /// `updatedAt` is earlier than `createdAt`.
    TimestampOrder,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "Task title is required and cannot be empty"),
            Self::TitleTooLong { .. } => write!(
                f,
                "Task title cannot exceed {TITLE_MAX_CHARS} characters"
            ),
            Self::DescriptionTooLong { .. } => write!(
                f,
                "Description cannot exceed {DESCRIPTION_MAX_CHARS} characters"
            ),
            Self::InvalidTimestamp { field, value } => {
                write!(f, "invalid {field} timestamp `{value}`")
            }
            Self::TimestampOrder => write!(f, "updatedAt cannot be earlier than createdAt"),
        }
    }
}

impl Error for TaskValidationError {}

/// Non-failing self-check result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Partial field update. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
}

impl TaskPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn category(mut self, category: impl Into<Category>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.category.is_none()
    }
}

/// Plain wire record used by storage, export and import.
///
/// Timestamps are ISO-8601 strings. Every field except `title` is optional on
/// input and defaults per construction rules; unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Non-string values read as unset and coerce like unknown strings.
    #[serde(default, deserialize_with = "lenient_string")]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

/// One unit of work.
///
/// Fields are private so the lifecycle invariants can only change through
/// the methods below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TaskRecord", into = "TaskRecord")]
pub struct Task {
    id: TaskId,
    title: String,
    description: String,
    priority: Priority,
    category: Category,
    completed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates a pending task with a fresh id.
    ///
    /// # Errors
    /// - `EmptyTitle` when the trimmed title is empty.
    /// - `TitleTooLong` when the trimmed title exceeds 100 characters.
    pub fn new(
        title: &str,
        description: impl Into<String>,
        priority: impl Into<Priority>,
        category: impl Into<Category>,
    ) -> Result<Self, TaskValidationError> {
        let title = validate_title(title)?;
        let now = now_millis();
        Ok(Self {
            id: TaskId::generate(),
            title,
            description: description.into(),
            priority: priority.into(),
            category: category.into(),
            completed: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
        })
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Applies a partial patch and refreshes `updated_at`.
    ///
    /// The title is checked before anything is applied, so a rejected patch
    /// leaves the task untouched.
    pub fn update(&mut self, patch: &TaskPatch) -> Result<&mut Self, TaskValidationError> {
        let title = patch.title.as_deref().map(validate_title).transpose()?;

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        self.touch();
        Ok(self)
    }

    /// Marks the task completed. No-op when already completed.
    pub fn mark_completed(&mut self) -> &mut Self {
        if !self.completed {
            self.completed = true;
            self.touch();
            self.completed_at = Some(self.updated_at);
        }
        self
    }

    /// Marks the task pending. No-op when already pending.
    pub fn mark_pending(&mut self) -> &mut Self {
        if self.completed {
            self.completed = false;
            self.completed_at = None;
            self.touch();
        }
        self
    }

    pub fn toggle_completion(&mut self) -> &mut Self {
        if self.completed {
            self.mark_pending()
        } else {
            self.mark_completed()
        }
    }

    /// Case-insensitive substring match over title, description and category.
    pub fn matches_search(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
            || self.category.as_str().to_lowercase().contains(&needle)
    }

    /// Category/priority/status predicates. Search text is not consulted.
    pub fn matches_filters(&self, filter: &TaskFilter) -> bool {
        if filter.category.is_some_and(|category| category != self.category) {
            return false;
        }
        if filter.priority.is_some_and(|priority| priority != self.priority) {
            return false;
        }
        if filter
            .status
            .is_some_and(|status| !status.matches(self.completed))
        {
            return false;
        }
        true
    }

    pub fn priority_rank(&self) -> u8 {
        self.priority.rank()
    }

    pub fn age_in_days(&self) -> u64 {
        self.age_in_days_at(Utc::now())
    }

    pub fn age_in_days_at(&self, now: DateTime<Utc>) -> u64 {
        age_in_days_at(self.created_at, now)
    }

    /// Relative phrase ("3 hours ago") for any timestamp, measured from now.
    pub fn relative_time(timestamp: DateTime<Utc>) -> String {
        relative_time_at(timestamp, Utc::now())
    }

    pub fn relative_created_time(&self) -> String {
        Self::relative_time(self.created_at)
    }

    pub fn formatted_created_date(&self) -> String {
        format_date(self.created_at)
    }

    /// Empty when the task is pending.
    pub fn formatted_completed_date(&self) -> String {
        self.completed_at.map(format_date).unwrap_or_default()
    }

    /// Comparator for `sort_by`; see [`SortKey`] for each key's direction.
    pub fn compare_to(&self, other: &Task, key: SortKey) -> Ordering {
        match key {
            SortKey::Priority => self.priority_rank().cmp(&other.priority_rank()),
            SortKey::Title => locale_compare(&self.title, &other.title),
            SortKey::Category => locale_compare(self.category.as_str(), other.category.as_str()),
            SortKey::Completed => self.completed.cmp(&other.completed),
            SortKey::Created => other.created_at.cmp(&self.created_at),
        }
    }

    pub fn is_high_priority(&self) -> bool {
        self.priority == Priority::High
    }

    /// Tasks carry no due date, so nothing is ever overdue.
    pub fn is_overdue(&self) -> bool {
        false
    }

    pub fn summary(&self) -> String {
        self.summary_at(Utc::now())
    }

    pub fn summary_at(&self, now: DateTime<Utc>) -> String {
        let status = if self.completed { "Completed" } else { "Pending" };
        format!(
            "{} - {} ({} priority, {} days old)",
            self.title,
            status,
            self.priority,
            self.age_in_days_at(now)
        )
    }

    /// CSS-style class hint, e.g. `priority-high`.
    pub fn priority_class(&self) -> String {
        format!("priority-{}", self.priority)
    }

    pub fn priority_emoji(&self) -> &'static str {
        self.priority.emoji()
    }

    pub fn category_emoji(&self) -> &'static str {
        self.category.emoji()
    }

    /// Collects every title/description violation without failing fast.
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();
        if let Err(err) = validate_title(&self.title) {
            errors.push(err.to_string());
        }
        let description_chars = self.description.chars().count();
        if description_chars > DESCRIPTION_MAX_CHARS {
            errors.push(
                TaskValidationError::DescriptionTooLong {
                    chars: description_chars,
                }
                .to_string(),
            );
        }
        ValidationReport { errors }
    }

    pub fn to_record(&self) -> TaskRecord {
        TaskRecord {
            id: Some(self.id.to_string()),
            title: self.title.clone(),
            description: Some(self.description.clone()),
            priority: Some(self.priority.as_str().to_string()),
            category: Some(self.category.as_str().to_string()),
            completed: Some(self.completed),
            created_at: Some(to_iso_string(self.created_at)),
            updated_at: Some(to_iso_string(self.updated_at)),
            completed_at: self.completed_at.map(to_iso_string),
        }
    }

    /// Rebuilds a task from a wire record, keeping its id and timestamps.
    ///
    /// Missing fields default the way construction does: fresh id, empty
    /// description, `medium`/`Personal`, pending, timestamps at now. A
    /// completed record without `completedAt` borrows `updatedAt`; a pending
    /// record drops any stray `completedAt`.
    ///
    /// # Errors
    /// - Title violations, unparsable timestamps, or `updatedAt < createdAt`.
    pub fn from_record(record: TaskRecord) -> Result<Self, TaskValidationError> {
        let title = validate_title(&record.title)?;
        let now = now_millis();

        let created_at =
            parse_timestamp_field("createdAt", record.created_at.as_deref())?.unwrap_or(now);
        let updated_at = parse_timestamp_field("updatedAt", record.updated_at.as_deref())?
            .unwrap_or_else(|| now.max(created_at));
        if updated_at < created_at {
            return Err(TaskValidationError::TimestampOrder);
        }

        let completed = record.completed.unwrap_or(false);
        let completed_at = if completed {
            Some(
                parse_timestamp_field("completedAt", record.completed_at.as_deref())?
                    .unwrap_or(updated_at),
            )
        } else {
            None
        };

        let id = record
            .id
            .filter(|value| !value.trim().is_empty())
            .map(TaskId::from)
            .unwrap_or_else(TaskId::generate);

        Ok(Self {
            id,
            title,
            description: record.description.unwrap_or_default(),
            priority: record
                .priority
                .as_deref()
                .map(Priority::from)
                .unwrap_or_default(),
            category: record
                .category
                .as_deref()
                .map(Category::from)
                .unwrap_or_default(),
            completed,
            created_at,
            updated_at,
            completed_at,
        })
    }

    /// Turns a clone into an independent copy: new id, " (Copy)" title,
    /// pending, timestamps at now. The title is shortened so the suffix
    /// still fits the length limit.
    pub(crate) fn reset_as_copy(&mut self) {
        let keep = TITLE_MAX_CHARS - COPY_SUFFIX.chars().count();
        let base: String = self.title.chars().take(keep).collect();
        let now = now_millis();

        self.id = TaskId::generate();
        self.title = format!("{}{COPY_SUFFIX}", base.trim_end());
        self.completed = false;
        self.completed_at = None;
        self.created_at = now;
        self.updated_at = now;
    }

    pub(crate) fn assign_id(&mut self, id: TaskId) {
        self.id = id;
    }

    fn touch(&mut self) {
        self.updated_at = now_millis().max(self.created_at);
    }
}

impl From<Task> for TaskRecord {
    fn from(value: Task) -> Self {
        value.to_record()
    }
}

impl TryFrom<TaskRecord> for Task {
    type Error = TaskValidationError;

    fn try_from(value: TaskRecord) -> Result<Self, Self::Error> {
        Self::from_record(value)
    }
}

/// Trims and checks a title against the hard title rules.
pub fn validate_title(title: &str) -> Result<String, TaskValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TaskValidationError::EmptyTitle);
    }
    let chars = trimmed.chars().count();
    if chars > TITLE_MAX_CHARS {
        return Err(TaskValidationError::TitleTooLong { chars });
    }
    Ok(trimmed.to_string())
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) => Some(text),
        _ => None,
    })
}

fn parse_timestamp_field(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, TaskValidationError> {
    match value {
        None => Ok(None),
        Some(raw) => parse_iso_string(raw)
            .map(Some)
            .ok_or_else(|| TaskValidationError::InvalidTimestamp {
                field,
                value: raw.to_string(),
            }),
    }
}

//! Task list encoding for storage snapshots, export files and imports.
//!
//! # Invariants
//! - Storage and export share one record shape (`TaskRecord` arrays).
//! - Decoding is all-or-nothing: one bad record rejects the whole payload.

use crate::model::task::{Task, TaskRecord, TaskValidationError};
use chrono::NaiveDate;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default prefix for export file names.
pub const EXPORT_FILE_PREFIX: &str = "qtask-backup";

/// Failure to turn a payload into tasks.
#[derive(Debug)]
pub enum DecodeError {
    /// Payload is not JSON or not an array of record objects.
    Parse(serde_json::Error),
    /// Record at `index` (0-based) violates a hard task rule.
    InvalidRecord {
        index: usize,
        source: TaskValidationError,
    },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "{err}"),
            Self::InvalidRecord { index, source } => {
                write!(f, "record {}: {source}", index + 1)
            }
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::InvalidRecord { source, .. } => Some(source),
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Compact JSON used for storage snapshots.
pub fn encode_tasks(tasks: &[Task]) -> serde_json::Result<String> {
    serde_json::to_string(&to_records(tasks))
}

/// Pretty-printed JSON used for export files.
pub fn encode_tasks_pretty(tasks: &[Task]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&to_records(tasks))
}

/// Parses a record array into tasks, preserving ids and timestamps.
pub fn decode_tasks(payload: &str) -> Result<Vec<Task>, DecodeError> {
    let records: Vec<TaskRecord> = serde_json::from_str(payload)?;
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            Task::from_record(record).map_err(|source| DecodeError::InvalidRecord { index, source })
        })
        .collect()
}

/// `{prefix}-YYYY-MM-DD.json`.
pub fn export_file_name(prefix: &str, date: NaiveDate) -> String {
    format!("{prefix}-{}.json", date.format("%Y-%m-%d"))
}

fn to_records(tasks: &[Task]) -> Vec<TaskRecord> {
    tasks.iter().map(Task::to_record).collect()
}

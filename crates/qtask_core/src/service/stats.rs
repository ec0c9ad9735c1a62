//! Collection statistics.

use crate::model::task::{Category, Priority, Task};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-priority task counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriorityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl PriorityCounts {
    pub fn get(&self, priority: Priority) -> usize {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }

    fn bump(&mut self, priority: Priority) {
        match priority {
            Priority::High => self.high += 1,
            Priority::Medium => self.medium += 1,
            Priority::Low => self.low += 1,
        }
    }
}

/// Aggregate counts over a task collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatistics {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    /// Rounded percentage in `0..=100`; `0` for an empty collection.
    pub completion_rate: u32,
    pub priority: PriorityCounts,
    /// Only categories that occur in the collection are present.
    pub categories: BTreeMap<Category, usize>,
}

impl TaskStatistics {
    pub fn compute(tasks: &[Task]) -> Self {
        let mut stats = Self {
            total: tasks.len(),
            ..Self::default()
        };

        for task in tasks {
            if task.is_completed() {
                stats.completed += 1;
            }
            stats.priority.bump(task.priority());
            *stats.categories.entry(task.category()).or_insert(0) += 1;
        }

        stats.pending = stats.total - stats.completed;
        stats.completion_rate = completion_rate(stats.completed, stats.total);
        stats
    }
}

fn completion_rate(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u32
}

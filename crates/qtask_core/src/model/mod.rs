//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task entity and its wire record.
//! - Define query vocabulary (filters, sort keys, sort order).
//! - Provide human-readable time helpers consumed by renderers.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId`.
//! - Task titles are validated hard; priority/category are coerced soft.
//! - `completed_at` is set if and only if the task is completed.

pub mod query;
pub mod task;
pub mod time_fmt;

//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate task mutations, queries, persistence and notifications.
//! - Keep presentation layers decoupled from storage details.

pub mod observer;
pub mod stats;
pub mod task_manager;
pub mod transfer;

//! Durable key-value storage contracts and implementations.
//!
//! # Responsibility
//! - Define the string key/value contract the task manager persists through.
//! - Isolate SQLite details from service orchestration.
//!
//! # Invariants
//! - Keys are non-blank.
//! - A missing key is `Ok(None)`, never an error.

pub mod kv_store;

//! Core domain logic for QTask.
//! This crate is the single source of truth for task invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, ExportConfig, LoggingConfig, QTaskConfig, StorageConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{
    default_log_level, init_from_config, init_logging, logging_status, LoggingError,
};
pub use model::query::{SortKey, SortOrder, StatusFilter, TaskFilter};
pub use model::task::{
    Category, Priority, Task, TaskId, TaskPatch, TaskRecord, TaskValidationError,
    ValidationReport,
};
pub use repo::kv_store::{
    KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore, StoreError, StoreResult,
};
pub use service::observer::{ObserverId, ObserverResult, TaskAction, TaskEvent};
pub use service::stats::{PriorityCounts, TaskStatistics};
pub use service::task_manager::{
    ManagerInfo, PersistenceError, TaskError, TaskManager, TaskResult, DEFAULT_NAMESPACE_KEY,
};
pub use service::transfer::{export_file_name, DecodeError, EXPORT_FILE_PREFIX};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

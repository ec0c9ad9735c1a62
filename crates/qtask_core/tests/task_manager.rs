use qtask_core::{
    open_db, open_db_in_memory, Category, KeyValueStore, MemoryKeyValueStore, PersistenceError,
    Priority, SortKey, SortOrder, SqliteKeyValueStore, StatusFilter, StoreError, StoreResult,
    TaskAction, TaskError, TaskFilter, TaskId, TaskManager, TaskPatch, DEFAULT_NAMESPACE_KEY,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn titles(tasks: &[qtask_core::Task]) -> Vec<&str> {
    tasks.iter().map(|task| task.title()).collect()
}

/// Store whose writes can be switched off.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryKeyValueStore,
    fail_writes: Cell<bool>,
}

impl KeyValueStore for FlakyStore {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        if self.fail_writes.get() {
            return Err(StoreError::Unavailable("quota exceeded".to_string()));
        }
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        self.inner.remove_item(key)
    }
}

#[test]
fn statistics_then_clear_completed() {
    let mut manager = TaskManager::new(MemoryKeyValueStore::new());
    manager.add_task("A", "", Priority::High, Category::Work).unwrap();
    let b = manager.add_task("B", "", Priority::Medium, Category::Personal).unwrap();
    manager.add_task("C", "", Priority::Low, Category::Work).unwrap();
    manager.complete_task(b.id()).unwrap();

    let stats = manager.statistics();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.completion_rate, 33);
    assert_eq!(stats.priority.high, 1);
    assert_eq!(stats.priority.medium, 1);
    assert_eq!(stats.priority.low, 1);
    assert_eq!(stats.categories.get(&Category::Work), Some(&2));
    assert_eq!(stats.categories.get(&Category::Personal), Some(&1));
    assert_eq!(stats.categories.get(&Category::Health), None);

    assert_eq!(manager.clear_completed(), 1);
    assert_eq!(titles(manager.tasks()), vec!["A", "C"]);
    let stats = manager.statistics();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.completed, 0);
    assert_eq!(stats.completion_rate, 0);

    let empty = TaskManager::new(MemoryKeyValueStore::new());
    assert_eq!(empty.statistics().completion_rate, 0);
}

#[test]
fn clear_completed_keeps_pending_tasks() {
    let mut manager = TaskManager::new(MemoryKeyValueStore::new());
    let a = manager.add_task("A", "", Priority::Medium, Category::Work).unwrap();
    manager.add_task("B", "", Priority::Medium, Category::Work).unwrap();
    manager.complete_task(a.id()).unwrap();

    assert_eq!(manager.clear_completed(), 1);
    assert_eq!(titles(manager.tasks()), vec!["B"]);
    assert_eq!(manager.clear_completed(), 0);
}

#[test]
fn filter_then_sort_by_title() {
    let mut manager = TaskManager::new(MemoryKeyValueStore::new());
    manager.add_task("zeta", "", Priority::Low, Category::Work).unwrap();
    let done = manager.add_task("alpha", "", Priority::Low, Category::Work).unwrap();
    manager.add_task("Mid", "", Priority::Low, Category::Work).unwrap();
    manager.add_task("beta", "", Priority::High, Category::Health).unwrap();
    manager.complete_task(done.id()).unwrap();

    let filter = TaskFilter::new().status(StatusFilter::Pending);
    let default_order =
        manager.get_filtered_and_sorted(&filter, SortKey::Title, SortOrder::default());
    assert_eq!(titles(&default_order), vec!["beta", "Mid", "zeta"]);

    let reversed = manager.get_filtered_and_sorted(&filter, SortKey::Title, SortOrder::Asc);
    assert_eq!(titles(&reversed), vec!["zeta", "Mid", "beta"]);

    let work_only = manager.get_filtered(&TaskFilter::new().category(Category::Work));
    assert_eq!(titles(&work_only), vec!["zeta", "alpha", "Mid"]);
}

#[test]
fn created_sort_puts_newer_first_by_default() {
    let mut manager = TaskManager::new(MemoryKeyValueStore::new());
    manager
        .import(
            r#"[
                {"title":"old","createdAt":"2024-01-01T00:00:00.000Z"},
                {"title":"new","createdAt":"2024-02-01T00:00:00.000Z"}
            ]"#,
        )
        .unwrap();

    let newest_first = manager.get_sorted(SortKey::Created, SortOrder::default());
    assert_eq!(titles(&newest_first), vec!["new", "old"]);

    let oldest_first = manager.get_sorted(SortKey::Created, SortOrder::Asc);
    assert_eq!(titles(&oldest_first), vec!["old", "new"]);
}

#[test]
fn priority_sort_is_stable_within_rank() {
    let mut manager = TaskManager::new(MemoryKeyValueStore::new());
    manager.add_task("low", "", Priority::Low, Category::Work).unwrap();
    manager.add_task("high-1", "", Priority::High, Category::Work).unwrap();
    manager.add_task("medium", "", Priority::Medium, Category::Work).unwrap();
    manager.add_task("high-2", "", Priority::High, Category::Work).unwrap();

    let sorted = manager.get_sorted(SortKey::Priority, SortOrder::Desc);
    assert_eq!(titles(&sorted), vec!["high-1", "high-2", "medium", "low"]);
}

#[test]
fn search_covers_title_description_and_blank_queries() {
    let mut manager = TaskManager::new(MemoryKeyValueStore::new());
    manager.add_task("Groceries", "buy MILK", Priority::Low, Category::Personal).unwrap();
    manager.add_task("Report", "", Priority::High, Category::Work).unwrap();

    assert_eq!(titles(&manager.search("milk")), vec!["Groceries"]);
    assert_eq!(titles(&manager.search("REP")), vec!["Report"]);
    assert_eq!(manager.search("   ").len(), 2);
    assert!(manager.search("nothing").is_empty());

    let filtered = manager.get_filtered(&TaskFilter::new().search("  "));
    assert_eq!(filtered.len(), 2);
}

#[test]
fn unknown_id_operations_fail_without_side_effects() {
    let mut manager = TaskManager::new(MemoryKeyValueStore::new());
    manager.add_task("Keep", "", Priority::Low, Category::Work).unwrap();
    let events = Rc::new(Cell::new(0));
    let seen = Rc::clone(&events);
    manager.subscribe(move |_event| {
        seen.set(seen.get() + 1);
        Ok(())
    });

    let missing = TaskId::from("task_missing");
    let err = manager.delete_task(&missing).unwrap_err();
    assert!(matches!(err, TaskError::NotFound(ref id) if *id == missing));
    assert_eq!(err.to_string(), "Task not found: task_missing");
    assert!(manager.toggle_completion(&missing).is_err());
    assert!(manager.update_task(&missing, &TaskPatch::new().title("x")).is_err());
    assert!(manager.duplicate_task(&missing).is_err());

    assert_eq!(manager.len(), 1);
    assert_eq!(events.get(), 0);
}

#[test]
fn invalid_update_is_reported_with_context() {
    let mut manager = TaskManager::new(MemoryKeyValueStore::new());
    let task = manager.add_task("Keep", "", Priority::Low, Category::Work).unwrap();

    let err = manager
        .update_task(task.id(), &TaskPatch::new().title(""))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to update task: Task title is required and cannot be empty"
    );
    assert_eq!(manager.get_by_id(task.id()).unwrap().title(), "Keep");

    let err = manager
        .add_task("   ", "", Priority::Low, Category::Work)
        .unwrap_err();
    assert!(err.to_string().starts_with("Failed to create task"));
    assert!(manager.len() == 1);
}

#[test]
fn observers_receive_events_and_failures_are_isolated() {
    let mut manager = TaskManager::new(MemoryKeyValueStore::new());
    let log: Rc<RefCell<Vec<(TaskAction, Option<String>, usize)>>> = Rc::default();

    let sink = Rc::clone(&log);
    manager.subscribe(|_event| Err("listener exploded".into()));
    manager.subscribe(|_event| panic!("listener panicked"));
    let recorder = manager.subscribe(move |event| {
        sink.borrow_mut().push((
            event.action,
            event.task.map(|task| task.title().to_string()),
            event.tasks.len(),
        ));
        Ok(())
    });

    let task = manager.add_task("Watch", "", Priority::Low, Category::Work).unwrap();
    manager.toggle_completion(task.id()).unwrap();
    manager.clear_completed();

    assert_eq!(
        *log.borrow(),
        vec![
            (TaskAction::Add, Some("Watch".to_string()), 1),
            (TaskAction::Toggle, Some("Watch".to_string()), 1),
            (TaskAction::ClearCompleted, None, 0),
        ]
    );

    assert!(manager.unsubscribe(recorder));
    assert!(!manager.unsubscribe(recorder));
    manager.add_task("Unheard", "", Priority::Low, Category::Work).unwrap();
    assert_eq!(log.borrow().len(), 3);
}

#[test]
fn duplicate_appends_pending_copy() {
    let mut manager = TaskManager::new(MemoryKeyValueStore::new());
    let original = manager
        .add_task("Plan trip", "flights", Priority::High, Category::Personal)
        .unwrap();
    manager.complete_task(original.id()).unwrap();

    let copy = manager.duplicate_task(original.id()).unwrap();
    assert_ne!(copy.id(), original.id());
    assert_eq!(copy.title(), "Plan trip (Copy)");
    assert_eq!(copy.description(), "flights");
    assert_eq!(copy.priority(), Priority::High);
    assert!(!copy.is_completed());
    assert_eq!(manager.tasks().last().unwrap().id(), copy.id());
    assert!(manager.get_by_id(original.id()).unwrap().is_completed());

    let long = manager
        .add_task(&"x".repeat(100), "", Priority::Low, Category::Work)
        .unwrap();
    let long_copy = manager.duplicate_task(long.id()).unwrap();
    assert_eq!(long_copy.title().chars().count(), 100);
    assert!(long_copy.title().ends_with(" (Copy)"));
}

#[test]
fn delete_returns_removed_task_and_clear_all_empties() {
    let mut manager = TaskManager::new(MemoryKeyValueStore::new());
    let first = manager.add_task("one", "", Priority::Low, Category::Work).unwrap();
    manager.add_task("two", "", Priority::Low, Category::Work).unwrap();

    let removed = manager.delete_task(first.id()).unwrap();
    assert_eq!(removed.id(), first.id());
    assert_eq!(titles(manager.tasks()), vec!["two"]);

    assert_eq!(manager.clear_all(), 1);
    assert!(manager.is_empty());
    assert!(manager.categories().is_empty());
}

#[test]
fn import_is_all_or_nothing() {
    let mut manager = TaskManager::new(MemoryKeyValueStore::new());
    manager.add_task("existing", "", Priority::Low, Category::Work).unwrap();

    let err = manager.import("{not json").unwrap_err();
    assert!(matches!(err, TaskError::Import(_)));

    let partly_bad = r#"[{"title":"fine"},{"title":"   "}]"#;
    let err = manager.import(partly_bad).unwrap_err();
    assert!(err.to_string().contains("record 2"));
    assert_eq!(titles(manager.tasks()), vec!["existing"]);

    let added = manager
        .import(r#"[{"title":"a","priority":"high"},{"title":"b","category":"Health"}]"#)
        .unwrap();
    assert_eq!(added, 2);
    assert_eq!(titles(manager.tasks()), vec!["existing", "a", "b"]);
    assert_eq!(manager.tasks()[2].category(), Category::Health);
}

#[test]
fn import_coerces_non_string_priority_and_category() {
    let mut manager = TaskManager::new(MemoryKeyValueStore::new());

    let added = manager
        .import(
            r#"[
                {"title":"a","priority":5,"category":42},
                {"title":"b","priority":null,"category":["Work"]}
            ]"#,
        )
        .unwrap();

    assert_eq!(added, 2);
    for task in manager.tasks() {
        assert_eq!(task.priority(), Priority::Medium);
        assert_eq!(task.category(), Category::Personal);
    }
}

#[test]
fn import_reassigns_colliding_ids() {
    let mut manager = TaskManager::new(MemoryKeyValueStore::new());
    manager.add_task("one", "", Priority::Low, Category::Work).unwrap();
    let exported = manager.export().unwrap();

    assert_eq!(manager.import(&exported).unwrap(), 1);
    assert_eq!(manager.len(), 2);
    assert_ne!(manager.tasks()[0].id(), manager.tasks()[1].id());
    assert!(manager.validate().is_valid());
}

#[test]
fn export_then_import_into_empty_manager_preserves_tasks() {
    let mut source = TaskManager::new(MemoryKeyValueStore::new());
    let task = source
        .add_task("Keep me", "with notes", Priority::High, Category::Education)
        .unwrap();
    source.complete_task(task.id()).unwrap();
    let payload = source.export().unwrap();

    let mut target = TaskManager::new(MemoryKeyValueStore::new());
    target.import(&payload).unwrap();
    assert_eq!(target.get_all(), source.get_all());
}

#[test]
fn categories_are_distinct_and_sorted_by_name() {
    let mut manager = TaskManager::new(MemoryKeyValueStore::new());
    manager.add_task("a", "", Priority::Low, Category::Work).unwrap();
    manager.add_task("b", "", Priority::Low, Category::Education).unwrap();
    manager.add_task("c", "", Priority::Low, Category::Work).unwrap();
    manager.add_task("d", "", Priority::Low, Category::Health).unwrap();

    assert_eq!(
        manager.categories(),
        vec![Category::Education, Category::Health, Category::Work]
    );
    assert_eq!(manager.tasks_by_category(Category::Work).len(), 2);
    assert_eq!(manager.tasks_by_priority(Priority::Low).len(), 4);
}

#[test]
fn state_survives_reload_from_same_store() {
    let store = MemoryKeyValueStore::new();
    let id = {
        let mut manager = TaskManager::new(&store);
        let task = manager.add_task("persist", "", Priority::High, Category::Urgent).unwrap();
        manager.complete_task(task.id()).unwrap();
        task.id().clone()
    };

    assert!(store.get_item(DEFAULT_NAMESPACE_KEY).unwrap().is_some());
    let reloaded = TaskManager::new(&store);
    assert!(reloaded.load_error().is_none());
    let task = reloaded.get_by_id(&id).unwrap();
    assert!(task.is_completed());
    assert_eq!(task.category(), Category::Urgent);
}

#[test]
fn namespaces_are_isolated() {
    let store = MemoryKeyValueStore::new();
    let mut work = TaskManager::with_namespace_key(&store, "work");
    work.add_task("work item", "", Priority::Low, Category::Work).unwrap();

    let home = TaskManager::with_namespace_key(&store, "home");
    assert!(home.is_empty());
    assert!(!home.info().has_saved_snapshot);
    assert!(work.info().has_saved_snapshot);
}

#[test]
fn corrupt_snapshot_loads_empty_with_diagnostic() {
    let store = MemoryKeyValueStore::new();
    store.set_item(DEFAULT_NAMESPACE_KEY, "[{\"title\":").unwrap();

    let mut manager = TaskManager::new(&store);
    assert!(manager.is_empty());
    assert!(matches!(manager.load_error(), Some(PersistenceError::Corrupt(_))));

    manager.add_task("fresh", "", Priority::Low, Category::Work).unwrap();
    assert_eq!(manager.load().unwrap(), 1);
    assert!(manager.load_error().is_none());
}

#[test]
fn reload_of_corrupted_store_records_load_error() {
    let store = MemoryKeyValueStore::new();
    let mut manager = TaskManager::new(&store);
    manager.add_task("keep", "", Priority::Low, Category::Work).unwrap();
    assert!(manager.load_error().is_none());

    store.set_item(DEFAULT_NAMESPACE_KEY, "{corrupt").unwrap();
    let err = manager.load().unwrap_err();
    assert!(matches!(err, PersistenceError::Corrupt(_)));

    assert!(manager.is_empty());
    assert!(matches!(manager.load_error(), Some(PersistenceError::Corrupt(_))));
}

#[test]
fn write_failures_do_not_fail_mutations() {
    let store = FlakyStore::default();
    let mut manager = TaskManager::new(&store);
    manager.add_task("saved", "", Priority::Low, Category::Work).unwrap();
    assert!(manager.last_persistence_error().is_none());

    store.fail_writes.set(true);
    let task = manager.add_task("unsaved", "", Priority::Low, Category::Work).unwrap();
    assert_eq!(manager.len(), 2);
    assert_eq!(manager.get_by_id(task.id()).unwrap().title(), "unsaved");
    assert!(matches!(
        manager.last_persistence_error(),
        Some(PersistenceError::Store(StoreError::Unavailable(_)))
    ));
    let err = manager.persist().unwrap_err();
    assert!(matches!(err, PersistenceError::Store(_)));

    store.fail_writes.set(false);
    manager.persist().unwrap();
    assert!(manager.last_persistence_error().is_none());
    assert_eq!(TaskManager::new(&store).len(), 2);
}

#[test]
fn validate_flags_problems_by_position() {
    let store = MemoryKeyValueStore::new();
    let long_description = "d".repeat(501);
    let snapshot = format!(
        r#"[{{"id":"task_a","title":"first"}},{{"id":"task_a","title":"second","description":"{long_description}"}}]"#
    );
    store.set_item(DEFAULT_NAMESPACE_KEY, &snapshot).unwrap();

    let manager = TaskManager::new(&store);
    let report = manager.validate();
    assert_eq!(
        report.errors,
        vec![
            "Duplicate task ID found: task_a".to_string(),
            "Task 2: Description cannot exceed 500 characters".to_string(),
        ]
    );
    assert!(!manager.info().is_valid);
}

#[test]
fn sqlite_store_backs_manager_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("qtask.sqlite3");

    {
        let conn = open_db(&path).unwrap();
        let store = SqliteKeyValueStore::try_new(&conn).unwrap();
        let mut manager = TaskManager::new(store);
        manager.add_task("durable", "", Priority::Medium, Category::Work).unwrap();
        assert!(manager.last_persistence_error().is_none());
    }

    let conn = open_db(&path).unwrap();
    let store = SqliteKeyValueStore::try_new(&conn).unwrap();
    let manager = TaskManager::new(store);
    assert_eq!(titles(manager.tasks()), vec!["durable"]);
    assert_eq!(manager.info().total_tasks, 1);
}

#[test]
fn info_reports_version_and_statistics() {
    let conn = open_db_in_memory().unwrap();
    let mut manager = TaskManager::new(SqliteKeyValueStore::try_new(&conn).unwrap());
    manager.add_task("one", "", Priority::High, Category::Work).unwrap();

    let info = manager.info();
    assert_eq!(info.version, qtask_core::core_version());
    assert!(info.is_valid);
    assert_eq!(info.categories, vec![Category::Work]);
    assert_eq!(info.statistics.total, 1);

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["totalTasks"], 1);
    assert_eq!(json["statistics"]["completionRate"], 0);
    assert_eq!(json["statistics"]["categories"]["Work"], 1);
}

// Task store: the authoritative task list, its mutations and filtered view

use crate::filter::{FilterMode, ViewQuery};
use crate::models::{Priority, Task, TaskId, new_id};
use crate::persistence::Persistence;
use chrono::NaiveDate;
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Where `add` places new tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertOrder {
    /// New tasks go last
    #[default]
    Append,
    /// New tasks go first
    Prepend,
}

/// Task totals by completion state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

/// Owns the task list and writes it through to a `Persistence` backend
///
/// Every mutation addresses tasks by id. Mutations that change nothing
/// (blank text, unknown id) are silent no-ops returning `Ok(None)` and do
/// not write. A failed write returns `Err`, but the in-memory change is
/// kept: memory stays authoritative and the next write resends the full list.
pub struct TaskStore<P: Persistence> {
    tasks: Vec<Task>,
    query: ViewQuery,
    order: InsertOrder,
    persistence: P,
    synced: bool,
    load_error: Option<eyre::Report>,
}

impl<P: Persistence> TaskStore<P> {
    /// Build a store on top of `persistence`, loading its list once
    pub fn open(persistence: P) -> Self {
        Self::with_order(persistence, InsertOrder::default())
    }

    pub fn with_order(persistence: P, order: InsertOrder) -> Self {
        let mut store = Self {
            tasks: Vec::new(),
            query: ViewQuery::default(),
            order,
            persistence,
            synced: true,
            load_error: None,
        };
        store.on_init();
        store
    }

    // ========================================================================
    // Lifecycle hooks
    // ========================================================================

    /// Load once; fall back to an empty list on absent or unreadable data
    fn on_init(&mut self) {
        let loaded = match self.persistence.load() {
            Ok(Some(tasks)) => tasks,
            Ok(None) => {
                debug!("No stored task list, starting empty");
                Vec::new()
            }
            Err(e) => {
                warn!(error = ?e, "Failed to load task list, starting empty");
                self.load_error = Some(e);
                return;
            }
        };

        let (tasks, repaired) = repair(loaded);
        info!(count = tasks.len(), repaired, "Task store initialized");
        self.tasks = tasks;

        if repaired > 0 {
            // Write the repaired ids back so they stay stable
            if let Err(e) = self.on_after_mutation() {
                warn!(error = ?e, "Failed to persist repaired task list");
            }
        }
    }

    /// Write the full list through to storage
    fn on_after_mutation(&mut self) -> Result<()> {
        match self.persistence.save(&self.tasks) {
            Ok(()) => {
                self.synced = true;
                Ok(())
            }
            Err(e) => {
                self.synced = false;
                warn!(error = ?e, count = self.tasks.len(), "Failed to persist task list");
                Err(e.wrap_err("Task list changed in memory but could not be saved"))
            }
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create a task. Blank text is a no-op.
    pub fn add(&mut self, text: &str, priority: Priority, due_date: Option<NaiveDate>) -> Result<Option<Task>> {
        let text = text.trim();
        if text.is_empty() {
            debug!("add: blank text, ignoring");
            return Ok(None);
        }

        let task = Task::new(text, priority, due_date);
        match self.order {
            InsertOrder::Append => self.tasks.push(task.clone()),
            InsertOrder::Prepend => self.tasks.insert(0, task.clone()),
        }
        debug!(id = %task.id, "add: created task");

        self.on_after_mutation()?;
        Ok(Some(task))
    }

    /// Flip `completed` on the task with `id`
    pub fn toggle_completed(&mut self, id: &str) -> Result<Option<Task>> {
        self.modify(id, |task| {
            task.completed = !task.completed;
            true
        })
    }

    /// Replace the text of the task with `id`. Blank text is rejected like in `add`.
    pub fn edit_text(&mut self, id: &str, new_text: &str) -> Result<Option<Task>> {
        let new_text = new_text.trim();
        if new_text.is_empty() {
            debug!(id, "edit_text: blank text, ignoring");
            return Ok(None);
        }
        self.modify(id, |task| {
            if task.text == new_text {
                return false;
            }
            task.text = new_text.to_string();
            true
        })
    }

    pub fn set_priority(&mut self, id: &str, priority: Priority) -> Result<Option<Task>> {
        self.modify(id, |task| {
            let changed = task.priority != priority;
            task.priority = priority;
            changed
        })
    }

    pub fn set_due_date(&mut self, id: &str, due_date: Option<NaiveDate>) -> Result<Option<Task>> {
        self.modify(id, |task| {
            let changed = task.due_date != due_date;
            task.due_date = due_date;
            changed
        })
    }

    /// Remove the task with `id`, returning it
    pub fn remove(&mut self, id: &str) -> Result<Option<Task>> {
        let Some(pos) = self.position(id) else {
            debug!(id, "remove: no such task");
            return Ok(None);
        };

        let removed = self.tasks.remove(pos);
        self.on_after_mutation()?;
        Ok(Some(removed))
    }

    /// Remove every completed task, returning how many were removed
    pub fn clear_completed(&mut self) -> Result<usize> {
        let before = self.tasks.len();
        self.tasks.retain(|task| !task.completed);
        let removed = before - self.tasks.len();

        if removed > 0 {
            self.on_after_mutation()?;
        }
        Ok(removed)
    }

    /// Retry the write after a failed save
    pub fn flush(&mut self) -> Result<()> {
        self.on_after_mutation()
    }

    /// Apply `change` to the task with `id`; `change` returns whether anything changed
    fn modify<F>(&mut self, id: &str, change: F) -> Result<Option<Task>>
    where
        F: FnOnce(&mut Task) -> bool,
    {
        let Some(pos) = self.position(id) else {
            debug!(id, "modify: no such task");
            return Ok(None);
        };

        let task = &mut self.tasks[pos];
        if !change(task) {
            return Ok(Some(task.clone()));
        }
        task.touch();
        let updated = task.clone();

        self.on_after_mutation()?;
        Ok(Some(updated))
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == id)
    }

    // ========================================================================
    // Selection state
    // ========================================================================

    pub fn set_filter(&mut self, mode: FilterMode) {
        self.query.mode = mode;
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.query.set_search(query);
    }

    pub fn filter(&self) -> FilterMode {
        self.query.mode
    }

    pub fn search_query(&self) -> &str {
        self.query.search()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Tasks passing the current filter mode and search query, in list order
    ///
    /// Recomputed on every call; nothing is cached.
    pub fn view(&self) -> impl Iterator<Item = &Task> + '_ {
        self.tasks.iter().filter(|task| self.query.matches(task))
    }

    /// The full list in display order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Find the single task whose id starts with `prefix`
    ///
    /// An exact id match always wins. More than one prefix match is an error.
    pub fn resolve(&self, prefix: &str) -> Result<Option<&Task>> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(None);
        }
        if let Some(task) = self.get(prefix) {
            return Ok(Some(task));
        }

        let mut matches = self.tasks.iter().filter(|task| task.id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Ok(Some(task)),
            (None, _) => Ok(None),
            (Some(_), Some(_)) => Err(eyre!("Ambiguous task id prefix: {}", prefix)),
        }
    }

    pub fn counts(&self) -> Counts {
        let completed = self.tasks.iter().filter(|task| task.completed).count();
        Counts {
            total: self.tasks.len(),
            active: self.tasks.len() - completed,
            completed,
        }
    }

    /// Whether the last write reached storage
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Error from the initial load, if the store had to start empty because of it
    pub fn load_error(&self) -> Option<&eyre::Report> {
        self.load_error.as_ref()
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }
}

/// Restore list invariants on loaded data: every task gets an id, ids are unique,
/// and text is never blank. Returns the list and the number of records changed or dropped.
fn repair(loaded: Vec<Task>) -> (Vec<Task>, usize) {
    let mut seen: HashSet<TaskId> = HashSet::with_capacity(loaded.len());
    let mut tasks = Vec::with_capacity(loaded.len());
    let mut repaired = 0;

    for mut task in loaded {
        if task.text.trim().is_empty() {
            warn!(id = %task.id, "Dropping stored task with blank text");
            repaired += 1;
            continue;
        }
        if task.id.trim().is_empty() {
            task.id = new_id();
            debug!(id = %task.id, "Assigned id to legacy task");
            repaired += 1;
        } else if seen.contains(&task.id) {
            warn!(id = %task.id, "Dropping stored task with duplicate id");
            repaired += 1;
            continue;
        }
        seen.insert(task.id.clone());
        tasks.push(task);
    }

    (tasks, repaired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStorage;

    /// Storage whose writes can be switched to fail
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        fail_saves: bool,
        saves: usize,
    }

    impl Persistence for FlakyStorage {
        fn load(&self) -> Result<Option<Vec<Task>>> {
            self.inner.load()
        }

        fn save(&mut self, tasks: &[Task]) -> Result<()> {
            self.saves += 1;
            if self.fail_saves {
                return Err(eyre!("disk full"));
            }
            self.inner.save(tasks)
        }
    }

    fn new_store() -> TaskStore<MemoryStorage> {
        TaskStore::open(MemoryStorage::new())
    }

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn view_texts<P: Persistence>(store: &TaskStore<P>) -> Vec<String> {
        store.view().map(|t| t.text.clone()).collect()
    }

    #[test]
    fn test_add_increases_length_by_one() {
        let mut store = new_store();
        let task = store.add("Buy milk", Priority::High, None).unwrap().unwrap();

        assert_eq!(store.tasks().len(), 1);
        assert!(!task.completed);
        assert_eq!(store.get(&task.id), Some(&task));
    }

    #[test]
    fn test_add_blank_text_is_noop() {
        let mut store = TaskStore::open(FlakyStorage::default());

        assert!(store.add("   ", Priority::Normal, None).unwrap().is_none());
        assert!(store.add("", Priority::High, None).unwrap().is_none());
        assert!(store.tasks().is_empty());
        assert_eq!(store.persistence().saves, 0);
    }

    #[test]
    fn test_add_trims_text() {
        let mut store = new_store();
        let task = store.add("  Walk dog \n", Priority::Normal, None).unwrap().unwrap();
        assert_eq!(task.text, "Walk dog");
    }

    #[test]
    fn test_insert_order() {
        let mut store = new_store();
        store.add("first", Priority::Normal, None).unwrap();
        store.add("second", Priority::Normal, None).unwrap();
        assert_eq!(view_texts(&store), vec!["first", "second"]);

        let mut store = TaskStore::with_order(MemoryStorage::new(), InsertOrder::Prepend);
        store.add("first", Priority::Normal, None).unwrap();
        store.add("second", Priority::Normal, None).unwrap();
        assert_eq!(view_texts(&store), vec!["second", "first"]);
    }

    #[test]
    fn test_toggle_twice_restores_state() {
        let mut store = new_store();
        let task = store.add("Buy milk", Priority::Normal, None).unwrap().unwrap();

        let once = store.toggle_completed(&task.id).unwrap().unwrap();
        assert!(once.completed);
        let twice = store.toggle_completed(&task.id).unwrap().unwrap();
        assert!(!twice.completed);
        assert!(twice.updated_at >= task.updated_at);
    }

    #[test]
    fn test_unknown_id_is_noop() {
        let mut store = TaskStore::open(FlakyStorage::default());
        store.add("only", Priority::Normal, None).unwrap();
        let saves = store.persistence().saves;

        assert!(store.toggle_completed("missing").unwrap().is_none());
        assert!(store.edit_text("missing", "x").unwrap().is_none());
        assert!(store.remove("missing").unwrap().is_none());
        assert!(store.set_priority("missing", Priority::High).unwrap().is_none());
        assert!(store.set_due_date("missing", None).unwrap().is_none());

        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.persistence().saves, saves);
    }

    #[test]
    fn test_remove_by_id_with_duplicate_text() {
        let mut store = new_store();
        let a = store.add("same", Priority::Normal, None).unwrap().unwrap();
        let b = store.add("same", Priority::Normal, None).unwrap().unwrap();

        let removed = store.remove(&b.id).unwrap().unwrap();
        assert_eq!(removed.id, b.id);
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.tasks()[0].id, a.id);
    }

    #[test]
    fn test_mutation_by_id_under_active_filter() {
        // Positions in the filtered view differ from the backing list
        let mut store = new_store();
        let a = store.add("a", Priority::Normal, None).unwrap().unwrap();
        let b = store.add("b", Priority::Normal, None).unwrap().unwrap();
        store.toggle_completed(&a.id).unwrap();
        store.set_filter(FilterMode::Active);

        let first_visible = store.view().next().unwrap().id.clone();
        assert_eq!(first_visible, b.id);
        store.remove(&first_visible).unwrap();

        assert!(store.get(&a.id).is_some());
        assert!(store.get(&b.id).is_none());
    }

    #[test]
    fn test_edit_text() {
        let mut store = new_store();
        let task = store.add("Buy milk", Priority::Normal, None).unwrap().unwrap();

        let edited = store.edit_text(&task.id, " Buy oat milk ").unwrap().unwrap();
        assert_eq!(edited.id, task.id);
        assert_eq!(edited.text, "Buy oat milk");
    }

    #[test]
    fn test_edit_text_blank_is_rejected() {
        let mut store = new_store();
        let task = store.add("Buy milk", Priority::Normal, None).unwrap().unwrap();

        assert!(store.edit_text(&task.id, "   ").unwrap().is_none());
        assert_eq!(store.get(&task.id).unwrap().text, "Buy milk");
    }

    #[test]
    fn test_set_priority_and_due_date() {
        let mut store = new_store();
        let task = store.add("Pay rent", Priority::Normal, None).unwrap().unwrap();

        let task = store.set_priority(&task.id, Priority::High).unwrap().unwrap();
        assert_eq!(task.priority, Priority::High);

        let task = store.set_due_date(&task.id, date(2024, 2, 1)).unwrap().unwrap();
        assert_eq!(task.due_date, date(2024, 2, 1));

        let task = store.set_due_date(&task.id, None).unwrap().unwrap();
        assert_eq!(task.due_date, None);
    }

    #[test]
    fn test_unchanged_edit_does_not_write() {
        let mut store = TaskStore::open(FlakyStorage::default());
        let task = store.add("x", Priority::Low, None).unwrap().unwrap();
        let saves = store.persistence().saves;

        let same = store.set_priority(&task.id, Priority::Low).unwrap().unwrap();
        assert_eq!(same, task);
        store.edit_text(&task.id, "x").unwrap();
        assert_eq!(store.persistence().saves, saves);
    }

    #[test]
    fn test_clear_completed() {
        let mut store = new_store();
        let a = store.add("a", Priority::Normal, None).unwrap().unwrap();
        store.add("b", Priority::Normal, None).unwrap();
        let c = store.add("c", Priority::Normal, None).unwrap().unwrap();
        store.toggle_completed(&a.id).unwrap();
        store.toggle_completed(&c.id).unwrap();

        assert_eq!(store.clear_completed().unwrap(), 2);
        assert_eq!(view_texts(&store), vec!["b"]);
        assert_eq!(store.clear_completed().unwrap(), 0);
    }

    #[test]
    fn test_view_filter_modes() {
        let mut store = new_store();
        let a = store.add("a", Priority::Normal, None).unwrap().unwrap();
        store.add("b", Priority::Normal, None).unwrap();
        store.toggle_completed(&a.id).unwrap();

        store.set_filter(FilterMode::Active);
        assert!(store.view().all(|t| !t.completed));
        assert_eq!(view_texts(&store), vec!["b"]);

        store.set_filter(FilterMode::Completed);
        assert!(store.view().all(|t| t.completed));
        assert_eq!(view_texts(&store), vec!["a"]);

        store.set_filter(FilterMode::All);
        assert_eq!(store.view().count(), 2);
    }

    #[test]
    fn test_view_search_case_insensitive() {
        let mut store = new_store();
        store.add("Buy milk", Priority::Normal, None).unwrap();
        store.add("Walk dog", Priority::Normal, None).unwrap();

        store.set_search_query("mil");
        assert_eq!(view_texts(&store), vec!["Buy milk"]);
        store.set_search_query("MIL");
        assert_eq!(view_texts(&store), vec!["Buy milk"]);
        assert_eq!(store.search_query(), "MIL");

        store.set_search_query("");
        assert_eq!(store.view().count(), 2);
    }

    #[test]
    fn test_view_is_recomputed() {
        let mut store = new_store();
        store.add("one", Priority::Normal, None).unwrap();
        assert_eq!(store.view().count(), 1);
        assert_eq!(store.view().count(), 1);

        store.add("two", Priority::Normal, None).unwrap();
        assert_eq!(store.view().count(), 2);
    }

    #[test]
    fn test_selection_state_does_not_write() {
        let mut store = TaskStore::open(FlakyStorage::default());
        store.set_filter(FilterMode::Completed);
        store.set_search_query("x");
        assert_eq!(store.filter(), FilterMode::Completed);
        assert_eq!(store.persistence().saves, 0);
    }

    #[test]
    fn test_scenario_filter_after_toggle() {
        let mut store = new_store();
        let milk = store.add("Buy milk", Priority::High, date(2024, 1, 1)).unwrap().unwrap();
        let dog = store.add("Walk dog", Priority::Normal, None).unwrap().unwrap();
        store.toggle_completed(&milk.id).unwrap();

        store.set_filter(FilterMode::Active);
        let active: Vec<&str> = store.view().map(|t| t.id.as_str()).collect();
        assert_eq!(active, vec![dog.id.as_str()]);

        store.set_filter(FilterMode::Completed);
        let completed: Vec<&str> = store.view().map(|t| t.id.as_str()).collect();
        assert_eq!(completed, vec![milk.id.as_str()]);
    }

    #[test]
    fn test_every_mutation_writes_through() {
        let mut store = new_store();
        let task = store.add("Buy milk", Priority::High, date(2024, 1, 1)).unwrap().unwrap();
        store.toggle_completed(&task.id).unwrap();

        let reopened = TaskStore::open(store.persistence().clone());
        assert_eq!(reopened.tasks(), store.tasks());

        store.remove(&task.id).unwrap();
        let reopened = TaskStore::open(store.persistence().clone());
        assert!(reopened.tasks().is_empty());
        assert!(reopened.load_error().is_none());
    }

    #[test]
    fn test_malformed_storage_starts_empty() {
        let store = TaskStore::open(MemoryStorage::with_raw("not json at all"));
        assert!(store.tasks().is_empty());
        assert!(store.load_error().is_some());
    }

    #[test]
    fn test_failed_save_keeps_memory_authoritative() {
        let mut store = TaskStore::open(FlakyStorage::default());
        store.persistence.fail_saves = true;

        let result = store.add("Buy milk", Priority::Normal, None);
        assert!(result.is_err());
        assert_eq!(store.tasks().len(), 1);
        assert!(!store.is_synced());

        store.persistence.fail_saves = false;
        store.flush().unwrap();
        assert!(store.is_synced());
        assert_eq!(store.persistence().inner.load().unwrap().unwrap().len(), 1);
    }

    #[test]
    fn test_legacy_records_get_ids_and_are_written_back() {
        let raw = r#"[{"text":"Buy milk","completed":false,"dueDate":"","priority":"high"},
                      {"text":"Walk dog","completed":true,"dueDate":"","priority":"normal"}]"#;
        let store = TaskStore::open(MemoryStorage::with_raw(raw));

        assert_eq!(store.tasks().len(), 2);
        assert!(store.tasks().iter().all(|t| !t.id.is_empty()));
        assert_ne!(store.tasks()[0].id, store.tasks()[1].id);

        // Stored copy now carries the same ids
        let stored = store.persistence().load().unwrap().unwrap();
        assert_eq!(stored, store.tasks());
    }

    #[test]
    fn test_duplicate_and_blank_records_are_dropped_on_load() {
        let raw = r#"[{"id":"a","text":"first"},{"id":"a","text":"dup"},{"id":"b","text":"  "}]"#;
        let store = TaskStore::open(MemoryStorage::with_raw(raw));

        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.tasks()[0].text, "first");
    }

    #[test]
    fn test_resolve_prefix() {
        let raw = r#"[{"id":"abc123","text":"one"},{"id":"abd456","text":"two"}]"#;
        let store = TaskStore::open(MemoryStorage::with_raw(raw));

        assert_eq!(store.resolve("abc").unwrap().unwrap().text, "one");
        assert_eq!(store.resolve("abd456").unwrap().unwrap().text, "two");
        assert!(store.resolve("zzz").unwrap().is_none());
        assert!(store.resolve("").unwrap().is_none());
        assert!(store.resolve("ab").is_err());
    }

    #[test]
    fn test_counts() {
        let mut store = new_store();
        let a = store.add("a", Priority::Normal, None).unwrap().unwrap();
        store.add("b", Priority::Normal, None).unwrap();
        store.toggle_completed(&a.id).unwrap();

        assert_eq!(
            store.counts(),
            Counts {
                total: 2,
                active: 1,
                completed: 1
            }
        );
    }
}

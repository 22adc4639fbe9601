// Load/save contract between the task store and a storage backend

use crate::models::Task;
use eyre::{Context, Result};
use tracing::debug;

/// Default storage slot name
pub const DEFAULT_SLOT: &str = "tasks";

/// Durable storage for the whole task list
///
/// The list is always written in full; there is no delta persistence.
pub trait Persistence {
    /// Read the stored list. `Ok(None)` means nothing has been stored yet.
    fn load(&self) -> Result<Option<Vec<Task>>>;

    /// Replace the stored list with `tasks`
    fn save(&mut self, tasks: &[Task]) -> Result<()>;
}

impl<P: Persistence + ?Sized> Persistence for Box<P> {
    fn load(&self) -> Result<Option<Vec<Task>>> {
        (**self).load()
    }

    fn save(&mut self, tasks: &[Task]) -> Result<()> {
        (**self).save(tasks)
    }
}

/// Serialize a list into the slot representation (one JSON array)
pub fn encode_tasks(tasks: &[Task]) -> Result<String> {
    serde_json::to_string(tasks).context("Failed to serialize task list")
}

/// Parse the slot representation. Malformed data is an error, never a partial list.
pub fn decode_tasks(raw: &str) -> Result<Vec<Task>> {
    let tasks: Vec<Task> = serde_json::from_str(raw).context("Failed to parse stored task list")?;
    debug!(count = tasks.len(), "Decoded task list");
    Ok(tasks)
}

/// Keeps the serialized slot in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Option<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an arbitrary raw slot value (possibly malformed)
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self { slot: Some(raw.into()) }
    }

    pub fn raw(&self) -> Option<&str> {
        self.slot.as_deref()
    }
}

impl Persistence for MemoryStorage {
    fn load(&self) -> Result<Option<Vec<Task>>> {
        self.slot.as_deref().map(decode_tasks).transpose()
    }

    fn save(&mut self, tasks: &[Task]) -> Result<()> {
        self.slot = Some(encode_tasks(tasks)?);
        Ok(())
    }
}

// TaskList - To-do list with filtering, search and pluggable local persistence

pub mod config;
pub mod file;
pub mod filter;
pub mod models;
pub mod persistence;
pub mod sqlite;
pub mod store;

// Re-export main types for convenience
pub use config::{Backend, Config};
pub use file::FileStorage;
pub use filter::{FilterMode, ViewQuery};
pub use models::{Priority, Task, TaskId, now_ms};
pub use persistence::{MemoryStorage, Persistence};
pub use sqlite::SqliteStorage;
pub use store::{Counts, InsertOrder, TaskStore};

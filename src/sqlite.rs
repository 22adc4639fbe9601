// SQLite storage: slots held as rows of a key/value table

use crate::models::{Task, now_ms};
use crate::persistence::{DEFAULT_SLOT, Persistence, decode_tasks, encode_tasks};
use eyre::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Database filename inside the storage directory
pub const DB_FILENAME: &str = "tasklist.db";

/// Stores each slot as one row of `slots(name, value, updated_at)`
pub struct SqliteStorage {
    db: Connection,
    slot: String,
}

impl SqliteStorage {
    /// Open or create `<dir>/tasklist.db` and bind to `slot`
    pub fn open<P: AsRef<Path>>(dir: P, slot: &str) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).context("Failed to create storage directory")?;

        let db_path = dir.join(DB_FILENAME);
        let db = Connection::open(&db_path).context("Failed to open SQLite database")?;
        info!(path = ?db_path, slot, "Opened SQLite storage");

        Self::with_connection(db, slot)
    }

    /// Storage backed by a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Self::with_connection(db, DEFAULT_SLOT)
    }

    fn with_connection(db: Connection, slot: &str) -> Result<Self> {
        let storage = Self {
            db,
            slot: slot.to_string(),
        };
        storage.create_schema()?;
        Ok(storage)
    }

    /// Get a reference to the SQLite database connection
    pub fn db(&self) -> &Connection {
        &self.db
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating database schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS slots (
                name TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }
}

impl Persistence for SqliteStorage {
    fn load(&self) -> Result<Option<Vec<Task>>> {
        let raw: Option<String> = self
            .db
            .query_row("SELECT value FROM slots WHERE name = ?1", [&self.slot], |row| row.get(0))
            .optional()
            .context("Failed to read slot from database")?;

        match raw {
            Some(json) => {
                let tasks = decode_tasks(&json)?;
                info!(slot = %self.slot, count = tasks.len(), "Loaded task list");
                Ok(Some(tasks))
            }
            None => Ok(None),
        }
    }

    fn save(&mut self, tasks: &[Task]) -> Result<()> {
        let json = encode_tasks(tasks)?;

        self.db
            .execute(
                "INSERT OR REPLACE INTO slots (name, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![&self.slot, json, now_ms()],
            )
            .context("Failed to write slot to database")?;

        debug!(slot = %self.slot, count = tasks.len(), "Saved task list");
        Ok(())
    }
}

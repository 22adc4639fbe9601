// JSON file storage: one file per slot, replaced atomically on save

use crate::models::Task;
use crate::persistence::{Persistence, decode_tasks, encode_tasks};
use eyre::{Context, Result, eyre};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Stores the slot at `<dir>/<slot>.json`
///
/// Readers take a shared lock and writers an exclusive lock on `<dir>/<slot>.lock`,
/// so concurrent CLI invocations never observe a half-written list.
pub struct FileStorage {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileStorage {
    /// Open (creating the directory if needed) the slot `slot` under `dir`
    pub fn open<P: AsRef<Path>>(dir: P, slot: &str) -> Result<Self> {
        let dir = dir.as_ref();
        validate_slot_name(slot)?;

        fs::create_dir_all(dir).context("Failed to create storage directory")?;

        let storage = Self {
            path: dir.join(format!("{}.json", slot)),
            lock_path: dir.join(format!("{}.lock", slot)),
        };
        debug!(path = ?storage.path, "Opened file storage");
        Ok(storage)
    }

    /// Path of the slot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_file(&self) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .context("Failed to open lock file")
    }
}

impl Persistence for FileStorage {
    fn load(&self) -> Result<Option<Vec<Task>>> {
        let lock = self.lock_file()?;
        lock.lock_shared().context("Failed to acquire shared file lock")?;

        if !self.path.exists() {
            // Nothing saved yet
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path).with_context(|| format!("Failed to read {}", self.path.display()))?;
        let tasks = decode_tasks(&raw)?;

        info!(file = ?self.path, count = tasks.len(), "Loaded task list");
        // Lock is released when `lock` is dropped
        Ok(Some(tasks))
    }

    fn save(&mut self, tasks: &[Task]) -> Result<()> {
        let json = encode_tasks(tasks)?;

        let lock = self.lock_file()?;
        lock.lock_exclusive().context("Failed to acquire file lock")?;

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut tmp = File::create(&tmp_path).context("Failed to create temporary slot file")?;
            tmp.write_all(json.as_bytes())?;
            tmp.sync_all()?; // Ensure data is flushed to disk before the rename
        }
        fs::rename(&tmp_path, &self.path).context("Failed to replace slot file")?;

        debug!(file = ?self.path, count = tasks.len(), "Saved task list");
        Ok(())
    }
}

fn validate_slot_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(eyre!("Slot name cannot be empty"));
    }
    if name.len() > 64 {
        return Err(eyre!("Slot name too long: {} (max 64 chars)", name));
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(eyre!("Invalid slot name: {} (must be alphanumeric with _/-)", name));
    }
    Ok(())
}

//! Demo 01: Basic Usage
//!
//! Adds, completes, filters, searches and deletes tasks with a file-backed
//! store, then reopens the store to show the list was written through.
//!
//! Run with: cargo run --example 01_basic_usage

use chrono::NaiveDate;
use eyre::Result;
use tasklist::{FileStorage, FilterMode, Priority, TaskStore};

fn main() -> Result<()> {
    // Create a temporary directory for this demo
    let temp_dir = tempfile::tempdir()?;
    let store_path = temp_dir.path().to_path_buf();

    println!("TaskList Basic Usage Demo");
    println!("=========================\n");
    println!("Store path: {}\n", store_path.display());

    let mut store = TaskStore::open(FileStorage::open(&store_path, "tasks")?);

    println!("1. ADD");
    let milk = store
        .add("Buy milk", Priority::High, NaiveDate::from_ymd_opt(2024, 1, 1))?
        .ok_or_else(|| eyre::eyre!("task text was blank"))?;
    store.add("Walk dog", Priority::Normal, None)?;
    let ignored = store.add("   ", Priority::Normal, None)?;
    println!("   {} tasks, blank add ignored: {}\n", store.tasks().len(), ignored.is_none());

    println!("2. TOGGLE - completing \"{}\"", milk.text);
    store.toggle_completed(&milk.id)?;

    println!("3. FILTER");
    for mode in [FilterMode::All, FilterMode::Active, FilterMode::Completed] {
        store.set_filter(mode);
        let texts: Vec<&str> = store.view().map(|t| t.text.as_str()).collect();
        println!("   {:<9} -> {:?}", mode.as_str(), texts);
    }
    println!();

    println!("4. SEARCH - \"DOG\"");
    store.set_filter(FilterMode::All);
    store.set_search_query("DOG");
    let texts: Vec<&str> = store.view().map(|t| t.text.as_str()).collect();
    println!("   {:?}\n", texts);

    println!("5. REOPEN");
    let reopened = TaskStore::open(FileStorage::open(&store_path, "tasks")?);
    println!("   {} tasks loaded from disk\n", reopened.tasks().len());

    println!("6. DELETE");
    store.remove(&milk.id)?;
    println!("   {} task left", store.tasks().len());

    Ok(())
}

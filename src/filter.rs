// View filtering: completion mode composed with a text search

use crate::models::Task;
use std::fmt;
use std::str::FromStr;

/// Which tasks a view shows, by completion state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterMode {
    #[default]
    All,
    Active,
    Completed,
}

impl FilterMode {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Active => !task.completed,
            FilterMode::Completed => task.completed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMode::All => "all",
            FilterMode::Active => "active",
            FilterMode::Completed => "completed",
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(FilterMode::All),
            "active" => Ok(FilterMode::Active),
            "completed" | "done" => Ok(FilterMode::Completed),
            other => Err(format!("Invalid filter: {} (expected all, active or completed)", other)),
        }
    }
}

/// UI selection state applied by `TaskStore::view`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewQuery {
    pub mode: FilterMode,
    /// Case-insensitive substring; empty matches everything.
    search: String,
    /// Lowercased copy of `search`, computed once per change.
    needle: String,
}

impl ViewQuery {
    pub fn new(mode: FilterMode, search: impl Into<String>) -> Self {
        let mut query = Self { mode, ..Self::default() };
        query.set_search(search);
        query
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
        self.needle = self.search.to_lowercase();
    }

    /// Mode first, then search
    pub fn matches(&self, task: &Task) -> bool {
        self.mode.matches(task) && (self.needle.is_empty() || task.text.to_lowercase().contains(&self.needle))
    }
}

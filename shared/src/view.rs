//! Derived view state: which tasks are visible and the summary counts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::models::Task;

pub const EMPTY_PLACEHOLDER: &str = "No tasks found. Add one to get started!";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

impl Filter {
    pub const ALL: [Filter; 3] = [Filter::All, Filter::Active, Filter::Completed];

    pub fn matches(self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !task.completed,
            Filter::Completed => task.completed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Filter::All => "all",
            Filter::Active => "active",
            Filter::Completed => "completed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Filter::All => "All",
            Filter::Active => "Active",
            Filter::Completed => "Completed",
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Filter::All),
            "active" => Ok(Filter::Active),
            "completed" => Ok(Filter::Completed),
            other => Err(format!("unknown filter: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

/// Tasks passing `filter` and containing `search` (case-insensitive) in the
/// title or description, in cache order.
pub fn compute_visible<'a>(tasks: &'a [Task], filter: Filter, search: &str) -> Vec<&'a Task> {
    let needle = search.to_lowercase();
    tasks
        .iter()
        .filter(|task| filter.matches(task))
        .filter(|task| needle.is_empty() || matches_search(task, &needle))
        .collect()
}

fn matches_search(task: &Task, needle: &str) -> bool {
    task.title.to_lowercase().contains(needle)
        || task
            .description()
            .is_some_and(|description| description.to_lowercase().contains(needle))
}

pub fn compute_stats(tasks: &[Task]) -> Stats {
    let total = tasks.len();
    let completed = tasks.iter().filter(|task| task.completed).count();
    Stats {
        total,
        active: total - completed,
        completed,
    }
}

pub fn status_label(task: &Task) -> &'static str {
    if task.completed {
        "Completed"
    } else {
        "In Progress"
    }
}

/// Human-friendly age of a timestamp: "Today", "Yesterday", "3 days ago",
/// then a calendar date such as "Mar 1, 2024".
pub fn relative_date(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    match (now - at).num_days().abs() {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        days @ 2..=6 => format!("{days} days ago"),
        _ => at.format("%b %-d, %Y").to_string(),
    }
}

/// Uppercased first character of a username, for the avatar badge.
pub fn avatar_initial(username: &str) -> String {
    username
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_default()
}

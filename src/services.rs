use std::cmp::Ordering;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    expense::Expense, project::Project, store::Store, task::Task, time_entry::TimeEntry,
};

pub mod expenses;
pub mod projects;
pub mod settings;
pub mod tasks;
pub mod timers;

/// Shortest id prefix accepted as a reference
const MIN_ID_PREFIX: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("'{0}' not found")]
    NotFound(String),

    #[error("'{query}' is ambiguous. Multiple matches found: {}", .names.join(", "))]
    Ambiguous { query: String, names: Vec<String> },
}

/// Resolves a user reference against a list of named records.
///
/// An exact id wins, then a unique id prefix, then a unique case-insensitive
/// name fragment. An exact (case-insensitive) name beats fragment matches.
fn resolve<'a, T>(
    items: &'a [T],
    query: &str,
    id: impl Fn(&T) -> Uuid,
    name: impl Fn(&T) -> &str,
) -> Result<&'a T, LookupError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(LookupError::NotFound(query.to_string()));
    }

    if let Ok(uuid) = Uuid::parse_str(query) {
        return items
            .iter()
            .find(|item| id(item) == uuid)
            .ok_or_else(|| LookupError::NotFound(query.to_string()));
    }

    let needle = query.to_lowercase();

    if needle.len() >= MIN_ID_PREFIX && needle.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        let by_prefix: Vec<&T> = items
            .iter()
            .filter(|item| id(item).to_string().starts_with(&needle))
            .collect();
        if by_prefix.len() == 1 {
            return Ok(by_prefix[0]);
        }
    }

    if let Some(exact) = items.iter().find(|item| name(item).to_lowercase() == needle) {
        return Ok(exact);
    }

    let matching: Vec<&T> = items
        .iter()
        .filter(|item| name(item).to_lowercase().contains(&needle))
        .collect();

    match matching.len() {
        0 => Err(LookupError::NotFound(query.to_string())),
        1 => Ok(matching[0]),
        _ => Err(LookupError::Ambiguous {
            query: query.to_string(),
            names: matching.iter().map(|item| name(item).to_string()).collect(),
        }),
    }
}

pub fn resolve_project<'a>(store: &'a Store, query: &str) -> Result<&'a Project, LookupError> {
    resolve(&store.projects, query, |p| p.id, |p| p.name.as_str())
}

pub fn resolve_task<'a>(store: &'a Store, query: &str) -> Result<&'a Task, LookupError> {
    resolve(&store.tasks, query, |t| t.id, |t| t.name.as_str())
}

/// Expenses are named by their item label
pub fn resolve_expense<'a>(store: &'a Store, query: &str) -> Result<&'a Expense, LookupError> {
    resolve(&store.expenses, query, |e| e.id, |e| e.item.as_str())
}

/// Time entries have no name, so only ids and id prefixes resolve
pub fn resolve_time_entry<'a>(store: &'a Store, query: &str) -> Result<&'a TimeEntry, LookupError> {
    resolve(&store.time_entries, query, |e| e.id, |_| "")
        .map_err(|_| LookupError::NotFound(query.trim().to_string()))
}

//! Whole-store export and import, optionally password protected.

use clap::ValueEnum;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    crypto::{self, CryptoError, Envelope},
    events::{Event, EventBus},
    models::{
        expense::Expense, project::Project, settings::Settings, store::Store, task::Task,
        time_entry::TimeEntry,
    },
    storage::{Storage, StorageError, migrations::normalize_legacy_ids},
};

pub const EXPORT_FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("{0}")]
    Crypto(#[from] CryptoError),

    #[error("This file is encrypted, a password is required")]
    PasswordRequired,

    #[error("Invalid backup file: {0}")]
    InvalidFormat(String),

    #[error("Failed to serialize export: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportDocument<'a> {
    projects: &'a [Project],
    tasks: &'a [Task],
    expenses: &'a [Expense],
    time_entries: &'a [TimeEntry],
    settings: &'a Settings,
    export_date: Timestamp,
    version: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportDocument {
    projects: Option<Vec<Project>>,
    tasks: Option<Vec<Task>>,
    expenses: Option<Vec<Expense>>,
    time_entries: Option<Vec<TimeEntry>>,
    settings: Option<Settings>,
}

pub struct ExportParameters<'p> {
    /// Encrypts the export when set
    pub password: Option<&'p str>,
    pub iterations: u32,
    pub now: Timestamp,
}

/// Serializes the store as pretty JSON, or as an encrypted envelope
pub fn export_data(
    store: &Store,
    events: &mut EventBus,
    parameters: ExportParameters,
) -> Result<String, BackupError> {
    let document = ExportDocument {
        projects: &store.projects,
        tasks: &store.tasks,
        expenses: &store.expenses,
        time_entries: &store.time_entries,
        settings: &store.settings,
        export_date: parameters.now,
        version: EXPORT_FORMAT_VERSION,
    };
    let json = serde_json::to_string_pretty(&document).map_err(BackupError::Serialize)?;

    let output = match parameters.password {
        Some(password) => {
            let envelope = crypto::encrypt_with_iterations(&json, password, parameters.iterations)?;
            serde_json::to_string_pretty(&envelope).map_err(BackupError::Serialize)?
        }
        None => json,
    };

    let encrypted = parameters.password.is_some();
    tracing::info!(
        encrypted,
        projects = store.projects.len(),
        tasks = store.tasks.len(),
        expenses = store.expenses.len(),
        "data exported"
    );
    events.publish(Event::DataExported { encrypted });

    Ok(output)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ImportMode {
    /// Replace every collection present in the file
    #[default]
    Overwrite,
    /// Add new records and replace those with a matching id
    Merge,
}

pub struct ImportParameters<'p> {
    pub content: &'p str,
    pub password: Option<&'p str>,
    pub mode: ImportMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub projects: usize,
    pub tasks: usize,
    pub expenses: usize,
    pub time_entries: usize,
}

fn parse_document(content: &str, password: Option<&str>) -> Result<ImportDocument, BackupError> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| BackupError::InvalidFormat(e.to_string()))?;

    let mut value = if crypto::is_encrypted(content) {
        let envelope: Envelope = serde_json::from_value(value)
            .map_err(|e| BackupError::InvalidFormat(e.to_string()))?;
        let password = password.ok_or(BackupError::PasswordRequired)?;
        let plaintext = crypto::decrypt(&envelope, password)?;
        serde_json::from_str(&plaintext).map_err(|e| BackupError::InvalidFormat(e.to_string()))?
    } else {
        value
    };

    let has_collection = ["projects", "tasks", "expenses"]
        .iter()
        .any(|key| value.get(key).is_some_and(serde_json::Value::is_array));
    if !has_collection {
        return Err(BackupError::InvalidFormat(String::from(
            "expected at least one of projects, tasks or expenses",
        )));
    }

    normalize_legacy_ids(&mut value);
    serde_json::from_value(value).map_err(|e| BackupError::InvalidFormat(e.to_string()))
}

trait Identified {
    fn id(&self) -> Uuid;
}

impl Identified for Project {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Identified for Task {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Identified for Expense {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Identified for TimeEntry {
    fn id(&self) -> Uuid {
        self.id
    }
}

fn upsert<T: Identified>(existing: &mut Vec<T>, incoming: Vec<T>) {
    for item in incoming {
        match existing.iter_mut().find(|e| e.id() == item.id()) {
            Some(slot) => *slot = item,
            None => existing.push(item),
        }
    }
}

fn apply<T: Identified>(existing: &mut Vec<T>, incoming: Option<Vec<T>>, mode: ImportMode) -> usize {
    let Some(incoming) = incoming else {
        return 0;
    };
    let count = incoming.len();
    match mode {
        ImportMode::Overwrite => *existing = incoming,
        ImportMode::Merge => upsert(existing, incoming),
    }
    count
}

/// Reads an export produced by [`export_data`]. Nothing is changed unless
/// the whole file parses.
pub fn import_data(
    store: &mut Store,
    storage: &impl Storage,
    events: &mut EventBus,
    parameters: ImportParameters,
) -> Result<ImportSummary, BackupError> {
    let document = parse_document(parameters.content, parameters.password)?;
    let mode = parameters.mode;

    let summary = ImportSummary {
        projects: apply(&mut store.projects, document.projects, mode),
        tasks: apply(&mut store.tasks, document.tasks, mode),
        expenses: apply(&mut store.expenses, document.expenses, mode),
        time_entries: apply(&mut store.time_entries, document.time_entries, mode),
    };

    if mode == ImportMode::Overwrite {
        if let Some(settings) = document.settings {
            store.settings = settings;
        }
        let tasks: Vec<Uuid> = store.tasks.iter().map(|t| t.id).collect();
        store.active_timers.retain(|t| tasks.contains(&t.task_id));
    }

    storage.save(store)?;

    tracing::info!(
        mode = ?mode,
        projects = summary.projects,
        tasks = summary.tasks,
        expenses = summary.expenses,
        time_entries = summary.time_entries,
        "data imported"
    );
    events.publish(Event::DataImported {
        projects: summary.projects,
        tasks: summary.tasks,
        expenses: summary.expenses,
    });

    Ok(summary)
}

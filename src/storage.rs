//! Persistence of the project data file.
//!
//! The file holds every project, task, expense, time entry and running timer
//! in one versioned JSON document. Older layouts are upgraded on load.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::store::Store;

pub mod json;
pub mod memory;
pub mod migrations;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Could not read project data from '{path}': {source}")]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Project data in '{path}' is not valid: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not write project data to '{path}': {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not encode project data: {source}")]
    SerializeFailed {
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not back up project data to '{path}': {source}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not prune old backups in '{dir}': {source}")]
    CleanupFailed {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Project data version must be a positive integer, found {0}")]
    InvalidVersion(String),

    #[error("Could not upgrade project data from version {from}: {reason}")]
    MigrationFailed { from: u32, reason: String },

    #[error(
        "Project data in '{path}' was upgraded from version {from} but a record is still invalid: {source}"
    )]
    MigratedDataInvalid {
        path: PathBuf,
        from: u32,
        #[source]
        source: serde_json::Error,
    },

    #[error("Project data was written by a newer ptrack (version {0}). Upgrade ptrack to open it.")]
    FutureVersion(u32),

    #[error("Project data version {0} has no upgrade path in this ptrack")]
    UnsupportedVersion(u32),
}

pub trait Storage {
    fn load(&self) -> Result<Store, StorageError>;
    fn save(&self, store: &Store) -> Result<(), StorageError>;
}

use std::{
    fs::{self, OpenOptions, rename, write},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use serde_json::to_string_pretty;
use uuid::Uuid;

use crate::{
    models::store::{CURRENT_VERSION, Store},
    storage::{
        Storage, StorageError,
        migrations::{apply_migrations, detect_version},
    },
};

pub const DEFAULT_BACKUPS_TO_KEEP: usize = 5;

pub struct JsonFileStorage {
    path: PathBuf,
    backups_to_keep: usize,
}

impl JsonFileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            backups_to_keep: DEFAULT_BACKUPS_TO_KEEP,
        }
    }

    pub fn with_backups_to_keep(mut self, backups_to_keep: usize) -> Self {
        self.backups_to_keep = backups_to_keep;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::SaveFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }

    fn create_backup(&self) -> Result<u64, StorageError> {
        let file_exists = fs::exists(&self.path).map_err(|e| StorageError::BackupFailed {
            path: self.path.clone(),
            source: e,
        })?;
        if !file_exists || self.backups_to_keep == 0 {
            return Ok(0);
        }

        let backups_dir = self.get_backup_dir();
        fs::create_dir_all(&backups_dir).map_err(|e| StorageError::BackupFailed {
            path: backups_dir.clone(),
            source: e,
        })?;

        let backup_path = self.get_backup_path();
        fs::copy(&self.path, &backup_path).map_err(|e| StorageError::BackupFailed {
            path: backup_path,
            source: e,
        })
    }

    fn cleanup_old_backups(&self) -> Result<(), StorageError> {
        let backup_dir = self.get_backup_dir();
        let backup_dir_exists =
            fs::exists(&backup_dir).map_err(|e| StorageError::CleanupFailed {
                dir: backup_dir.clone(),
                source: e,
            })?;
        if !backup_dir_exists {
            return Ok(());
        }

        let mut file_entries = fs::read_dir(&backup_dir)
            .map_err(|e| StorageError::CleanupFailed {
                dir: backup_dir.clone(),
                source: e,
            })?
            .flatten()
            .filter(|entry| entry.metadata().map(|m| m.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect::<Vec<_>>();

        // Backup names embed an RFC 3339 timestamp, so lexical order is chronological
        file_entries.sort();

        let number_of_files_to_delete = file_entries.len().saturating_sub(self.backups_to_keep);
        if number_of_files_to_delete == 0 {
            return Ok(());
        }

        for file_path in &file_entries[0..number_of_files_to_delete] {
            fs::remove_file(file_path).map_err(|e| StorageError::CleanupFailed {
                dir: backup_dir.clone(),
                source: e,
            })?;
        }

        tracing::debug!(
            removed = number_of_files_to_delete,
            dir = %backup_dir.display(),
            "rotated store backups"
        );

        Ok(())
    }

    fn get_backup_dir(&self) -> PathBuf {
        let parent_store_path = self.path.parent().unwrap_or(Path::new("."));
        parent_store_path.join("backups")
    }

    fn get_backup_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("store"));
        // Colons are not allowed in Windows file names
        let timestamp = jiff::Timestamp::now().to_string().replace(':', "-");

        self.get_backup_dir().join(format!("{stem}-{timestamp}.json"))
    }
}

impl Storage for JsonFileStorage {
    fn load(&self) -> Result<Store, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no store file yet, starting empty");
                return Ok(Store::default());
            }
            Err(e) => {
                return Err(StorageError::LoadFailed {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };

        let file_version = detect_version(&content).map_err(|e| match e {
            StorageError::ParseFailed { source, .. } => StorageError::ParseFailed {
                path: self.path.clone(),
                source,
            },
            other => other,
        })?;

        if file_version > CURRENT_VERSION {
            return Err(StorageError::FutureVersion(file_version));
        }

        let mut data: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| StorageError::ParseFailed {
                path: self.path.clone(),
                source: e,
            })?;

        if file_version < CURRENT_VERSION {
            data = apply_migrations(data, file_version, CURRENT_VERSION)?;
        }

        let store: Store = serde_json::from_value(data).map_err(|e| {
            if file_version < CURRENT_VERSION {
                StorageError::MigratedDataInvalid {
                    path: self.path.clone(),
                    from: file_version,
                    source: e,
                }
            } else {
                StorageError::ParseFailed {
                    path: self.path.clone(),
                    source: e,
                }
            }
        })?;

        tracing::debug!(
            path = %self.path.display(),
            projects = store.projects.len(),
            tasks = store.tasks.len(),
            expenses = store.expenses.len(),
            "loaded store"
        );

        Ok(store)
    }

    fn save(&self, store: &Store) -> Result<(), StorageError> {
        let json =
            to_string_pretty(store).map_err(|e| StorageError::SerializeFailed { source: e })?;

        self.ensure_parent_dir()?;

        let unique_temp = format!("{}.tmp.{}", self.path.display(), Uuid::new_v4());
        let temp_path = PathBuf::from(&unique_temp);
        write(&temp_path, json).map_err(|e| StorageError::SaveFailed {
            path: temp_path.clone(),
            source: e,
        })?;

        let lock_file_path = self.path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_file_path)
            .map_err(|e| StorageError::SaveFailed {
                path: lock_file_path.clone(),
                source: e,
            })?;
        lock_file
            .lock_exclusive()
            .map_err(|e| StorageError::SaveFailed {
                path: lock_file_path,
                source: e,
            })?;

        self.create_backup()?;
        self.cleanup_old_backups()?;

        rename(&temp_path, &self.path).map_err(|e| StorageError::SaveFailed {
            path: self.path.clone(),
            source: e,
        })?;

        lock_file.unlock().map_err(|e| StorageError::SaveFailed {
            path: self.path.clone(),
            source: e,
        })?;

        tracing::debug!(path = %self.path.display(), "saved store");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        models::{expense::Expense, project::Project, task::Task},
        storage::migrations::legacy_uuid,
    };

    fn count_backups(dir: &Path) -> usize {
        fs::read_dir(dir.join("backups"))
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .filter(|entry| entry.metadata().map(|m| m.is_file()).unwrap_or(false))
                    .count()
            })
            .unwrap_or(0)
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project {
            id: Uuid::new_v4(),
            name: String::from("Some Project"),
            start_date: String::from("2025-01-01"),
            end_date: String::from("2025-03-01"),
            ..Project::default()
        };
        let task = Task {
            id: Uuid::new_v4(),
            name: String::from("Some Task"),
            project_id: project.id,
            ..Task::default()
        };
        let expense = Expense {
            id: Uuid::new_v4(),
            project_id: project.id,
            amount: 12.5,
            ..Expense::default()
        };
        let store = Store {
            projects: vec![project],
            tasks: vec![task],
            expenses: vec![expense],
            ..Store::default()
        };

        let storage = JsonFileStorage::new(dir.path().join("store.json"));
        storage.save(&store).unwrap();

        let loaded = storage.load().unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn test_load_missing_file_returns_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("missing.json"));

        let store = storage.load().unwrap();
        assert_eq!(store, Store::default());
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invalid_store.json");
        fs::write(&path, "{ this is not valid json }").unwrap();

        let result = JsonFileStorage::new(path.clone()).load();

        match result {
            Err(StorageError::ParseFailed { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected ParseFailed error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_v1_without_version_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v1_store.json");
        let old_json = r#"{
            "projects": [{
                "id": "6f1c9a8e-2b0e-4c61-9a55-8d7b2f3e4a10",
                "name": "Legacy",
                "startDate": "2024-01-01",
                "endDate": "2024-12-31",
                "budget": 500,
                "status": "in-progress",
                "createdAt": "2024-01-01T09:00:00Z",
                "updatedAt": "2024-01-01T09:00:00Z"
            }],
            "tasks": [],
            "expenses": [],
            "settings": {"theme": "dark", "currency": "EUR"}
        }"#;
        fs::write(&path, old_json).unwrap();

        let store = JsonFileStorage::new(path).load().unwrap();

        assert_eq!(store.version, CURRENT_VERSION);
        assert_eq!(store.projects[0].name, "Legacy");
        assert_eq!(store.settings.currency, "EUR");
        assert!(store.time_entries.is_empty());
    }

    #[test]
    fn test_load_v1_with_string_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v1_string_ids.json");
        let old_json = r#"{
            "projects": [{
                "id": "project_1700000000000_abc123def",
                "name": "Legacy",
                "startDate": "2024-01-01",
                "endDate": "2024-12-31",
                "status": "in-progress",
                "createdAt": "2024-01-01T09:00:00.000Z",
                "updatedAt": "2024-01-01T09:00:00.000Z"
            }],
            "tasks": [{
                "id": "task_1700000000001_ghi456jkl",
                "projectId": "project_1700000000000_abc123def",
                "name": "Migrate",
                "dueDate": "2024-03-01",
                "createdAt": "2024-01-02T09:00:00.000Z",
                "updatedAt": "2024-01-02T09:00:00.000Z"
            }],
            "expenses": [{
                "id": "expense_1700000000002_mno789pqr",
                "projectId": "project_1700000000000_abc123def",
                "date": "2024-01-10",
                "amount": 250,
                "item": "Hosting",
                "createdAt": "2024-01-10T09:00:00.000Z"
            }]
        }"#;
        fs::write(&path, old_json).unwrap();
        let storage = JsonFileStorage::new(path);

        let store = storage.load().unwrap();

        let project_id = store.projects[0].id;
        assert_eq!(project_id, legacy_uuid("project_1700000000000_abc123def"));
        assert_eq!(store.tasks[0].project_id, project_id);
        assert_eq!(store.expenses[0].project_id, project_id);
        assert_ne!(store.tasks[0].id, store.expenses[0].id);

        // Saved as v2, the mapped ids load back unchanged
        storage.save(&store).unwrap();
        let reloaded = storage.load().unwrap();
        assert_eq!(reloaded.projects[0].id, project_id);
        assert_eq!(reloaded.tasks[0].id, store.tasks[0].id);
    }

    #[test]
    fn test_load_v1_with_broken_record_names_source_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v1_broken.json");
        fs::write(
            &path,
            r#"{"projects": [{"id": "project_1_x", "name": "No dates"}]}"#,
        )
        .unwrap();

        let result = JsonFileStorage::new(path.clone()).load();

        match result {
            Err(err @ StorageError::MigratedDataInvalid { from: 1, .. }) => {
                let message = err.to_string();
                assert!(message.contains("upgraded from version 1"));
                assert!(message.contains(&path.display().to_string()));
            }
            other => panic!("expected a migrated data error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_future_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future_store.json");
        fs::write(&path, r#"{"version": 999, "projects": []}"#).unwrap();

        let result = JsonFileStorage::new(path).load();

        assert!(matches!(result, Err(StorageError::FutureVersion(999))));
    }

    #[test]
    fn test_backup_creation_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("store.json"));

        for i in 0..8 {
            let store = Store {
                projects: vec![Project {
                    name: format!("Project {i}"),
                    ..Project::default()
                }],
                ..Store::default()
            };
            storage.save(&store).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        assert_eq!(count_backups(dir.path()), DEFAULT_BACKUPS_TO_KEEP);
    }

    #[test]
    fn test_backups_to_keep_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("store.json")).with_backups_to_keep(2);

        for _ in 0..5 {
            storage.save(&Store::default()).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        assert_eq!(count_backups(dir.path()), 2);
    }

    #[test]
    fn test_backup_directory_created_on_second_save() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("store.json"));
        let backups_dir = dir.path().join("backups");

        storage.save(&Store::default()).unwrap();
        assert!(
            !backups_dir.exists(),
            "Backups dir should not exist after first save"
        );

        storage.save(&Store::default()).unwrap();
        assert!(backups_dir.is_dir(), "Backups dir should be created on second save");
    }

    #[test]
    fn test_save_creates_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ptrack").join("store.json");
        let storage = JsonFileStorage::new(path.clone());

        storage.save(&Store::default()).unwrap();

        assert!(path.is_file());
    }
}

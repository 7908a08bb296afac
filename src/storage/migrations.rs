use std::path::PathBuf;

use serde_json::{Value, json};
use uuid::Uuid;

use crate::{models::settings::Settings, storage::StorageError};

/// Namespace of the UUIDs derived from unversioned string ids
const LEGACY_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_3c2e_8a4d_4f7e_9c15_2d0a_7e3b_41c9);

/// Id fields of each collection that hold an id or a reference to one
const ID_FIELDS: [(&str, &[&str]); 4] = [
    ("projects", &["id"]),
    ("tasks", &["id", "projectId"]),
    ("expenses", &["id", "projectId"]),
    ("timeEntries", &["id", "taskId"]),
];

type MigrationFn = fn(Value) -> Result<Value, StorageError>;

fn get_migrations() -> Vec<MigrationFn> {
    vec![migrate_v1_to_v2]
}

/// Returns 1 if version field is missing: the unversioned blob with only
/// projects, tasks, expenses and settings.
pub fn detect_version(content: &str) -> Result<u32, StorageError> {
    let value: Value = serde_json::from_str(content).map_err(|e| StorageError::ParseFailed {
        path: PathBuf::from("<unknown>"),
        source: e,
    })?;

    match value.get("version") {
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| StorageError::InvalidVersion(v.to_string())),
        None => Ok(1),
    }
}

/// Migrations are applied sequentially: v1→v2→v3→...→target
pub fn apply_migrations(
    mut data: Value,
    from_version: u32,
    to_version: u32,
) -> Result<Value, StorageError> {
    if from_version == to_version {
        return Ok(data);
    }

    if from_version > to_version {
        return Err(StorageError::FutureVersion(from_version));
    }

    let migrations = get_migrations();

    for version in from_version..to_version {
        let migration_idx = (version - 1) as usize; // v1→v2 is at index 0

        if migration_idx >= migrations.len() {
            return Err(StorageError::UnsupportedVersion(version));
        }

        tracing::debug!(from = version, to = version + 1, "migrating store");
        data = migrations[migration_idx](data)?;
    }

    Ok(data)
}

/// Unversioned data uses ids like `project_1700000000000_abc123def`. Each
/// maps to the same v5 UUID wherever it appears. UUIDs are kept.
pub fn legacy_uuid(id: &str) -> Uuid {
    Uuid::parse_str(id).unwrap_or_else(|_| Uuid::new_v5(&LEGACY_ID_NAMESPACE, id.as_bytes()))
}

fn rewrite_id(value: &mut Value) {
    let legacy = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return,
    };
    *value = Value::String(legacy_uuid(&legacy).to_string());
}

/// Rewrites record ids, their project and task references and task
/// dependencies in place so the data deserializes into UUID fields.
pub fn normalize_legacy_ids(data: &mut Value) {
    for (collection, fields) in ID_FIELDS {
        let Some(records) = data.get_mut(collection).and_then(Value::as_array_mut) else {
            continue;
        };
        for record in records {
            for field in fields {
                if let Some(id) = record.get_mut(*field) {
                    rewrite_id(id);
                }
            }
            if let Some(dependencies) = record.get_mut("dependencies").and_then(Value::as_array_mut) {
                dependencies.iter_mut().for_each(rewrite_id);
            }
        }
    }
}

/// v2 adds time tracking, UUID ids and guarantees a settings object
fn migrate_v1_to_v2(mut value: Value) -> Result<Value, StorageError> {
    let Some(obj) = value.as_object_mut() else {
        return Err(StorageError::MigrationFailed {
            from: 1,
            reason: String::from("top level is not an object"),
        });
    };
    obj.insert("version".to_string(), Value::from(2));

    for key in ["projects", "tasks", "expenses"] {
        if !obj.get(key).is_some_and(Value::is_array) {
            obj.insert(key.to_string(), json!([]));
        }
    }

    // Older exports kept time entries under their own key
    let entries = obj.remove("timeEntries").filter(Value::is_array);
    obj.insert("timeEntries".to_string(), entries.unwrap_or_else(|| json!([])));
    obj.insert("activeTimers".to_string(), json!([]));

    let defaults = serde_json::to_value(Settings::default())
        .map_err(|e| StorageError::SerializeFailed { source: e })?;
    match obj.get_mut("settings").and_then(Value::as_object_mut) {
        Some(settings) => {
            if let Value::Object(defaults) = defaults {
                for (k, v) in defaults {
                    settings.entry(k).or_insert(v);
                }
            }
        }
        None => {
            obj.insert("settings".to_string(), defaults);
        }
    }

    normalize_legacy_ids(&mut value);

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_version_with_version_field() {
        let json = r#"{"version": 2, "projects": [], "tasks": [], "expenses": []}"#;
        assert_eq!(detect_version(json).unwrap(), 2);
    }

    #[test]
    fn test_detect_version_without_version_field() {
        let json = r#"{"projects": [], "tasks": [], "expenses": []}"#;
        assert_eq!(detect_version(json).unwrap(), 1);
    }

    #[test]
    fn test_detect_version_rejects_non_numeric_version() {
        let json = r#"{"version": "two"}"#;
        assert!(matches!(
            detect_version(json),
            Err(StorageError::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_apply_migrations_same_version() {
        let data = serde_json::json!({"version": 2});
        let result = apply_migrations(data.clone(), 2, 2).unwrap();
        assert_eq!(result, data);
    }

    #[test]
    fn test_apply_migrations_future_version() {
        let data = serde_json::json!({"version": 5});
        let result = apply_migrations(data, 5, 2);
        assert!(matches!(result, Err(StorageError::FutureVersion(5))));
    }

    #[test]
    fn test_migrate_v1_blob() {
        let data = serde_json::json!({
            "projects": [],
            "tasks": [],
            "settings": {"theme": "light", "language": "ja", "currency": "JPY"}
        });

        let migrated = apply_migrations(data, 1, 2).unwrap();

        assert_eq!(migrated["version"], 2);
        assert_eq!(migrated["expenses"], json!([]));
        assert_eq!(migrated["timeEntries"], json!([]));
        assert_eq!(migrated["activeTimers"], json!([]));
        assert_eq!(migrated["settings"]["language"], "ja");
        assert_eq!(migrated["settings"]["timezone"], "UTC");
    }

    #[test]
    fn test_migrate_v1_rejects_non_object() {
        let result = apply_migrations(json!(["not", "a", "store"]), 1, 2);

        match result {
            Err(err @ StorageError::MigrationFailed { from: 1, .. }) => {
                assert!(err.to_string().contains("from version 1"));
            }
            other => panic!("expected a migration failure, got {other:?}"),
        }
    }

    #[test]
    fn test_legacy_ids_map_consistently() {
        let uuid = "6f1c9a8e-2b0e-4c61-9a55-8d7b2f3e4a10";
        let data = json!({
            "projects": [{"id": "project_1700000000000_abc123def"}],
            "tasks": [
                {"id": "task_1700000000001_aaa", "projectId": "project_1700000000000_abc123def"},
                {
                    "id": uuid,
                    "projectId": "project_1700000000000_abc123def",
                    "dependencies": ["task_1700000000001_aaa"]
                }
            ],
            "expenses": [{"id": "expense_1700000000002_bbb", "projectId": "project_1700000000000_abc123def"}],
            "timeEntries": [{"id": 1700000000003_u64, "taskId": "task_1700000000001_aaa"}]
        });

        let migrated = apply_migrations(data, 1, 2).unwrap();

        let project_id = legacy_uuid("project_1700000000000_abc123def").to_string();
        let task_id = legacy_uuid("task_1700000000001_aaa").to_string();
        assert_eq!(migrated["projects"][0]["id"], project_id);
        assert_eq!(migrated["tasks"][0]["id"], task_id);
        assert_eq!(migrated["tasks"][0]["projectId"], project_id);
        assert_eq!(migrated["tasks"][1]["id"], uuid);
        assert_eq!(migrated["tasks"][1]["dependencies"][0], task_id);
        assert_eq!(migrated["expenses"][0]["projectId"], project_id);
        assert_eq!(migrated["timeEntries"][0]["taskId"], task_id);
        assert_eq!(
            migrated["timeEntries"][0]["id"],
            legacy_uuid("1700000000003").to_string()
        );
    }

    #[test]
    fn test_legacy_uuid_is_stable() {
        let first = legacy_uuid("expense_1700000000002_bbb");
        assert_eq!(first, legacy_uuid("expense_1700000000002_bbb"));
        assert_ne!(first, legacy_uuid("expense_1700000000002_bbc"));
        assert_eq!(first.get_version_num(), 5);
    }
}

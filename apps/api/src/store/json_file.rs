use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{next_updated_at, record_id, unique_id, CollectionStore, Record, StoreError};

/// Stores each collection as a pretty-printed JSON array in
/// `<dir>/<collection>.json`.
///
/// Mutations hold `write_lock` across the whole read-modify-write so
/// concurrent requests in this process cannot drop each other's changes.
/// Separate processes sharing the directory are not coordinated.
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    async fn read(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        self.ensure(collection).await?;
        let raw = tokio::fs::read_to_string(self.path(collection)).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Writes to a sibling temp file and renames it over the target.
    async fn write(&self, collection: &str, records: &[Record]) -> Result<(), StoreError> {
        let path = self.path(collection);
        let tmp = self.dir.join(format!(".{collection}.json.tmp"));
        let body = serde_json::to_string_pretty(records)?;

        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Wrote {} records to {}", records.len(), path.display());
        Ok(())
    }
}

#[async_trait]
impl CollectionStore for JsonFileStore {
    async fn ensure(&self, collection: &str) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path(collection);
        let created = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;

        match created {
            Ok(mut file) => {
                file.write_all(b"[]").await?;
                file.flush().await?;
                info!("Created empty collection file {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_all(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        self.read(collection).await
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
        let records = self.read(collection).await?;
        Ok(records.into_iter().find(|r| record_id(r) == Some(id)))
    }

    async fn insert(&self, collection: &str, mut record: Record) -> Result<Record, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read(collection).await?;

        let candidate = record_id(&record).unwrap_or_default().to_string();
        let id = unique_id(candidate, &records);
        record.insert("id".into(), Value::String(id));

        records.push(record.clone());
        self.write(collection, &records).await?;
        Ok(record)
    }

    async fn replace_at(
        &self,
        collection: &str,
        id: &str,
        fields: Record,
    ) -> Result<Record, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read(collection).await?;

        let existing = records
            .iter_mut()
            .find(|r| record_id(r) == Some(id))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let updated_at = next_updated_at(existing.get("updatedAt"), Utc::now());
        existing.extend(fields);
        existing.insert("id".into(), Value::String(id.to_string()));
        existing.insert("updatedAt".into(), Value::String(updated_at));

        let merged = existing.clone();
        self.write(collection, &records).await?;
        Ok(merged)
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read(collection).await?;

        let before = records.len();
        records.retain(|r| record_id(r) != Some(id));
        if records.len() == before {
            return Ok(false);
        }

        self.write(collection, &records).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_ensure_creates_dir_and_empty_array() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("data");
        let store = JsonFileStore::new(&dir);

        store.ensure("profiles").await.unwrap();
        store.ensure("profiles").await.unwrap();

        let raw = std::fs::read_to_string(dir.join("profiles.json")).unwrap();
        assert_eq!(raw, "[]");
    }

    #[tokio::test]
    async fn test_ensure_leaves_existing_file_alone() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("prompts.json"), r#"[{"id":"1"}]"#).unwrap();
        let store = JsonFileStore::new(tmp.path());

        store.ensure("prompts").await.unwrap();
        assert_eq!(store.load_all("prompts").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_load_all_empty_on_first_access() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path());

        assert!(store.load_all("templates").await.unwrap().is_empty());
        assert!(tmp.path().join("templates.json").exists());
    }

    #[tokio::test]
    async fn test_load_all_rejects_malformed_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("profiles.json"), "{not json").unwrap();
        let store = JsonFileStore::new(tmp.path());

        let err = store.load_all("profiles").await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_load_all_rejects_non_array_top_level() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("profiles.json"), r#"{"id":"1"}"#).unwrap();
        let store = JsonFileStore::new(tmp.path());

        assert!(matches!(
            store.load_all("profiles").await,
            Err(StoreError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_appends_in_order_and_pretty_prints() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path());

        store
            .insert("prompts", record(json!({"id": "1", "title": "a"})))
            .await
            .unwrap();
        store
            .insert("prompts", record(json!({"id": "2", "title": "b"})))
            .await
            .unwrap();

        let all = store.load_all("prompts").await.unwrap();
        let ids: Vec<_> = all.iter().filter_map(record_id).collect();
        assert_eq!(ids, vec!["1", "2"]);

        let raw = std::fs::read_to_string(tmp.path().join("prompts.json")).unwrap();
        assert!(raw.starts_with("[\n  {\n    \"id\": \"1\""), "raw was {raw}");
    }

    #[tokio::test]
    async fn test_insert_advances_colliding_id() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path());

        let first = store
            .insert("profiles", record(json!({"id": "500"})))
            .await
            .unwrap();
        let second = store
            .insert("profiles", record(json!({"id": "500"})))
            .await
            .unwrap();

        assert_eq!(record_id(&first), Some("500"));
        assert_eq!(record_id(&second), Some("501"));
    }

    #[tokio::test]
    async fn test_find_by_id_hit_and_miss() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path());
        store
            .insert("profiles", record(json!({"id": "7", "name": "x"})))
            .await
            .unwrap();

        let hit = store.find_by_id("profiles", "7").await.unwrap().unwrap();
        assert_eq!(hit["name"], "x");
        assert!(store.find_by_id("profiles", "8").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_at_merges_and_pins_id() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path());
        store
            .insert(
                "profiles",
                record(json!({
                    "id": "1",
                    "name": "Tester",
                    "temperature": 0.7,
                    "updatedAt": "2000-01-01T00:00:00.000Z"
                })),
            )
            .await
            .unwrap();

        let merged = store
            .replace_at(
                "profiles",
                "1",
                record(json!({"id": "999", "temperature": 1.2, "extra": true})),
            )
            .await
            .unwrap();

        assert_eq!(merged["id"], "1");
        assert_eq!(merged["name"], "Tester");
        assert_eq!(merged["temperature"], 1.2);
        assert_eq!(merged["extra"], true);
        assert!(merged["updatedAt"].as_str().unwrap() > "2000-01-01T00:00:00.000Z");

        let stored = store.find_by_id("profiles", "1").await.unwrap().unwrap();
        assert_eq!(stored, merged);
        assert!(store.find_by_id("profiles", "999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_at_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path());

        let err = store
            .replace_at("profiles", "nope", Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn test_remove_reports_whether_anything_changed() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path());
        store
            .insert("prompts", record(json!({"id": "1"})))
            .await
            .unwrap();
        store
            .insert("prompts", record(json!({"id": "2"})))
            .await
            .unwrap();

        assert!(store.remove("prompts", "1").await.unwrap());
        assert!(!store.remove("prompts", "1").await.unwrap());

        let remaining = store.load_all("prompts").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(record_id(&remaining[0]), Some("2"));
    }

    #[tokio::test]
    async fn test_concurrent_inserts_are_not_lost() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(JsonFileStore::new(tmp.path()));

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert("prompts", record(json!({"id": "1", "n": i})))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let all = store.load_all("prompts").await.unwrap();
        assert_eq!(all.len(), 20);
        let mut ids: Vec<_> = all.iter().filter_map(record_id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 20);
    }
}

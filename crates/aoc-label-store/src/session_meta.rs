use crate::write_queue::{read_optional, write_json_atomic, write_lock_for};
use crate::{InsertOutcome, LabelMap, LabelSink, StoreError};
use aoc_label_core::LabelRecord;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_SESSION_META_FIELD: &str = "label";

/// Labels kept as one field inside a session-metadata file owned by the host.
///
/// The file is a JSON object keyed by session; each session entry is an
/// object whose other fields belong to the host and are preserved verbatim.
#[derive(Debug, Clone)]
pub struct SessionMetaStore {
    path: PathBuf,
    field: String,
}

impl SessionMetaStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_field(path, DEFAULT_SESSION_META_FIELD)
    }

    pub fn with_field(path: impl Into<PathBuf>, field: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            field: field.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_document(&self) -> Result<Map<String, Value>, StoreError> {
        let Some(content) = read_optional(&self.path).await? else {
            return Ok(Map::new());
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(document)) => Ok(document),
            Ok(_) => Err(self.corrupt("root is not a JSON object")),
            Err(err) => Err(self.corrupt(err.to_string())),
        }
    }

    fn corrupt(&self, reason: impl Into<String>) -> StoreError {
        StoreError::ForeignFileCorrupt {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

impl LabelSink for SessionMetaStore {
    async fn read(&self) -> LabelMap {
        let document = match self.load_document().await {
            Ok(document) => document,
            Err(err) => {
                warn!(event = "label_store_unreadable", path = %self.path.display(), error = %err);
                return LabelMap::new();
            }
        };

        document
            .into_iter()
            .filter_map(|(key, entry)| {
                let label = entry.get(&self.field)?.clone();
                serde_json::from_value::<LabelRecord>(label)
                    .ok()
                    .map(|record| (key, record))
            })
            .collect()
    }

    async fn insert_label(
        &self,
        key: &str,
        record: LabelRecord,
        overwrite: bool,
    ) -> Result<InsertOutcome, StoreError> {
        let lock = write_lock_for(&self.path);
        let _guard = lock.lock().await;

        let mut document = self.load_document().await?;
        let entry = document
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(fields) = entry.as_object_mut() else {
            return Err(self.corrupt(format!("session entry {key} is not an object")));
        };

        if !overwrite {
            if let Some(existing) = fields
                .get(&self.field)
                .cloned()
                .and_then(|value| serde_json::from_value::<LabelRecord>(value).ok())
            {
                return Ok(InsertOutcome::Existing(existing));
            }
        }

        let value = serde_json::to_value(&record)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        fields.insert(self.field.clone(), value);
        write_json_atomic(&self.path, &document).await?;
        Ok(InsertOutcome::Written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 8, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[tokio::test]
    async fn label_write_preserves_host_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        std::fs::write(
            &path,
            serde_json::to_string(&json!({
                "s1": {"cwd": "/work/shop", "startedAt": "2026-03-04T07:00:00Z"},
                "s2": {"cwd": "/work/api"}
            }))
            .expect("seed json"),
        )
        .expect("seed");

        let store = SessionMetaStore::new(&path);
        store
            .set_label("s1", LabelRecord::generated("Shop Checkout", 3, now()))
            .await
            .expect("write");

        let value: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(value["s1"]["cwd"], "/work/shop");
        assert_eq!(value["s1"]["startedAt"], "2026-03-04T07:00:00Z");
        assert_eq!(value["s1"]["label"]["text"], "Shop Checkout");
        assert_eq!(value["s2"], json!({"cwd": "/work/api"}));

        let labels = store.read().await;
        assert_eq!(labels.len(), 1);
        assert_eq!(labels["s1"].text, "Shop Checkout");
    }

    #[tokio::test]
    async fn custom_field_name_is_used() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionMetaStore::with_field(dir.path().join("meta.json"), "title");
        store
            .set_label("s9", LabelRecord::manual("Pinned", now()))
            .await
            .expect("write");

        let value: Value = serde_json::from_str(
            &std::fs::read_to_string(store.path()).expect("read"),
        )
        .expect("json");
        assert_eq!(value["s9"]["title"]["source"], "manual");
    }

    #[tokio::test]
    async fn corrupt_host_file_is_never_overwritten() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, "[1, 2, 3]").expect("seed");

        let store = SessionMetaStore::new(&path);
        assert!(store.read().await.is_empty());
        let err = store
            .set_label("s1", LabelRecord::generated("X", 3, now()))
            .await
            .expect_err("must refuse");
        assert!(matches!(err, StoreError::ForeignFileCorrupt { .. }));
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "[1, 2, 3]");
    }

    #[tokio::test]
    async fn existing_label_is_kept_without_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionMetaStore::new(dir.path().join("sessions.json"));
        store
            .set_label("s1", LabelRecord::manual("Hand Named", now()))
            .await
            .expect("seed");

        let outcome = store
            .insert_label("s1", LabelRecord::generated("Auto", 3, now()), false)
            .await
            .expect("insert");
        assert!(matches!(outcome, InsertOutcome::Existing(ref record) if record.text == "Hand Named"));
    }
}

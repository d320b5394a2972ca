//! Per-path write ordering and atomic file replacement.
//!
//! Every read-modify-write against a store file runs while holding the
//! path's async mutex. Tokio mutexes are fair, so queued writers proceed in
//! arrival order and each one reads the state left by its predecessor.
//! Nothing here coordinates separate processes: the rename keeps the file
//! whole, but two processes can still lose each other's updates.

use crate::StoreError;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

type WriteLocks = Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>;

fn write_locks() -> &'static WriteLocks {
    static LOCKS: OnceLock<WriteLocks> = OnceLock::new();
    LOCKS.get_or_init(|| Mutex::new(HashMap::new()))
}

pub(crate) fn write_lock_for(path: &Path) -> Arc<AsyncMutex<()>> {
    let key = lock_key(path);
    let mut locks = write_locks()
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    // Entries only the registry still references have no holder or waiter.
    locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    Arc::clone(locks.entry(key).or_default())
}

fn lock_key(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

pub(crate) async fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes pretty JSON with a trailing newline to a fresh sibling temp file,
/// then renames it over `path`.
pub(crate) async fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    let mut payload = serde_json::to_string_pretty(value)
        .map_err(|err| StoreError::Serialization(err.to_string()))?;
    payload.push('\n');

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let temp_path = temp_sibling(path);
    if let Err(source) = tokio::fs::write(&temp_path, payload).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(StoreError::Io {
            path: temp_path,
            source,
        });
    }

    if let Err(source) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "labels".to_string());
    path.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4().simple()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_shares_one_lock() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("labels.json");
        let first = write_lock_for(&path);
        let second = write_lock_for(&path);
        let other = write_lock_for(&dir.path().join("other.json"));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn idle_locks_are_pruned_from_the_registry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let idle = dir.path().join("idle.json");
        let busy = dir.path().join("busy.json");

        drop(write_lock_for(&idle));
        let held = write_lock_for(&busy);
        let _other = write_lock_for(&dir.path().join("other.json"));

        let locks = write_locks()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        assert!(!locks.contains_key(&lock_key(&idle)));
        assert!(locks.contains_key(&lock_key(&busy)));
        drop(locks);
        drop(held);
    }

    #[tokio::test]
    async fn failed_temp_write_leaves_no_file_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        // A legal target name whose temp sibling exceeds the file name limit.
        let path = dir.path().join(format!("{}.json", "l".repeat(230)));

        let err = write_json_atomic(&path, &serde_json::json!({"k": 1}))
            .await
            .expect_err("temp write must fail");
        match err {
            StoreError::Io { path: failed, .. } => {
                assert!(failed.to_string_lossy().ends_with(".tmp"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let entries = std::fs::read_dir(dir.path()).expect("list").count();
        assert_eq!(entries, 0);
    }

    #[test]
    fn temp_files_are_unique_siblings() {
        let path = Path::new("/var/state/labels.json");
        let first = temp_sibling(path);
        let second = temp_sibling(path);

        assert_ne!(first, second);
        assert_eq!(first.parent(), path.parent());
        let name = first
            .file_name()
            .expect("file name")
            .to_string_lossy()
            .into_owned();
        assert!(name.starts_with(".labels.json."));
        assert!(name.ends_with(".tmp"));
    }

    #[tokio::test]
    async fn atomic_write_creates_parent_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/state/labels.json");

        write_json_atomic(&path, &serde_json::json!({"k": 1}))
            .await
            .expect("write");

        let content = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(content, "{\n  \"k\": 1\n}\n");

        let leftovers = std::fs::read_dir(path.parent().expect("parent"))
            .expect("list")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let content = read_optional(&dir.path().join("absent.json"))
            .await
            .expect("read");
        assert!(content.is_none());
    }
}

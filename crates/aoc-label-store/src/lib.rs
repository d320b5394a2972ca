use aoc_label_core::{LabelRecord, PersistenceMode};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod labels_file;
mod session_meta;
mod write_queue;

pub use labels_file::LabelsFileStore;
pub use session_meta::{SessionMetaStore, DEFAULT_SESSION_META_FIELD};

pub type LabelMap = BTreeMap<String, LabelRecord>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("refusing to rewrite {}: {reason}", .path.display())]
    ForeignFileCorrupt { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Written,
    /// The key already had a label and overwrite was not requested.
    Existing(LabelRecord),
}

/// A keyed, durable label sink.
///
/// Reads never fail: an absent or unreadable backing file is an empty map.
/// Writes against the same path are serialized in-process.
pub trait LabelSink: Send + Sync {
    fn read(&self) -> impl Future<Output = LabelMap> + Send;

    /// Read-modify-write of one key. With `overwrite == false` an existing
    /// entry is left untouched and returned.
    fn insert_label(
        &self,
        key: &str,
        record: LabelRecord,
        overwrite: bool,
    ) -> impl Future<Output = Result<InsertOutcome, StoreError>> + Send;

    fn get_label(&self, key: &str) -> impl Future<Output = Option<LabelRecord>> + Send {
        async move { self.read().await.remove(key) }
    }

    fn set_label(
        &self,
        key: &str,
        record: LabelRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        async move { self.insert_label(key, record, true).await.map(|_| ()) }
    }
}

/// The sink selected by `persistenceMode`.
#[derive(Debug, Clone)]
pub enum PersistentLabelStore {
    LabelsFile(LabelsFileStore),
    SessionMeta(SessionMetaStore),
}

impl PersistentLabelStore {
    pub fn open(mode: PersistenceMode, path: impl Into<PathBuf>) -> Self {
        match mode {
            PersistenceMode::LabelsFile => Self::LabelsFile(LabelsFileStore::new(path)),
            PersistenceMode::SessionMeta => Self::SessionMeta(SessionMetaStore::new(path)),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::LabelsFile(store) => store.path(),
            Self::SessionMeta(store) => store.path(),
        }
    }

    pub fn mode(&self) -> PersistenceMode {
        match self {
            Self::LabelsFile(_) => PersistenceMode::LabelsFile,
            Self::SessionMeta(_) => PersistenceMode::SessionMeta,
        }
    }
}

impl LabelSink for PersistentLabelStore {
    async fn read(&self) -> LabelMap {
        match self {
            Self::LabelsFile(store) => store.read().await,
            Self::SessionMeta(store) => store.read().await,
        }
    }

    async fn insert_label(
        &self,
        key: &str,
        record: LabelRecord,
        overwrite: bool,
    ) -> Result<InsertOutcome, StoreError> {
        match self {
            Self::LabelsFile(store) => store.insert_label(key, record, overwrite).await,
            Self::SessionMeta(store) => store.insert_label(key, record, overwrite).await,
        }
    }
}

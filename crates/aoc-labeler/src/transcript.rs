use serde_json::Value;
use std::future::Future;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("transcript not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("io error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Ordered user-authored turns of one session.
pub trait TurnSource: Send + Sync {
    fn user_turn_count(&self) -> impl Future<Output = Result<usize, TranscriptError>> + Send;

    /// The first `limit` user turns, oldest first.
    fn user_turns(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<String>, TranscriptError>> + Send;
}

/// Turns already held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryTurns(pub Vec<String>);

impl InMemoryTurns {
    pub fn new<I, S>(turns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(turns.into_iter().map(Into::into).collect())
    }
}

impl TurnSource for InMemoryTurns {
    async fn user_turn_count(&self) -> Result<usize, TranscriptError> {
        Ok(self.0.len())
    }

    async fn user_turns(&self, limit: usize) -> Result<Vec<String>, TranscriptError> {
        Ok(self.0.iter().take(limit).cloned().collect())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TranscriptScan {
    pub user_turns: Vec<String>,
    pub skipped_corrupt_lines: usize,
}

/// Line-delimited JSON transcript on disk.
#[derive(Debug, Clone)]
pub struct JsonlTranscript {
    path: PathBuf,
}

impl JsonlTranscript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn scan(&self) -> Result<TranscriptScan, TranscriptError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(TranscriptError::Missing(self.path.clone()));
            }
            Err(source) => {
                return Err(TranscriptError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        Ok(scan_transcript(&content))
    }
}

impl TurnSource for JsonlTranscript {
    async fn user_turn_count(&self) -> Result<usize, TranscriptError> {
        Ok(self.scan().await?.user_turns.len())
    }

    async fn user_turns(&self, limit: usize) -> Result<Vec<String>, TranscriptError> {
        let mut turns = self.scan().await?.user_turns;
        turns.truncate(limit);
        Ok(turns)
    }
}

pub fn scan_transcript(content: &str) -> TranscriptScan {
    let mut scan = TranscriptScan::default();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => {
                if let Some(text) = user_text(&value) {
                    scan.user_turns.push(text);
                }
            }
            Err(_) => scan.skipped_corrupt_lines += 1,
        }
    }
    scan
}

fn user_text(record: &Value) -> Option<String> {
    if record.get("isMeta").and_then(Value::as_bool) == Some(true) {
        return None;
    }

    let message = record
        .get("message")
        .filter(|message| message.is_object())
        .unwrap_or(record);
    let role = message
        .get("role")
        .or_else(|| record.get("role"))
        .or_else(|| record.get("type"))
        .and_then(Value::as_str)?;
    if role != "user" {
        return None;
    }

    let content = message
        .get("content")
        .or_else(|| record.get("content"))
        .or_else(|| record.get("text"))?;
    let text = match content {
        Value::String(text) => text.trim().to_string(),
        Value::Array(blocks) => blocks
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };

    (!text.is_empty()).then_some(text)
}

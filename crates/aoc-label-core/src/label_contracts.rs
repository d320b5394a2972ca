use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const LABEL_SCHEMA_VERSION: &str = "label.v1";
pub const FALLBACK_LABEL: &str = "General";

pub const DEFAULT_TRIGGER_AFTER_REQUESTS: usize = 3;
pub const DEFAULT_MAX_MESSAGES_FOR_LABEL: usize = 5;
pub const DEFAULT_MAX_LABEL_CHARS: usize = 28;
pub const DEFAULT_REQUEST_CHAR_BUDGET: usize = 200;
pub const DEFAULT_CANDIDATE_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LabelSource {
    Generated,
    Manual,
}

impl LabelSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for LabelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted session label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LabelRecord {
    pub text: String,
    pub source: LabelSource,
    pub turn_threshold: usize,
    pub schema_version: String,
    pub updated_at: DateTime<Utc>,
}

impl LabelRecord {
    pub fn generated(text: impl Into<String>, turn_threshold: usize, now: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            source: LabelSource::Generated,
            turn_threshold,
            schema_version: LABEL_SCHEMA_VERSION.to_string(),
            updated_at: now,
        }
    }

    pub fn manual(text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            source: LabelSource::Manual,
            turn_threshold: 0,
            schema_version: LABEL_SCHEMA_VERSION.to_string(),
            updated_at: now,
        }
    }

    pub fn is_manual(&self) -> bool {
        self.source == LabelSource::Manual
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PersistenceMode {
    #[default]
    LabelsFile,
    SessionMeta,
}

impl PersistenceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LabelsFile => "labels-file",
            Self::SessionMeta => "session-meta",
        }
    }
}

impl fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersistenceMode {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "labels-file" | "labels_file" | "labelsfile" | "file" => Ok(Self::LabelsFile),
            "session-meta" | "session_meta" | "sessionmeta" | "session" => Ok(Self::SessionMeta),
            other => Err(format!("Unknown persistence mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelConfig {
    pub trigger_after_requests: usize,
    pub max_messages_for_label: usize,
    pub max_label_chars: usize,
    pub relabel: bool,
    pub persistence_mode: PersistenceMode,
    pub request_char_budget: usize,
    pub candidate_timeout_ms: u64,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            trigger_after_requests: DEFAULT_TRIGGER_AFTER_REQUESTS,
            max_messages_for_label: DEFAULT_MAX_MESSAGES_FOR_LABEL,
            max_label_chars: DEFAULT_MAX_LABEL_CHARS,
            relabel: false,
            persistence_mode: PersistenceMode::default(),
            request_char_budget: DEFAULT_REQUEST_CHAR_BUDGET,
            candidate_timeout_ms: DEFAULT_CANDIDATE_TIMEOUT_MS,
        }
    }
}

impl LabelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_label_chars == 0 {
            return Err(ConfigError::Zero {
                field: "maxLabelChars",
            });
        }
        if self.max_messages_for_label == 0 {
            return Err(ConfigError::Zero {
                field: "maxMessagesForLabel",
            });
        }
        if self.request_char_budget == 0 {
            return Err(ConfigError::Zero {
                field: "requestCharBudget",
            });
        }
        Ok(())
    }

    pub fn candidate_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.candidate_timeout_ms)
    }
}

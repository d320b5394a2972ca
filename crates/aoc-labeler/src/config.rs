use aoc_label_core::LabelConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Contents of an `aoc-labeler` TOML file.
///
/// Label options sit at the top level next to the store locations, e.g.
///
/// ```toml
/// maxLabelChars = 24
/// persistenceMode = "sessionMeta"
/// sessionMetaPath = "/home/me/.local/state/aoc/sessions.json"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelerFileConfig {
    #[serde(flatten)]
    pub label: LabelConfig,
    #[serde(default)]
    pub labels_path: Option<PathBuf>,
    #[serde(default)]
    pub session_meta_path: Option<PathBuf>,
    #[serde(default)]
    pub session_meta_field: Option<String>,
    #[serde(default)]
    pub candidate_command: Option<String>,
}

impl LabelerFileConfig {
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigFileError> {
        toml::from_str(contents).map_err(|source| ConfigFileError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    /// No path means defaults; a named file must exist and parse.
    pub fn load_optional(path: Option<&Path>) -> Result<Self, ConfigFileError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

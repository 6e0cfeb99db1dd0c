//! Scanned library files and the titles found inside them.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::TitleId;

/// How title metadata was obtained for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionType {
    /// Decoded from the container using product keys
    Key,

    /// Parsed from the file name
    Filename,
}

impl std::fmt::Display for ExtractionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionType::Key => write!(f, "key"),
            ExtractionType::Filename => write!(f, "filename"),
        }
    }
}

/// Base game found in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileBaseGame {
    pub id_prefix: String,
    pub id: TitleId,
    pub version: i64,

    /// Display name per language
    #[serde(default)]
    pub name: HashMap<String, String>,
    pub readable_version: String,
    pub isbn: String,
}

/// DLC found in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDlc {
    pub for_id_prefix: String,
    pub id: TitleId,
    pub version: i64,
}

/// Update found in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpdate {
    pub for_id_prefix: String,
    pub id: TitleId,
    pub version: i64,
    pub readable_version: String,
}

/// Classified contents of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub base_games: Vec<FileBaseGame>,
    pub dlcs: Vec<FileDlc>,
    pub updates: Vec<FileUpdate>,
    pub extraction_type: ExtractionType,

    /// More than one title role was found in the file
    pub is_multi_content: bool,
}

/// One scanned file (or the head fragment of a split archive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryFileEntry {
    /// Absolute path
    pub path: PathBuf,
    pub size: u64,

    /// Used together with `size` to detect changed files between scans
    pub modified: DateTime<Utc>,
    pub is_split: bool,

    #[serde(flatten)]
    pub metadata: FileMetadata,
}

impl LibraryFileEntry {
    /// Base name of the file
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Every title ID found in this file
    pub fn title_ids(&self) -> impl Iterator<Item = &TitleId> {
        self.metadata
            .base_games
            .iter()
            .map(|g| &g.id)
            .chain(self.metadata.updates.iter().map(|u| &u.id))
            .chain(self.metadata.dlcs.iter().map(|d| &d.id))
    }

    /// Does this file contain the given (normalized) title ID?
    pub fn contains(&self, id: &str) -> bool {
        self.title_ids().any(|t| t.as_str() == id)
    }

    /// The single title this file stands for when served.
    ///
    /// DLC wins over an update, which wins over a base game.
    pub fn representative(&self) -> Option<(&TitleId, i64)> {
        let m = &self.metadata;
        m.dlcs
            .first()
            .map(|d| (&d.id, d.version))
            .or_else(|| m.updates.first().map(|u| (&u.id, u.version)))
            .or_else(|| m.base_games.first().map(|g| (&g.id, g.version)))
    }

    /// Can this file be served to installer clients on its own?
    pub fn is_servable(&self) -> bool {
        !self.metadata.is_multi_content && !self.is_split
    }
}

//! Container decoding capability.
//!
//! Turning an encrypted archive into title metadata needs product keys and
//! format-specific parsing that live outside this crate. The scanner only
//! depends on the [`ContainerDecoder`] trait.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::keys::KeyProvider;

/// Container family, chosen from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    /// `nsp` and `nsz`
    Nsp,

    /// `xci` and `xcz`
    Xci,

    /// Head fragment of a split archive (either family)
    SplitHead,
}

impl ContainerFormat {
    /// Map an extension (without the dot, any case) to a format
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "nsp" | "nsz" => Some(Self::Nsp),
            "xci" | "xcz" => Some(Self::Xci),
            _ => None,
        }
    }
}

/// Attributes of one title found inside a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentAttributes {
    pub title_id: String,
    pub version: i64,

    /// Display name per language (empty names omitted)
    pub names: HashMap<String, String>,
    pub display_version: String,
    pub isbn: String,
}

/// Errors reported by a decoder
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing key: {0}")]
    MissingKey(String),

    #[error("Invalid container: {0}")]
    Invalid(String),
}

/// Reads title metadata out of a container file
pub trait ContainerDecoder: Send + Sync {
    fn read_metadata(
        &self,
        keys: &dyn KeyProvider,
        path: &Path,
        format: ContainerFormat,
    ) -> Result<HashMap<String, ContentAttributes>, DecodeError>;
}

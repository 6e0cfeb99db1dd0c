//! Product key lookup.
//!
//! Keys live in a properties-style file (`name = value` per line). The
//! scanner only asks whether a specific key exists; the values are handed
//! to the container decoder untouched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Key consulted by the scanner to decide between decoder and filename mode
pub const HEADER_KEY: &str = "header_key";

/// Errors that can occur while loading keys
#[derive(Debug, Error)]
pub enum KeysError {
    #[error("Could not open a key file in any of: {0:?}")]
    NotFound(Vec<PathBuf>),

    #[error("Malformed key file {path} at line {line}")]
    Malformed { path: PathBuf, line: usize },
}

/// Lookup capability for product keys
pub trait KeyProvider: Send + Sync {
    /// Get a key by name
    fn get_prod_key(&self, name: &str) -> Option<String>;
}

/// Keys loaded from a properties file
#[derive(Debug, Clone, Default)]
pub struct ProdKeys {
    keys: HashMap<String, String>,

    /// File the keys were loaded from
    source: Option<PathBuf>,
}

impl ProdKeys {
    /// Empty key set (every lookup misses)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the first candidate file that can be read
    pub fn load_from_files<P: AsRef<Path>>(candidates: &[P]) -> Result<Self, KeysError> {
        for candidate in candidates {
            let path = candidate.as_ref();
            let content = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    debug!("Skipping key file {}: {}", path.display(), e);
                    continue;
                }
            };

            let mut keys = Self::parse(&content, path)?;
            keys.source = Some(path.to_path_buf());
            return Ok(keys);
        }

        Err(KeysError::NotFound(
            candidates.iter().map(|p| p.as_ref().to_path_buf()).collect(),
        ))
    }

    /// Parse properties text
    pub fn parse(content: &str, path: &Path) -> Result<Self, KeysError> {
        let mut keys = HashMap::new();

        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let (name, value) = line
                .split_once('=')
                .or_else(|| line.split_once(':'))
                .ok_or_else(|| KeysError::Malformed {
                    path: path.to_path_buf(),
                    line: idx + 1,
                })?;

            keys.insert(name.trim().to_string(), value.trim().to_string());
        }

        Ok(Self { keys, source: None })
    }

    /// Build from in-memory pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            keys: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            source: None,
        }
    }

    /// File the keys came from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyProvider for ProdKeys {
    fn get_prod_key(&self, name: &str) -> Option<String> {
        self.keys.get(name).cloned()
    }
}

//! Local game library: scanning, classification and lookups.
//!
//! ```text
//! scan directories ─► walk ─► extract (decoder | file name) ─► classify
//!                                                                 │
//!                    LibraryIndex::entries ◄── swap Arc<Vec<_>> ◄─┘
//! ```

pub mod decoder;
pub mod entry;
pub mod filename;
pub mod games;
pub mod scanner;

use std::sync::Arc;

use thiserror::Error;

pub use decoder::{ContainerDecoder, ContainerFormat, ContentAttributes, DecodeError};
pub use entry::{
    ExtractionType, FileBaseGame, FileDlc, FileMetadata, FileUpdate, LibraryFileEntry,
};
pub use filename::extract_from_filename;
pub use games::{assemble, LibrarySwitchGame};
pub use scanner::{classify_contents, LibraryManager, ScanReport, ALLOWED_EXTENSIONS};

/// Per-file scan failures. None of them abort a rescan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("unsupported extension")]
    UnsupportedExtension,

    #[error("failed to read file metadata: {0}")]
    ReadMetadata(#[source] DecodeError),

    #[error("failed to read title ID")]
    TitleId,

    #[error("failed to read title version")]
    TitleVersion,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to walk directory: {0}")]
    Walk(String),
}

/// Read access to the published library index
pub trait LibraryIndex: Send + Sync {
    /// Current snapshot of every indexed file
    fn entries(&self) -> Arc<Vec<LibraryFileEntry>>;

    /// Files containing the title `id` (any case)
    fn files_for_id(&self, id: &str) -> Vec<LibraryFileEntry> {
        let id = id.to_ascii_uppercase();
        self.entries()
            .iter()
            .filter(|e| e.contains(&id))
            .cloned()
            .collect()
    }
}

impl LibraryIndex for Vec<LibraryFileEntry> {
    fn entries(&self) -> Arc<Vec<LibraryFileEntry>> {
        Arc::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TitleId;
    use chrono::Utc;
    use std::path::PathBuf;

    fn update_file(path: &str, id: &str) -> LibraryFileEntry {
        LibraryFileEntry {
            path: PathBuf::from(path),
            size: 1,
            modified: Utc::now(),
            is_split: false,
            metadata: FileMetadata {
                base_games: Vec::new(),
                dlcs: Vec::new(),
                updates: vec![FileUpdate {
                    for_id_prefix: id[..13].to_string(),
                    id: TitleId::parse(id).unwrap(),
                    version: 65536,
                    readable_version: String::new(),
                }],
                extraction_type: ExtractionType::Filename,
                is_multi_content: false,
            },
        }
    }

    #[test]
    fn test_files_for_id_ignores_case() {
        let index = vec![
            update_file("/lib/a.nsp", "0100AAAAAAAAA800"),
            update_file("/lib/b.nsp", "0100BBBBBBBBB800"),
            update_file("/lib/a-v2.nsp", "0100AAAAAAAAA800"),
        ];

        let files = index.files_for_id("0100aaaaaaaaa800");
        let paths: Vec<_> = files.iter().map(|f| f.path.to_str().unwrap()).collect();
        assert_eq!(paths, vec!["/lib/a.nsp", "/lib/a-v2.nsp"]);

        assert!(index.files_for_id("0100AAAAAAAAA000").is_empty());
    }
}

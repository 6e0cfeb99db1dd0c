//! Directory scanner and title classifier.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use walkdir::{DirEntry, WalkDir};

use super::decoder::{ContainerDecoder, ContainerFormat, ContentAttributes};
use super::entry::{
    ExtractionType, FileBaseGame, FileDlc, FileMetadata, FileUpdate, LibraryFileEntry,
};
use super::filename::extract_from_filename;
use super::{LibraryIndex, ScanError};
use crate::domain::{ProgressSnapshot, TitleId, TitleKind};
use crate::keys::{KeyProvider, HEADER_KEY};

/// Extensions eligible for indexing (compared case-insensitively)
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["xci", "nsp", "nsz", "xcz"];

/// Outcome of one [`LibraryManager::rescan`]
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Entries published by this scan
    pub indexed: usize,

    /// Entries carried over unchanged from the previous scan
    pub reused: usize,

    /// Per-file failures; none of them abort the scan
    pub errors: BTreeMap<PathBuf, ScanError>,
}

#[derive(Debug, Default)]
struct LibraryState {
    entries: Arc<Vec<LibraryFileEntry>>,
    last_progress: Option<ProgressSnapshot>,
}

/// A file found while walking, before metadata extraction
#[derive(Debug)]
struct FoundFile {
    path: PathBuf,
    name: String,
    size: u64,
    modified: DateTime<Utc>,
}

/// Scans the configured directories and publishes the resulting index.
///
/// The published list is immutable: each rescan builds a new one and swaps
/// it in under a write lock, so readers see either the old or the new list.
pub struct LibraryManager {
    keys: Arc<dyn KeyProvider>,
    decoder: Option<Arc<dyn ContainerDecoder>>,
    directories: Vec<PathBuf>,
    recursive: bool,
    state: RwLock<LibraryState>,
}

impl LibraryManager {
    /// Create a recursive scanner over `directories` without a decoder
    pub fn new(keys: Arc<dyn KeyProvider>, directories: Vec<PathBuf>) -> Self {
        Self {
            keys,
            decoder: None,
            directories,
            recursive: true,
            state: RwLock::new(LibraryState::default()),
        }
    }

    /// Use `decoder` when the header key is available
    pub fn with_decoder(mut self, decoder: Arc<dyn ContainerDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Descend into subdirectories (default) or only scan the roots
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Latest progress recorded by a rescan, if any ran
    pub fn last_progress(&self) -> Option<ProgressSnapshot> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_progress
            .clone()
    }

    fn record_progress(&self, snapshot: ProgressSnapshot) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .last_progress = Some(snapshot);
    }

    /// Walk every directory, extract metadata and publish a new index.
    ///
    /// A soft rescan reuses the previous entry of any file whose size and
    /// modification time are unchanged. `progress` receives
    /// `(current, total, message)`.
    #[instrument(skip(self, progress), fields(directories = self.directories.len()))]
    pub fn rescan<F>(&self, hard_rescan: bool, mut progress: F) -> ScanReport
    where
        F: FnMut(usize, usize, &str),
    {
        let mut report = ScanReport::default();
        let mut found = Vec::new();

        let dir_count = self.directories.len();
        for (idx, root) in self.directories.iter().enumerate() {
            let message = format!("scanning folder: {}", root.display());
            progress(idx, dir_count, &message);
            self.record_progress(ProgressSnapshot::running(idx, dir_count, &message));
            self.walk(root, &mut found, &mut report.errors);
        }

        let use_keys = self.key_mode();
        let previous: HashMap<PathBuf, LibraryFileEntry> = if hard_rescan {
            HashMap::new()
        } else {
            self.entries()
                .iter()
                .map(|e| (e.path.clone(), e.clone()))
                .collect()
        };

        let total = found.len();
        let mut entries = Vec::with_capacity(total);
        for (idx, file) in found.into_iter().enumerate() {
            let message = format!("processing file: {}", file.name);
            progress(idx, total, &message);
            self.record_progress(ProgressSnapshot::running(idx, total, &message));

            if let Some(prev) = previous.get(&file.path) {
                if prev.size == file.size && prev.modified == file.modified {
                    entries.push(prev.clone());
                    report.reused += 1;
                    continue;
                }
            }

            match self.process_file(&file, use_keys) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    debug!(path = %file.path.display(), error = %e, "Skipping file");
                    report.errors.insert(file.path, e);
                }
            }
        }

        report.indexed = entries.len();
        let message = format!("indexed {} files", report.indexed);
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.entries = Arc::new(entries);
            state.last_progress = Some(ProgressSnapshot::finished(total, &message));
        }
        progress(total, total, &message);

        if !report.errors.is_empty() {
            warn!(
                count = report.errors.len(),
                "Some files could not be indexed: {:?}",
                report
                    .errors
                    .iter()
                    .map(|(p, e)| format!("{}: {}", p.display(), e))
                    .collect::<Vec<_>>()
            );
        }
        info!(
            indexed = report.indexed,
            reused = report.reused,
            failed = report.errors.len(),
            hard = hard_rescan,
            "Library rescan complete"
        );
        report
    }

    /// Key mode needs both the header key and a decoder
    fn key_mode(&self) -> bool {
        let has_key = self.keys.get_prod_key(HEADER_KEY).is_some();
        match (&self.decoder, has_key) {
            (Some(_), true) => true,
            (None, true) => {
                warn!("Header key found but no container decoder configured, using file names");
                false
            }
            (_, false) => {
                info!("No header key available, extracting title IDs from file names");
                false
            }
        }
    }

    fn walk(&self, root: &Path, found: &mut Vec<FoundFile>, errors: &mut BTreeMap<PathBuf, ScanError>) {
        let root = match absolute(root) {
            Ok(root) => root,
            Err(e) => {
                errors.insert(root.to_path_buf(), ScanError::Io(e));
                return;
            }
        };

        let mut walker = WalkDir::new(&root).min_depth(1);
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        for item in walker.into_iter().filter_entry(|e| e.depth() == 0 || !is_hidden(e)) {
            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                    errors.insert(path, ScanError::Walk(e.to_string()));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_candidate(&name) {
                errors.insert(entry.into_path(), ScanError::UnsupportedExtension);
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    errors.insert(entry.path().to_path_buf(), ScanError::Walk(e.to_string()));
                    continue;
                }
            };
            let modified = match metadata.modified() {
                Ok(t) => DateTime::<Utc>::from(t),
                Err(e) => {
                    errors.insert(entry.into_path(), ScanError::Io(e));
                    continue;
                }
            };

            found.push(FoundFile {
                path: entry.into_path(),
                name,
                size: metadata.len(),
                modified,
            });
        }
    }

    fn process_file(&self, file: &FoundFile, use_keys: bool) -> Result<LibraryFileEntry, ScanError> {
        let is_split = split_index(&file.name) == Some(0);
        let extension = extension_of(&file.name);

        if !is_split && !is_allowed_extension(&extension) {
            return Err(ScanError::UnsupportedExtension);
        }

        let (contents, extraction_type) = match (&self.decoder, use_keys) {
            (Some(decoder), true) => {
                let format = if is_split {
                    ContainerFormat::SplitHead
                } else {
                    ContainerFormat::from_extension(&extension)
                        .ok_or(ScanError::UnsupportedExtension)?
                };
                let contents = decoder
                    .read_metadata(self.keys.as_ref(), &file.path, format)
                    .map_err(ScanError::ReadMetadata)?;
                (contents, ExtractionType::Key)
            }
            _ => (extract_from_filename(&file.name)?, ExtractionType::Filename),
        };

        Ok(LibraryFileEntry {
            path: file.path.clone(),
            size: file.size,
            modified: file.modified,
            is_split,
            metadata: classify_contents(contents, extraction_type)?,
        })
    }
}

impl LibraryIndex for LibraryManager {
    fn entries(&self) -> Arc<Vec<LibraryFileEntry>> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner).entries)
    }
}

/// Route extracted titles into base game, update and DLC lists
pub fn classify_contents(
    contents: HashMap<String, ContentAttributes>,
    extraction_type: ExtractionType,
) -> Result<FileMetadata, ScanError> {
    let mut titles: Vec<_> = contents.into_values().collect();
    titles.sort_by(|a, b| a.title_id.cmp(&b.title_id));

    let mut metadata = FileMetadata {
        base_games: Vec::new(),
        dlcs: Vec::new(),
        updates: Vec::new(),
        extraction_type,
        is_multi_content: titles.len() > 1,
    };

    for attrs in titles {
        let id = TitleId::parse(&attrs.title_id).map_err(|_| ScanError::TitleId)?;
        let prefix = id.family_prefix().to_string();
        match id.kind() {
            TitleKind::Base => metadata.base_games.push(FileBaseGame {
                id_prefix: prefix,
                id,
                version: attrs.version,
                name: attrs
                    .names
                    .into_iter()
                    .filter(|(_, name)| !name.is_empty())
                    .collect(),
                readable_version: attrs.display_version,
                isbn: attrs.isbn,
            }),
            TitleKind::Update => metadata.updates.push(FileUpdate {
                for_id_prefix: prefix,
                id,
                version: attrs.version,
                readable_version: attrs.display_version,
            }),
            TitleKind::Dlc => metadata.dlcs.push(FileDlc {
                for_id_prefix: prefix,
                id,
                version: attrs.version,
            }),
        }
    }

    Ok(metadata)
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

fn is_allowed_extension(extension: &str) -> bool {
    ALLOWED_EXTENSIONS.contains(&extension)
}

/// Fragment index of a split archive part (`game.xc00` -> 0)
fn split_index(name: &str) -> Option<u32> {
    let tail = name.get(name.len().checked_sub(2)?..)?;
    if tail.bytes().all(|b| b.is_ascii_digit()) {
        tail.parse().ok()
    } else {
        None
    }
}

fn is_candidate(name: &str) -> bool {
    is_allowed_extension(&extension_of(name)) || split_index(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(id: &str, version: i64) -> (String, ContentAttributes) {
        (
            id.to_string(),
            ContentAttributes {
                title_id: id.to_string(),
                version,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_split_index() {
        assert_eq!(split_index("game.xc00"), Some(0));
        assert_eq!(split_index("game.nsp.01"), Some(1));
        assert_eq!(split_index("00"), Some(0));
        assert_eq!(split_index("game.nsp"), None);
        assert_eq!(split_index("0"), None);
    }

    #[test]
    fn test_candidates() {
        assert!(is_candidate("a.nsp"));
        assert!(is_candidate("a.XCI"));
        assert!(is_candidate("a.xcz"));
        assert!(is_candidate("a.nsp.00"));
        assert!(is_candidate("a.nsp.03"));
        assert!(!is_candidate("a.txt"));
    }

    #[test]
    fn test_classify_single_dlc() {
        let contents = HashMap::from([attrs("0100aaaaaaaaa001", 3)]);
        let meta = classify_contents(contents, ExtractionType::Filename).unwrap();

        assert!(meta.base_games.is_empty());
        assert!(meta.updates.is_empty());
        assert_eq!(meta.dlcs.len(), 1);
        assert_eq!(meta.dlcs[0].id.as_str(), "0100AAAAAAAAA001");
        assert_eq!(meta.dlcs[0].for_id_prefix, "0100AAAAAAAAA");
        assert!(!meta.is_multi_content);
    }

    #[test]
    fn test_classify_multi_content() {
        let contents = HashMap::from([
            attrs("0100AAAAAAAAA000", 0),
            attrs("0100AAAAAAAAA800", 65536),
        ]);
        let meta = classify_contents(contents, ExtractionType::Key).unwrap();

        assert_eq!(meta.base_games.len(), 1);
        assert_eq!(meta.updates.len(), 1);
        assert_eq!(meta.updates[0].version, 65536);
        assert!(meta.is_multi_content);
        assert_eq!(meta.extraction_type, ExtractionType::Key);
    }

    #[test]
    fn test_classify_drops_empty_names() {
        let mut base = ContentAttributes {
            title_id: "0100AAAAAAAAA000".into(),
            ..Default::default()
        };
        base.names.insert("AmericanEnglish".into(), "Alpha".into());
        base.names.insert("Japanese".into(), String::new());
        let contents = HashMap::from([(base.title_id.clone(), base)]);

        let meta = classify_contents(contents, ExtractionType::Key).unwrap();
        assert_eq!(meta.base_games[0].name.len(), 1);
    }

    #[test]
    fn test_classify_rejects_bad_id() {
        let contents = HashMap::from([attrs("nothex", 0)]);
        assert!(matches!(
            classify_contents(contents, ExtractionType::Key),
            Err(ScanError::TitleId)
        ));
    }
}

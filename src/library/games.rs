//! Read-time join of scanned files with catalog entries.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::entry::{ExtractionType, LibraryFileEntry};
use crate::catalog::{CatalogEntry, CatalogEntryData, CatalogEntryVersion};
use crate::store::{CatalogStore, StoreError};

/// Language preferred when a family has no catalog entry
pub const PREFERRED_LANGUAGE: &str = "AmericanEnglish";

/// A file holding one title of a family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryFileRef {
    /// Title ID found in the file
    pub file_id: String,
    pub file_path: PathBuf,
    pub file_version: i64,
    #[serde(default)]
    pub readable_version: String,
    pub extraction_type: ExtractionType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryGameData {
    #[serde(flatten)]
    pub data: CatalogEntryData,
    pub in_library: bool,
    pub files: Vec<LibraryFileRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryDlcData {
    #[serde(flatten)]
    pub data: CatalogEntryData,
    pub in_library: bool,
    pub files: Vec<LibraryFileRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryUpdateData {
    pub files: Vec<LibraryFileRef>,
}

/// One family as seen from the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySwitchGame {
    #[serde(flatten)]
    pub game: LibraryGameData,

    /// Keyed by DLC title ID
    pub dlcs: BTreeMap<String, LibraryDlcData>,

    /// Keyed by update title ID
    pub updates: BTreeMap<String, LibraryUpdateData>,

    pub all_versions: Vec<CatalogEntryVersion>,
    pub is_recent_update_in_library: bool,
}

#[derive(Default)]
struct FamilyFiles {
    base: Vec<LibraryFileRef>,
    base_names: BTreeMap<String, String>,
    dlcs: BTreeMap<String, Vec<LibraryFileRef>>,
    updates: BTreeMap<String, Vec<LibraryFileRef>>,
}

/// Group `entries` by family and merge in what the catalog knows.
///
/// Families are returned in family-prefix order.
pub fn assemble<S>(
    entries: &[LibraryFileEntry],
    store: &S,
) -> Result<Vec<LibrarySwitchGame>, StoreError>
where
    S: CatalogStore + ?Sized,
{
    let mut families: BTreeMap<String, FamilyFiles> = BTreeMap::new();

    for entry in entries {
        let extraction_type = entry.metadata.extraction_type;
        for game in &entry.metadata.base_games {
            let family = families.entry(game.id_prefix.clone()).or_default();
            family.base.push(LibraryFileRef {
                file_id: game.id.to_string(),
                file_path: entry.path.clone(),
                file_version: game.version,
                readable_version: game.readable_version.clone(),
                extraction_type,
            });
            for (lang, name) in &game.name {
                family.base_names.entry(lang.clone()).or_insert_with(|| name.clone());
            }
        }
        for update in &entry.metadata.updates {
            families
                .entry(update.for_id_prefix.clone())
                .or_default()
                .updates
                .entry(update.id.to_string())
                .or_default()
                .push(LibraryFileRef {
                    file_id: update.id.to_string(),
                    file_path: entry.path.clone(),
                    file_version: update.version,
                    readable_version: update.readable_version.clone(),
                    extraction_type,
                });
        }
        for dlc in &entry.metadata.dlcs {
            families
                .entry(dlc.for_id_prefix.clone())
                .or_default()
                .dlcs
                .entry(dlc.id.to_string())
                .or_default()
                .push(LibraryFileRef {
                    file_id: dlc.id.to_string(),
                    file_path: entry.path.clone(),
                    file_version: dlc.version,
                    readable_version: String::new(),
                    extraction_type,
                });
        }
    }

    let mut games = Vec::with_capacity(families.len());
    for (prefix, files) in families {
        let catalog = store.get_catalog_entry(&prefix)?;
        games.push(join_family(&prefix, files, catalog));
    }
    Ok(games)
}

fn join_family(prefix: &str, files: FamilyFiles, catalog: Option<CatalogEntry>) -> LibrarySwitchGame {
    let FamilyFiles {
        base,
        base_names,
        dlcs: dlc_files,
        updates: update_files,
    } = files;

    let catalog = catalog.unwrap_or_else(|| CatalogEntry {
        data: CatalogEntryData {
            id: format!("{prefix}000"),
            name: fallback_name(&base_names),
            ..Default::default()
        },
        ..Default::default()
    });

    let mut dlcs: BTreeMap<String, LibraryDlcData> = catalog
        .dlcs
        .iter()
        .map(|d| {
            (
                d.data.id.to_ascii_uppercase(),
                LibraryDlcData {
                    data: d.data.clone(),
                    in_library: false,
                    files: Vec::new(),
                },
            )
        })
        .collect();
    for (id, files) in dlc_files {
        let dlc = dlcs.entry(id.clone()).or_insert_with(|| LibraryDlcData {
            data: CatalogEntryData {
                id,
                ..Default::default()
            },
            in_library: false,
            files: Vec::new(),
        });
        dlc.in_library = true;
        dlc.files = files;
    }

    let recent = &catalog.recent_update;
    let is_recent_update_in_library = !recent.id.is_empty()
        && update_files
            .values()
            .flatten()
            .any(|f| f.file_version >= recent.version);

    let updates = update_files
        .into_iter()
        .map(|(id, files)| (id, LibraryUpdateData { files }))
        .collect();

    LibrarySwitchGame {
        game: LibraryGameData {
            in_library: !base.is_empty(),
            data: catalog.data,
            files: base,
        },
        dlcs,
        updates,
        all_versions: catalog.versions,
        is_recent_update_in_library,
    }
}

fn fallback_name(names: &BTreeMap<String, String>) -> String {
    names
        .get(PREFERRED_LANGUAGE)
        .or_else(|| names.values().next())
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntryDlc, CatalogEntryRecentUpdate, CatalogMetadata};
    use crate::domain::TitleId;
    use crate::library::entry::{FileBaseGame, FileDlc, FileMetadata, FileUpdate};
    use crate::store::SqliteCatalogStore;
    use chrono::Utc;
    use std::collections::HashMap;

    fn file(path: &str, metadata: FileMetadata) -> LibraryFileEntry {
        LibraryFileEntry {
            path: PathBuf::from(path),
            size: 10,
            modified: Utc::now(),
            is_split: false,
            metadata,
        }
    }

    fn meta() -> FileMetadata {
        FileMetadata {
            base_games: Vec::new(),
            dlcs: Vec::new(),
            updates: Vec::new(),
            extraction_type: ExtractionType::Filename,
            is_multi_content: false,
        }
    }

    fn id(s: &str) -> TitleId {
        TitleId::parse(s).unwrap()
    }

    fn library() -> Vec<LibraryFileEntry> {
        let mut base = meta();
        base.base_games.push(FileBaseGame {
            id_prefix: "0100AAAAAAAAA".into(),
            id: id("0100AAAAAAAAA000"),
            version: 0,
            name: HashMap::from([
                ("Japanese".to_string(), "Arufa".to_string()),
                ("AmericanEnglish".to_string(), "Alpha".to_string()),
            ]),
            readable_version: "1.0.0".into(),
            isbn: String::new(),
        });
        let mut update = meta();
        update.updates.push(FileUpdate {
            for_id_prefix: "0100AAAAAAAAA".into(),
            id: id("0100AAAAAAAAA800"),
            version: 131072,
            readable_version: "1.2.0".into(),
        });
        let mut dlc = meta();
        dlc.dlcs.push(FileDlc {
            for_id_prefix: "0100AAAAAAAAA".into(),
            id: id("0100AAAAAAAAA001"),
            version: 0,
        });
        vec![
            file("/lib/alpha.nsp", base),
            file("/lib/alpha-update.nsp", update),
            file("/lib/alpha-dlc.nsp", dlc),
        ]
    }

    #[test]
    fn test_assemble_without_catalog_uses_embedded_name() {
        let store = SqliteCatalogStore::open_in_memory().unwrap();
        let games = assemble(&library(), &store).unwrap();

        assert_eq!(games.len(), 1);
        let game = &games[0];
        assert_eq!(game.game.data.id, "0100AAAAAAAAA000");
        assert_eq!(game.game.data.name, "Alpha");
        assert!(game.game.in_library);
        assert_eq!(game.game.files[0].readable_version, "1.0.0");
        assert!(game.dlcs["0100AAAAAAAAA001"].in_library);
        assert_eq!(game.updates["0100AAAAAAAAA800"].files[0].file_version, 131072);
        assert!(!game.is_recent_update_in_library);
    }

    #[test]
    fn test_assemble_merges_catalog() {
        let store = SqliteCatalogStore::open_in_memory().unwrap();
        let catalog = CatalogEntry {
            data: CatalogEntryData {
                id: "0100AAAAAAAAA000".into(),
                name: "Alpha Quest".into(),
                ..Default::default()
            },
            recent_update: CatalogEntryRecentUpdate {
                id: "0100AAAAAAAAA800".into(),
                version: 131072,
                key: String::new(),
            },
            versions: vec![CatalogEntryVersion {
                version: 131072,
                release_date: "2023-04-01".into(),
            }],
            dlcs: vec![
                CatalogEntryDlc {
                    data: CatalogEntryData {
                        id: "0100AAAAAAAAA001".into(),
                        name: "Pack One".into(),
                        ..Default::default()
                    },
                },
                CatalogEntryDlc {
                    data: CatalogEntryData {
                        id: "0100AAAAAAAAA002".into(),
                        name: "Pack Two".into(),
                        ..Default::default()
                    },
                },
            ],
        };
        store
            .replace_catalog(
                &HashMap::from([("0100AAAAAAAAA".to_string(), catalog)]),
                &CatalogMetadata::default(),
            )
            .unwrap();

        let games = assemble(&library(), &store).unwrap();
        let game = &games[0];
        assert_eq!(game.game.data.name, "Alpha Quest");
        assert_eq!(game.all_versions.len(), 1);
        assert!(game.is_recent_update_in_library);
        assert!(game.dlcs["0100AAAAAAAAA001"].in_library);
        assert_eq!(game.dlcs["0100AAAAAAAAA001"].data.name, "Pack One");
        assert!(!game.dlcs["0100AAAAAAAAA002"].in_library);
    }

    #[test]
    fn test_fallback_name_any_language() {
        let names = BTreeMap::from([("French".to_string(), "Alpha FR".to_string())]);
        assert_eq!(fallback_name(&names), "Alpha FR");
        assert_eq!(fallback_name(&BTreeMap::new()), "");
    }
}

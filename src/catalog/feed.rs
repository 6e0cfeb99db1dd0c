//! Remote feed documents and their normalization into catalog entries.
//!
//! Two documents make up the feed:
//! - titles: `{ "<title id>": { name, version, region, releaseDate, ... } }`
//! - versions: `{ "<base title id>": { "<version>": "<ISO date>" } }`

use std::collections::HashMap;
use std::io::Read;

use serde::Deserialize;
use tracing::debug;

use super::model::{
    CatalogEntry, CatalogEntryData, CatalogEntryDlc, CatalogEntryRecentUpdate,
    CatalogEntryVersion,
};
use crate::domain::{TitleId, TitleKind};

/// Version field of a title, published either as a number or a string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FeedVersion {
    Number(i64),
    Text(String),
}

impl FeedVersion {
    /// Numeric value, if the field holds one
    pub fn as_number(&self) -> Option<i64> {
        match self {
            FeedVersion::Number(n) => Some(*n),
            FeedVersion::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl std::fmt::Display for FeedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedVersion::Number(n) => write!(f, "{}", n),
            FeedVersion::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One record of the titles document.
///
/// The feed publishes `null` for many fields, so everything is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TitleRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub version: Option<FeedVersion>,
    pub region: Option<String>,
    /// `YYYYMMDD`
    pub release_date: Option<i64>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub icon_url: Option<String>,
    pub banner_url: Option<String>,
    pub screenshots: Option<Vec<String>>,
    pub description: Option<String>,
    pub size: Option<u64>,
    pub category: Option<Vec<String>>,
    pub front_box_art: Option<String>,
    pub intro: Option<String>,
    pub key: Option<String>,
    pub is_demo: Option<bool>,
    pub language: Option<String>,
    pub languages: Option<Vec<String>>,
}

impl TitleRecord {
    fn to_entry_data(&self, id: &TitleId) -> CatalogEntryData {
        CatalogEntryData {
            id: id.to_string(),
            name: self.name.clone().unwrap_or_default(),
            version: self
                .version
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_default(),
            banner_url: self.banner_url.clone().unwrap_or_default(),
            icon_url: self.icon_url.clone().unwrap_or_default(),
            description: self.description.clone().unwrap_or_default(),
            intro: self.intro.clone().unwrap_or_default(),
            region: self.region.clone().unwrap_or_default(),
            key: self.key.clone().unwrap_or_default(),
            release_date: parse_release_date(self.release_date.unwrap_or(0)),
            publisher: self.publisher.clone().unwrap_or_default(),
            is_demo: self.is_demo.unwrap_or(false),
            screenshots: self.screenshots.clone().unwrap_or_default(),
        }
    }
}

/// Parsed titles document
pub type TitlesDocument = HashMap<String, TitleRecord>;

/// Parsed versions document: title ID -> (version number -> release date)
pub type VersionsDocument = HashMap<String, HashMap<String, String>>;

/// Decode the titles document
pub fn read_titles<R: Read>(reader: R) -> Result<TitlesDocument, serde_json::Error> {
    serde_json::from_reader(reader)
}

/// Decode the versions document
pub fn read_versions<R: Read>(reader: R) -> Result<VersionsDocument, serde_json::Error> {
    serde_json::from_reader(reader)
}

/// Render a `YYYYMMDD` integer as `YYYY-MM-DD`.
///
/// A zero year, month or day means the date is unknown and yields an
/// empty string.
pub fn parse_release_date(date: i64) -> String {
    if date <= 0 {
        return String::new();
    }

    let year = date / 10_000;
    let month = (date / 100) % 100;
    let day = date % 100;

    if year == 0 || month == 0 || day == 0 {
        return String::new();
    }
    format!("{}-{:02}-{:02}", year, month, day)
}

/// Merge both documents into catalog entries keyed by family prefix
pub fn build_entries(
    titles: &TitlesDocument,
    versions: &VersionsDocument,
) -> HashMap<String, CatalogEntry> {
    let versions: HashMap<String, &HashMap<String, String>> = versions
        .iter()
        .map(|(id, history)| (id.trim().to_ascii_uppercase(), history))
        .collect();

    let mut entries: HashMap<String, CatalogEntry> = HashMap::new();

    for (raw_id, record) in titles {
        let id = match TitleId::parse(raw_id) {
            Ok(id) => id,
            Err(e) => {
                debug!("Skipping title {:?}: {}", raw_id, e);
                continue;
            }
        };

        let family = id.family_prefix().to_string();

        match id.kind() {
            TitleKind::Base => {
                let entry = entries.entry(family).or_default();
                entry.data = record.to_entry_data(&id);
                entry.versions = version_history(&versions, &id);
            }
            TitleKind::Update => {
                // The family exists even when the update carries no version
                let entry = entries.entry(family).or_default();
                let Some(version) = record.version.as_ref().and_then(FeedVersion::as_number)
                else {
                    debug!("Skipping update {} without a numeric version", id);
                    continue;
                };
                entry.recent_update = CatalogEntryRecentUpdate {
                    id: id.to_string(),
                    version,
                    key: record.key.clone().unwrap_or_default(),
                };
            }
            TitleKind::Dlc => {
                entries.entry(family).or_default().dlcs.push(CatalogEntryDlc {
                    data: record.to_entry_data(&id),
                });
            }
        }
    }

    for entry in entries.values_mut() {
        entry.dlcs.sort_by(|a, b| a.data.id.cmp(&b.data.id));
    }

    entries
}

/// Version history of a base title, ascending by version.
///
/// The feed keys histories by the base title ID; the paired update ID is
/// accepted too. Non-numeric version keys are skipped.
fn version_history(
    versions: &HashMap<String, &HashMap<String, String>>,
    base: &TitleId,
) -> Vec<CatalogEntryVersion> {
    let history = versions
        .get(base.as_str())
        .or_else(|| versions.get(base.update_id().as_str()));

    let Some(history) = history else {
        return Vec::new();
    };

    let mut result: Vec<CatalogEntryVersion> = history
        .iter()
        .filter_map(|(version, release_date)| {
            let version = version.trim().parse::<i64>().ok()?;
            Some(CatalogEntryVersion {
                version,
                release_date: release_date.clone(),
            })
        })
        .collect();

    result.sort_by_key(|v| v.version);
    result
}

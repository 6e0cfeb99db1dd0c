//! Catalog records, one per title family.

use serde::{Deserialize, Serialize};

/// Last-seen ETags of the two remote feed documents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMetadata {
    pub titles_etag: String,
    pub versions_etag: String,
}

impl CatalogMetadata {
    /// Both documents have been fetched at least once
    pub fn is_complete(&self) -> bool {
        !self.titles_etag.is_empty() && !self.versions_etag.is_empty()
    }
}

/// Attributes shared by base games and DLC
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntryData {
    pub id: String,
    pub name: String,
    pub version: String,
    pub banner_url: String,
    pub icon_url: String,
    pub description: String,
    pub intro: String,
    pub region: String,
    pub key: String,
    /// `YYYY-MM-DD`, or empty when unknown
    pub release_date: String,
    pub publisher: String,
    pub is_demo: bool,
    #[serde(default)]
    pub screenshots: Vec<String>,
}

/// Latest update published for a base game
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntryRecentUpdate {
    pub id: String,
    pub version: i64,
    pub key: String,
}

/// One published version of a base game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntryVersion {
    pub version: i64,
    /// Release date in ISO format
    pub release_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntryDlc {
    #[serde(flatten)]
    pub data: CatalogEntryData,
}

/// Everything the catalog knows about one family
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub data: CatalogEntryData,

    #[serde(default)]
    pub recent_update: CatalogEntryRecentUpdate,

    /// Sorted ascending by version
    #[serde(default)]
    pub versions: Vec<CatalogEntryVersion>,

    #[serde(default)]
    pub dlcs: Vec<CatalogEntryDlc>,
}

impl CatalogEntry {
    /// Find a DLC of this family by its title ID
    pub fn dlc(&self, id: &str) -> Option<&CatalogEntryDlc> {
        self.dlcs.iter().find(|d| d.data.id.eq_ignore_ascii_case(id))
    }
}

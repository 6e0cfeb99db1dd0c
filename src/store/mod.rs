//! Catalog persistence and queries.
//!
//! The store holds one [`CatalogEntry`] per family prefix plus the feed
//! ETags. Queries filter, sort and page an in-memory copy of the catalog.
//!
//! # Pagination
//!
//! Cursors are positions, not page numbers. A page starting at `cursor`
//! returns `entries[cursor..cursor + page_size]` (clamped) and hands back
//! `next_cursor = cursor + page_size + 1`. Existing clients loop on that
//! exact value, so the `+ 1` is part of the contract.

pub mod sqlite;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{CatalogEntry, CatalogMetadata};

pub use sqlite::SqliteCatalogStore;

/// Errors raised by catalog storage
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Catalog store lock poisoned")]
    Poisoned,
}

/// Sort order for catalog queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSortBy {
    /// Case-insensitive name
    Name,

    /// Title ID
    Id,
}

/// Optional, conjunctive query filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFilters {
    /// Case-insensitive substring of the name
    pub name: Option<String>,

    /// Case-insensitive prefix of the title ID
    pub id: Option<String>,

    /// Entry region must equal one of these (case-insensitive)
    #[serde(default)]
    pub region: Vec<String>,

    pub sort_by: Option<CatalogSortBy>,
}

impl CatalogFilters {
    /// Does the entry pass every filter that is set?
    pub fn matches(&self, entry: &CatalogEntry) -> bool {
        if let Some(name) = &self.name {
            if !entry
                .data
                .name
                .to_lowercase()
                .contains(&name.to_lowercase())
            {
                return false;
            }
        }

        if let Some(id) = &self.id {
            if !entry
                .data
                .id
                .to_lowercase()
                .starts_with(&id.to_lowercase())
            {
                return false;
            }
        }

        if !self.region.is_empty()
            && !self
                .region
                .iter()
                .any(|r| r.to_lowercase() == entry.data.region.to_lowercase())
        {
            return false;
        }

        true
    }

    /// Filter then (stably) sort a catalog snapshot
    pub fn apply(&self, entries: &[CatalogEntry]) -> Vec<CatalogEntry> {
        let mut result: Vec<CatalogEntry> =
            entries.iter().filter(|e| self.matches(e)).cloned().collect();

        match self.sort_by {
            Some(CatalogSortBy::Name) => {
                result.sort_by_cached_key(|e| e.data.name.to_lowercase());
            }
            Some(CatalogSortBy::Id) => {
                result.sort_by(|a, b| a.data.id.cmp(&b.data.id));
            }
            None => {}
        }

        result
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,

    /// Pass back verbatim to fetch the following page
    pub next_cursor: usize,

    /// Number of entries matching the filters
    pub total_count: usize,

    pub is_last_page: bool,
}

/// Next cursor for a page request
pub fn next_cursor(cursor: usize, page_size: usize) -> usize {
    cursor.saturating_add(page_size).saturating_add(1)
}

/// Cut one page out of an already filtered list.
///
/// An out-of-range cursor yields an empty page, not an error.
pub fn paginate<T: Clone>(items: &[T], page_size: usize, cursor: usize) -> Page<T> {
    let total_count = items.len();
    let start = cursor.min(total_count);
    let end = cursor.saturating_add(page_size).min(total_count);
    let next_cursor = next_cursor(cursor, page_size);

    Page {
        data: items[start..end].to_vec(),
        next_cursor,
        total_count,
        is_last_page: next_cursor > total_count,
    }
}

/// Persistence contract for the title catalog
pub trait CatalogStore: Send + Sync {
    /// Cached feed ETags (empty on first run)
    fn get_catalog_metadata(&self) -> Result<CatalogMetadata, StoreError>;

    fn update_catalog_metadata(&self, metadata: &CatalogMetadata) -> Result<(), StoreError>;

    /// Remove every catalog entry
    fn clear_catalog(&self) -> Result<(), StoreError>;

    /// Insert or overwrite entries keyed by family prefix
    fn add_catalog_entries(
        &self,
        entries: &HashMap<String, CatalogEntry>,
    ) -> Result<(), StoreError>;

    /// Clear, insert and update metadata as one unit.
    ///
    /// On failure the previous entries and metadata remain in place, and
    /// concurrent readers never see the catalog empty.
    fn replace_catalog(
        &self,
        entries: &HashMap<String, CatalogEntry>,
        metadata: &CatalogMetadata,
    ) -> Result<(), StoreError>;

    /// Entry for the family of `id` (a title ID or family prefix)
    fn get_catalog_entry(&self, id: &str) -> Result<Option<CatalogEntry>, StoreError>;

    fn get_catalog_entries(
        &self,
        filters: Option<&CatalogFilters>,
        page_size: usize,
        cursor: usize,
    ) -> Result<Page<CatalogEntry>, StoreError>;
}

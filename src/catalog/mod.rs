//! Title catalog built from the remote feed.
//!
//! The feed is two JSON documents (titles and version history). They are
//! fetched with ETag-conditional requests, merged into one
//! [`CatalogEntry`] per title family and written to a
//! [`CatalogStore`](crate::store::CatalogStore) in a single replace.
//!
//! ```text
//! titles.json ──┐
//!               ├─► build_entries ─► CatalogStore::replace_catalog
//! versions.json ┘
//! ```

pub mod builder;
pub mod download;
pub mod feed;
pub mod model;

use thiserror::Error;

use crate::store::StoreError;

pub use builder::{build_catalog, BuildOutcome, TOTAL_STEPS};
pub use download::{fetch_if_changed, Fetched};
pub use feed::{build_entries, parse_release_date};
pub use model::{
    CatalogEntry, CatalogEntryData, CatalogEntryDlc, CatalogEntryRecentUpdate,
    CatalogEntryVersion, CatalogMetadata,
};

/// Errors that abort a catalog build
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Got a non 200 response from {url}: {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Server kept reporting a feed document as unchanged")]
    Incomplete,

    #[error("Failed to decode {document} document: {source}")]
    Decode {
        document: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to update catalog store: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

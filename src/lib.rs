//! slm - Switch library manager
//!
//! Indexes a local collection of game containers, cross-references it with
//! the remotely published title catalog, and serves the library to
//! installer clients over the NUT/Tinfoil HTTP protocol.
//!
//! # Architecture
//!
//! Data flows one way:
//! - The catalog builder downloads the title feed into the catalog store
//! - The library scanner publishes an immutable index of local files
//! - The content server reads that index to answer search and download
//!
//! # Modules
//!
//! - `domain`: Title IDs, role classification, progress snapshots
//! - `keys`: Product key lookup
//! - `catalog`: Feed download and catalog building
//! - `store`: Catalog persistence and paged queries
//! - `library`: Directory scanning and classification
//! - `server`: HTTP content server
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Fetch the title catalog
//! slm catalog update
//!
//! # Index a directory
//! slm scan ~/games
//!
//! # Serve it to installer clients
//! slm serve ~/games
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod domain;
pub mod keys;
pub mod library;
pub mod server;
pub mod store;

// Re-export main types at crate root for convenience
pub use catalog::{build_catalog, BuildOutcome, CatalogEntry, CatalogError, CatalogMetadata};
pub use domain::{classify, ProgressSnapshot, TitleId, TitleKind};
pub use keys::{KeyProvider, ProdKeys};
pub use library::{LibraryFileEntry, LibraryIndex, LibraryManager, ScanReport};
pub use server::{parse_range, ContentServer, ProgressReporter};
pub use store::{CatalogFilters, CatalogStore, Page, SqliteCatalogStore};

//! Catalog rebuild from the remote feed.

use std::io::BufReader;

use tracing::{info, instrument, warn};

use super::download::{feed_client, fetch_if_changed, Fetched};
use super::feed::{build_entries, read_titles, read_versions};
use super::{CatalogError, CatalogMetadata};
use crate::store::CatalogStore;

/// Number of progress steps reported by [`build_catalog`]
pub const TOTAL_STEPS: usize = 7;

/// Result of a successful [`build_catalog`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Both ETags were already cached; nothing was downloaded
    AlreadyBuilt,

    /// The server reported both documents unchanged
    Unchanged,

    /// The catalog was replaced with this many family entries
    Rebuilt { entries: usize },
}

/// Download the feed and replace the catalog.
///
/// `progress` receives `(step, TOTAL_STEPS, message)`. On any error the
/// store keeps its previous entries and ETags.
#[instrument(skip(store, progress))]
pub async fn build_catalog<S, F>(
    store: &S,
    titles_url: &str,
    versions_url: &str,
    mut progress: F,
) -> Result<BuildOutcome, CatalogError>
where
    S: CatalogStore + ?Sized,
    F: FnMut(usize, usize, &str),
{
    progress(1, TOTAL_STEPS, "Preparing");
    let metadata = store.get_catalog_metadata()?;

    if metadata.is_complete() {
        info!("Catalog already built, skipping download");
        progress(TOTAL_STEPS, TOTAL_STEPS, "Done!");
        return Ok(BuildOutcome::AlreadyBuilt);
    }

    let client = feed_client()?;
    let tmp_dir = tempfile::tempdir()?;

    progress(2, TOTAL_STEPS, "Downloading titles data...");
    let titles = fetch_if_changed(&client, titles_url, &metadata.titles_etag, tmp_dir.path()).await?;

    progress(3, TOTAL_STEPS, "Downloading versions data...");
    let versions =
        fetch_if_changed(&client, versions_url, &metadata.versions_etag, tmp_dir.path()).await?;

    // A rebuild needs both documents; re-fetch whichever one the server
    // told us was unchanged.
    let (titles, versions) = match (titles, versions) {
        (Fetched::NotModified, Fetched::NotModified) => {
            info!("Remote catalog unchanged");
            progress(TOTAL_STEPS, TOTAL_STEPS, "Done!");
            return Ok(BuildOutcome::Unchanged);
        }
        (Fetched::NotModified, versions) => {
            let titles = fetch_if_changed(&client, titles_url, "", tmp_dir.path()).await?;
            (titles, versions)
        }
        (titles, Fetched::NotModified) => {
            let versions = fetch_if_changed(&client, versions_url, "", tmp_dir.path()).await?;
            (titles, versions)
        }
        both => both,
    };

    let (
        Fetched::Updated {
            file: titles_file,
            etag: titles_etag,
        },
        Fetched::Updated {
            file: versions_file,
            etag: versions_etag,
        },
    ) = (titles, versions)
    else {
        return Err(CatalogError::Incomplete);
    };

    progress(4, TOTAL_STEPS, "Processing data...");
    let titles_doc = read_titles(BufReader::new(titles_file.reopen()?))
        .map_err(|source| CatalogError::Decode {
            document: "titles",
            source,
        })?;
    let versions_doc = read_versions(BufReader::new(versions_file.reopen()?))
        .map_err(|source| CatalogError::Decode {
            document: "versions",
            source,
        })?;
    let entries = build_entries(&titles_doc, &versions_doc);
    info!(
        titles = titles_doc.len(),
        families = entries.len(),
        "Processed catalog feed"
    );

    progress(5, TOTAL_STEPS, "Updating local DB...");
    store.replace_catalog(
        &entries,
        &CatalogMetadata {
            titles_etag,
            versions_etag,
        },
    )?;

    progress(6, TOTAL_STEPS, "Finishing up...");
    drop(titles_file);
    drop(versions_file);
    if let Err(e) = tmp_dir.close() {
        warn!("Failed to remove download directory: {}", e);
    }

    progress(TOTAL_STEPS, TOTAL_STEPS, "Done...");
    Ok(BuildOutcome::Rebuilt {
        entries: entries.len(),
    })
}

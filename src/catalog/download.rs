//! Conditional (ETag) download of feed documents.

use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::StatusCode;
use tempfile::NamedTempFile;
use tracing::debug;

use super::CatalogError;

/// Connect timeout for feed requests
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(3);

/// Outcome of a conditional download
#[derive(Debug)]
pub enum Fetched {
    /// New content, spooled to a temporary file positioned at its start
    Updated { file: NamedTempFile, etag: String },

    /// The server reports our cached copy is still valid
    NotModified,
}

/// HTTP client used for feed downloads
pub fn feed_client() -> Result<reqwest::Client, CatalogError> {
    reqwest::Client::builder()
        .connect_timeout(DIAL_TIMEOUT)
        .build()
        .map_err(CatalogError::Client)
}

/// Download `url` into `dir` unless its ETag still matches `etag`.
///
/// Any non-200 status below 400 counts as "not modified"; 4xx/5xx and
/// transport failures are errors.
pub async fn fetch_if_changed(
    client: &reqwest::Client,
    url: &str,
    etag: &str,
    dir: &Path,
) -> Result<Fetched, CatalogError> {
    let mut request = client.get(url);
    if !etag.is_empty() {
        request = request.header(IF_NONE_MATCH, etag);
    }

    let mut response = request.send().await.map_err(|source| CatalogError::Download {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if status != StatusCode::OK {
        if status.as_u16() < 400 {
            debug!(url, %status, "Feed document unchanged");
            return Ok(Fetched::NotModified);
        }
        return Err(CatalogError::Status {
            url: url.to_string(),
            status,
        });
    }

    let new_etag = response
        .headers()
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let mut file = NamedTempFile::new_in(dir)?;
    let mut written: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|source| CatalogError::Download {
            url: url.to_string(),
            source,
        })?
    {
        file.write_all(&chunk)?;
        written += chunk.len() as u64;
    }
    file.flush()?;
    file.as_file_mut().seek(SeekFrom::Start(0))?;

    debug!(url, bytes = written, etag = %new_etag, "Feed document downloaded");
    Ok(Fetched::Updated {
        file,
        etag: new_etag,
    })
}

//! Request routing and the `/api` handlers.

use std::collections::BTreeMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hyper::body::{Bytes, Sender};
use hyper::header::{
    HeaderValue, ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE,
    RANGE,
};
use hyper::{Body, HeaderMap, Method, Request, Response, StatusCode};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, error, info, warn};

use super::range::{parse_range, HttpRange, RangeError};
use super::ProgressReporter;
use crate::library::{LibraryFileEntry, LibraryIndex};

/// Path prefix of every endpoint
pub const API_PREFIX: &str = "/api";

/// Bytes read and sent per download chunk
pub const CHUNK_SIZE: usize = 0x40_0000;

/// One row of the `/api/search` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub version: i64,
}

/// Download failures, all reported to the client as plain text
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid file name: {0}")]
    FileName(String),

    #[error("could not find specified file {0}")]
    NotFound(String),

    #[error("file {0} is multi-content or split and cannot be served")]
    Unsupported(String),

    #[error("{0}")]
    Range(#[from] RangeError),

    #[error("multiple ranges are not supported")]
    MultipleRanges,

    #[error("invalid response header: {0}")]
    Header(String),

    #[error("invalid offset: {0}")]
    Offset(String),

    #[error("range {start}-{stop} is outside of the file ({size} bytes)")]
    OutOfBounds { start: u64, stop: u64, size: u64 },

    #[error("could not read the file {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    pub fn status(&self) -> StatusCode {
        match self {
            DownloadError::Io { .. } | DownloadError::Header(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Select one representative title per servable file and keep the highest
/// version per title ID.
///
/// Multi-content and split files are skipped, as are files with no titles.
/// Results are ordered by ID.
pub fn search_results(entries: &[LibraryFileEntry]) -> Vec<SearchResult> {
    let mut by_id: BTreeMap<String, SearchResult> = BTreeMap::new();

    for entry in entries {
        if entry.metadata.is_multi_content {
            warn!(path = %entry.path.display(), "Skipping file, multi-content is not supported");
            continue;
        }
        if entry.is_split {
            warn!(path = %entry.path.display(), "Skipping file, split files are not supported");
            continue;
        }
        let Some((id, version)) = entry.representative() else {
            continue;
        };

        let id = id.as_str().to_ascii_uppercase();
        let newer = by_id.get(&id).map_or(true, |old| old.version < version);
        if newer {
            by_id.insert(
                id.clone(),
                SearchResult {
                    id,
                    name: entry.file_name(),
                    size: entry.size,
                    version,
                },
            );
        }
    }

    by_id.into_values().collect()
}

/// Routes requests to the search and download handlers
#[derive(Clone)]
pub struct Router {
    library: Arc<dyn LibraryIndex>,
    reporter: Arc<dyn ProgressReporter>,
}

impl Router {
    pub fn new(library: Arc<dyn LibraryIndex>, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self { library, reporter }
    }

    /// Handle one request and log its outcome
    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let response = self.route(req).await;
        info!(
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            "Handled request"
        );
        response
    }

    async fn route(&self, req: Request<Body>) -> Response<Body> {
        let segments: Vec<String> = match req
            .uri()
            .path()
            .strip_prefix(API_PREFIX)
            .and_then(|p| p.strip_prefix('/'))
        {
            Some(rest) => rest.split('/').map(str::to_string).collect(),
            None => return plain(StatusCode::NOT_FOUND, "404 page not found"),
        };
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        match segments.as_slice() {
            ["search"] => match *req.method() {
                Method::GET => self.search(),
                _ => method_not_allowed(),
            },
            ["download", title_id, file_name, offsets @ ..] if offsets.len() <= 2 => {
                let head = match *req.method() {
                    Method::GET => false,
                    Method::HEAD => true,
                    _ => return method_not_allowed(),
                };
                let start = offsets.first().copied();
                let stop = offsets.get(1).copied();
                match self
                    .download(req.headers(), title_id, file_name, start, stop, head)
                    .await
                {
                    Ok(response) => response,
                    Err(e) => {
                        warn!(title_id = %title_id, error = %e, "Download refused");
                        plain(e.status(), &e.to_string())
                    }
                }
            }
            _ => plain(StatusCode::NOT_FOUND, "404 page not found"),
        }
    }

    fn search(&self) -> Response<Body> {
        let results = search_results(&self.library.entries());
        match serde_json::to_vec(&results) {
            Ok(body) => {
                let mut response = Response::new(Body::from(body));
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                response
            }
            Err(e) => {
                error!("Failed to encode search results: {}", e);
                plain(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode results")
            }
        }
    }

    async fn download(
        &self,
        headers: &HeaderMap,
        title_id: &str,
        raw_file_name: &str,
        start: Option<&str>,
        stop: Option<&str>,
        head: bool,
    ) -> Result<Response<Body>, DownloadError> {
        let file_name = percent_decode_str(raw_file_name)
            .decode_utf8()
            .map_err(|e| DownloadError::FileName(e.to_string()))?;

        let entry = self
            .library
            .files_for_id(title_id)
            .into_iter()
            .find(|e| e.file_name() == file_name)
            .ok_or_else(|| DownloadError::NotFound(file_name.to_string()))?;
        if !entry.is_servable() {
            return Err(DownloadError::Unsupported(file_name.to_string()));
        }

        let io_error = |source| DownloadError::Io {
            name: file_name.to_string(),
            source,
        };
        let mut file = File::open(&entry.path).await.map_err(io_error)?;
        let size = file.metadata().await.map_err(io_error)?.len();

        let range = resolve_range(headers, start, stop, size)?;
        debug!(
            path = %entry.path.display(),
            start = range.start,
            stop = range.end(),
            "Serving file"
        );

        let disposition = format!(
            "attachment; filename=\"{}{}\"",
            title_id.to_ascii_uppercase(),
            extension_with_dot(&entry.path)
        );
        let disposition = HeaderValue::try_from(disposition)
            .map_err(|e| DownloadError::FileName(e.to_string()))?;

        let content_range = HeaderValue::try_from(range.content_range(size))
            .map_err(|e| DownloadError::Header(e.to_string()))?;

        let body = if head || range.length == 0 {
            Body::empty()
        } else {
            file.seek(SeekFrom::Start(range.start))
                .await
                .map_err(io_error)?;
            let (sender, body) = Body::channel();
            tokio::spawn(stream_range(
                file,
                sender,
                range.length,
                entry.path.clone(),
                Arc::clone(&self.reporter),
            ));
            body
        };

        let mut response = Response::new(body);
        *response.status_mut() = StatusCode::PARTIAL_CONTENT;
        let h = response.headers_mut();
        h.insert(CONTENT_DISPOSITION, disposition);
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
        h.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        h.insert(CONTENT_RANGE, content_range);
        h.insert(CONTENT_LENGTH, HeaderValue::from(range.length));
        Ok(response)
    }
}

/// A `Range` header wins over path offsets; neither means the whole file
fn resolve_range(
    headers: &HeaderMap,
    start: Option<&str>,
    stop: Option<&str>,
    size: u64,
) -> Result<HttpRange, DownloadError> {
    let (start, stop) = match headers.get(RANGE) {
        Some(value) => {
            let value = value.to_str().map_err(|_| RangeError::Invalid)?;
            match parse_range(value, size)?.as_slice() {
                [] => (0, size),
                [range] => (range.start, range.end()),
                _ => return Err(DownloadError::MultipleRanges),
            }
        }
        None => (
            start.map(parse_offset).transpose()?.unwrap_or(0),
            stop.map(parse_offset).transpose()?.unwrap_or(size),
        ),
    };

    if start > stop || stop > size {
        return Err(DownloadError::OutOfBounds { start, stop, size });
    }
    Ok(HttpRange {
        start,
        length: stop - start,
    })
}

fn parse_offset(s: &str) -> Result<u64, DownloadError> {
    s.parse().map_err(|_| DownloadError::Offset(s.to_string()))
}

fn extension_with_dot(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

/// Send `total` bytes from `file` in [`CHUNK_SIZE`] pieces.
///
/// Stops at the first read or write failure; the body is then aborted so
/// the client sees a truncated transfer.
async fn stream_range(
    mut file: File,
    mut sender: Sender,
    total: u64,
    path: PathBuf,
    reporter: Arc<dyn ProgressReporter>,
) {
    let mut sent = 0u64;
    while sent < total {
        let want = (total - sent).min(CHUNK_SIZE as u64);
        let mut chunk = Vec::with_capacity(want as usize);
        match (&mut file).take(want).read_to_end(&mut chunk).await {
            Ok(0) => {
                warn!(path = %path.display(), "File ended before the requested range");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!(path = %path.display(), "Error while reading file: {}", e);
                break;
            }
        }

        let n = chunk.len() as u64;
        if let Err(e) = sender.send_data(Bytes::from(chunk)).await {
            warn!(path = %path.display(), sent, total, "Transfer aborted: {}", e);
            break;
        }
        sent += n;
        reporter.report_progress(&path, sent, total);
    }

    if sent < total {
        sender.abort();
    }
}

fn plain(status: StatusCode, message: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(format!("{message}\n")));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn method_not_allowed() -> Response<Body> {
    plain(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
}

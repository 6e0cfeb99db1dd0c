//! Content server speaking the NUT/Tinfoil HTTP protocol.
//!
//! Endpoints, all under `/api`:
//!
//! - `GET /search` lists servable files, one row per title ID
//! - `GET|HEAD /download/{titleId}/{fileName}[/{start}[/{stop}]]` serves a
//!   byte range of one file (a `Range` header overrides the offsets)

pub mod range;
pub mod router;

use std::convert::Infallible;
use std::future::Future;
use std::net::{SocketAddr, TcpListener};
use std::path::Path;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use thiserror::Error;
use tracing::{debug, info};

use crate::library::LibraryIndex;

pub use range::{parse_range, HttpRange, RangeError};
pub use router::{search_results, DownloadError, Router, SearchResult, API_PREFIX, CHUNK_SIZE};

/// Receives transfer progress after every chunk sent
pub trait ProgressReporter: Send + Sync {
    fn report_progress(&self, path: &Path, sent: u64, total: u64);
}

/// Reports transfer progress to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn report_progress(&self, path: &Path, sent: u64, total: u64) {
        debug!(path = %path.display(), sent, total, "Transfer progress");
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Http(#[from] hyper::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server over a library index
pub struct ContentServer {
    host: String,
    port: u16,
    router: Router,
}

impl ContentServer {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        library: Arc<dyn LibraryIndex>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            router: Router::new(library, reporter),
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn listen<F>(&self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind((self.host.as_str(), self.port))
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        listener.set_nonblocking(true)?;
        let local: SocketAddr = listener.local_addr()?;

        let router = self.router.clone();
        let make_svc = make_service_fn(move |_conn| {
            let router = router.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let router = router.clone();
                    async move { Ok::<_, Infallible>(router.handle(req).await) }
                }))
            }
        });

        info!("Started NUT server at {}", local);
        Server::from_tcp(listener)?
            .serve(make_svc)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("NUT server stopped");
        Ok(())
    }
}

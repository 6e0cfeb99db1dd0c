//! Catalog Build Integration Tests
//!
//! Runs `build_catalog` against a local stub of the title feed that honours
//! `If-None-Match` and hands out ETags.

use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use hyper::header::{ETAG, IF_NONE_MATCH};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use slm::catalog::{build_catalog, BuildOutcome, CatalogError, CatalogMetadata};
use slm::store::{CatalogStore, SqliteCatalogStore};
use slm::CatalogEntry;

const TITLES: &str = r#"{
    "0100AAAAAAAAA000": {
        "id": "0100AAAAAAAAA000",
        "name": "Alpha Quest",
        "version": "0",
        "region": "US",
        "releaseDate": 20230401,
        "publisher": "Pear Games",
        "isDemo": false,
        "screenshots": ["https://img/1.png"],
        "size": 1024
    },
    "0100AAAAAAAAA800": {"id": "0100AAAAAAAAA800", "name": null, "version": 131072},
    "0100AAAAAAAAA001": {"id": "0100AAAAAAAAA001", "name": "Alpha Pack", "releaseDate": 20230000},
    "0100BBBBBBBBB000": {"id": "0100BBBBBBBBB000", "name": "Beta Racer", "version": 0, "region": "EU", "releaseDate": 0}
}"#;

const VERSIONS: &str = r#"{
    "0100aaaaaaaaa000": {"131072": "2023-06-01", "65536": "2023-05-01", "latest": "2023-06-01"}
}"#;

#[derive(Clone)]
struct Document {
    body: String,
    etag: String,
    /// Forced status; 200 means "serve normally"
    status: u16,
}

impl Document {
    fn ok(body: &str, etag: &str) -> Self {
        Self {
            body: body.to_string(),
            etag: etag.to_string(),
            status: 200,
        }
    }

    fn failing(status: u16) -> Self {
        Self {
            body: String::new(),
            etag: String::new(),
            status,
        }
    }
}

struct Feed {
    titles: Document,
    versions: Document,
    /// (path, If-None-Match) of every request seen
    requests: Vec<(String, Option<String>)>,
}

type SharedFeed = Arc<Mutex<Feed>>;

fn respond(feed: &SharedFeed, req: Request<Body>) -> Response<Body> {
    let mut feed = feed.lock().unwrap();
    let if_none_match = req
        .headers()
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    feed.requests
        .push((req.uri().path().to_string(), if_none_match.clone()));

    let doc = match req.uri().path() {
        "/titles.json" => feed.titles.clone(),
        "/versions.json" => feed.versions.clone(),
        _ => {
            return Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Body::empty())
                .unwrap()
        }
    };

    if doc.status != 200 {
        return Response::builder()
            .status(doc.status)
            .body(Body::empty())
            .unwrap();
    }
    if if_none_match.as_deref() == Some(doc.etag.as_str()) {
        return Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .body(Body::empty())
            .unwrap();
    }
    Response::builder()
        .header(ETAG, doc.etag)
        .body(Body::from(doc.body))
        .unwrap()
}

/// Start the stub feed, returning its base URL
fn start_feed(titles: Document, versions: Document) -> (String, SharedFeed) {
    let feed = Arc::new(Mutex::new(Feed {
        titles,
        versions,
        requests: Vec::new(),
    }));

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let shared = Arc::clone(&feed);
    let make_svc = make_service_fn(move |_conn| {
        let feed = Arc::clone(&shared);
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let response = respond(&feed, req);
                async move { Ok::<_, Infallible>(response) }
            }))
        }
    });
    tokio::spawn(Server::from_tcp(listener).unwrap().serve(make_svc));

    (format!("http://{}", addr), feed)
}

fn urls(base: &str) -> (String, String) {
    (format!("{}/titles.json", base), format!("{}/versions.json", base))
}

fn seeded_store(metadata: CatalogMetadata) -> SqliteCatalogStore {
    let store = SqliteCatalogStore::open_in_memory().unwrap();
    let mut entry = CatalogEntry::default();
    entry.data.id = "0100CCCCCCCCC000".to_string();
    entry.data.name = "Old Entry".to_string();
    store
        .replace_catalog(
            &[("0100CCCCCCCCC".to_string(), entry)].into_iter().collect(),
            &metadata,
        )
        .unwrap();
    store
}

#[tokio::test]
async fn test_build_catalog_from_feed() {
    let (base, _feed) = start_feed(Document::ok(TITLES, "\"t1\""), Document::ok(VERSIONS, "\"v1\""));
    let (titles_url, versions_url) = urls(&base);
    let store = SqliteCatalogStore::open_in_memory().unwrap();

    let mut steps = Vec::new();
    let outcome = build_catalog(&store, &titles_url, &versions_url, |step, total, message| {
        steps.push((step, total, message.to_string()))
    })
    .await
    .unwrap();

    assert_eq!(outcome, BuildOutcome::Rebuilt { entries: 2 });
    assert_eq!(steps.first().map(|s| s.0), Some(1));
    assert_eq!(steps.last().map(|s| (s.0, s.1)), Some((7, 7)));
    assert!(steps.iter().all(|s| s.1 == 7));

    let metadata = store.get_catalog_metadata().unwrap();
    assert_eq!(metadata.titles_etag, "\"t1\"");
    assert_eq!(metadata.versions_etag, "\"v1\"");

    let alpha = store.get_catalog_entry("0100AAAAAAAAA000").unwrap().unwrap();
    assert_eq!(alpha.data.name, "Alpha Quest");
    assert_eq!(alpha.data.release_date, "2023-04-01");
    assert_eq!(alpha.data.screenshots.len(), 1);
    assert_eq!(alpha.recent_update.id, "0100AAAAAAAAA800");
    assert_eq!(alpha.recent_update.version, 131072);
    let history: Vec<i64> = alpha.versions.iter().map(|v| v.version).collect();
    assert_eq!(history, vec![65536, 131072]);
    assert_eq!(alpha.dlcs.len(), 1);
    assert_eq!(alpha.dlcs[0].data.name, "Alpha Pack");
    assert_eq!(alpha.dlcs[0].data.release_date, "");

    let beta = store.get_catalog_entry("0100bbbbbbbbb800").unwrap().unwrap();
    assert_eq!(beta.data.name, "Beta Racer");
    assert_eq!(beta.data.release_date, "");
    assert!(beta.versions.is_empty());
}

#[tokio::test]
async fn test_second_build_is_noop() {
    let (base, feed) = start_feed(Document::ok(TITLES, "\"t1\""), Document::ok(VERSIONS, "\"v1\""));
    let (titles_url, versions_url) = urls(&base);
    let store = SqliteCatalogStore::open_in_memory().unwrap();

    build_catalog(&store, &titles_url, &versions_url, |_, _, _| {})
        .await
        .unwrap();
    let count = store.count().unwrap();
    let metadata = store.get_catalog_metadata().unwrap();
    let requests = feed.lock().unwrap().requests.len();

    let outcome = build_catalog(&store, &titles_url, &versions_url, |_, _, _| {})
        .await
        .unwrap();

    assert_eq!(outcome, BuildOutcome::AlreadyBuilt);
    assert_eq!(store.count().unwrap(), count);
    assert_eq!(store.get_catalog_metadata().unwrap(), metadata);
    assert_eq!(feed.lock().unwrap().requests.len(), requests);
}

#[tokio::test]
async fn test_refetches_document_reported_unchanged() {
    let (base, feed) = start_feed(Document::ok(TITLES, "\"t1\""), Document::ok(VERSIONS, "\"v1\""));
    let (titles_url, versions_url) = urls(&base);
    // Titles cached, versions never fetched
    let store = seeded_store(CatalogMetadata {
        titles_etag: "\"t1\"".to_string(),
        versions_etag: String::new(),
    });

    let outcome = build_catalog(&store, &titles_url, &versions_url, |_, _, _| {})
        .await
        .unwrap();
    assert_eq!(outcome, BuildOutcome::Rebuilt { entries: 2 });

    let requests = feed.lock().unwrap().requests.clone();
    let titles_requests: Vec<_> = requests
        .iter()
        .filter(|(path, _)| path == "/titles.json")
        .collect();
    assert_eq!(titles_requests.len(), 2);
    assert_eq!(titles_requests[0].1.as_deref(), Some("\"t1\""));
    assert_eq!(titles_requests[1].1, None);

    // The old entry was replaced, not merged
    assert!(store.get_catalog_entry("0100CCCCCCCCC000").unwrap().is_none());
    assert!(store.get_catalog_metadata().unwrap().is_complete());
}

#[tokio::test]
async fn test_both_unchanged_leaves_store_alone() {
    let (base, _feed) = start_feed(Document::failing(304), Document::failing(304));
    let (titles_url, versions_url) = urls(&base);
    let metadata = CatalogMetadata {
        titles_etag: "\"t0\"".to_string(),
        versions_etag: String::new(),
    };
    let store = seeded_store(metadata.clone());

    let outcome = build_catalog(&store, &titles_url, &versions_url, |_, _, _| {})
        .await
        .unwrap();

    assert_eq!(outcome, BuildOutcome::Unchanged);
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(store.get_catalog_metadata().unwrap(), metadata);
}

#[tokio::test]
async fn test_unchanged_after_refetch_is_incomplete() {
    let (base, _feed) = start_feed(Document::failing(304), Document::ok(VERSIONS, "\"v1\""));
    let (titles_url, versions_url) = urls(&base);
    let store = SqliteCatalogStore::open_in_memory().unwrap();

    let err = build_catalog(&store, &titles_url, &versions_url, |_, _, _| {})
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::Incomplete));
    assert_eq!(store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_failed_download_keeps_previous_catalog() {
    let (base, _feed) = start_feed(Document::ok(TITLES, "\"t2\""), Document::failing(500));
    let (titles_url, versions_url) = urls(&base);
    let metadata = CatalogMetadata {
        titles_etag: "\"t1\"".to_string(),
        versions_etag: String::new(),
    };
    let store = seeded_store(metadata.clone());

    let err = build_catalog(&store, &titles_url, &versions_url, |_, _, _| {})
        .await
        .unwrap_err();

    match err {
        CatalogError::Status { status, .. } => assert_eq!(status.as_u16(), 500),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(store.get_catalog_metadata().unwrap(), metadata);
}

#[tokio::test]
async fn test_undecodable_feed_keeps_previous_catalog() {
    let (base, _feed) = start_feed(
        Document::ok("{not json", "\"t2\""),
        Document::ok(VERSIONS, "\"v2\""),
    );
    let (titles_url, versions_url) = urls(&base);
    let metadata = CatalogMetadata::default();
    let store = seeded_store(metadata.clone());

    let err = build_catalog(&store, &titles_url, &versions_url, |_, _, _| {})
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::Decode { document: "titles", .. }));
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(store.get_catalog_metadata().unwrap(), metadata);
}

#[tokio::test]
async fn test_unreachable_feed_is_an_error() {
    // Bind then drop to get a port nobody listens on
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let base = format!("http://{}", addr);
    let (titles_url, versions_url) = urls(&base);
    let store = SqliteCatalogStore::open_in_memory().unwrap();

    let err = build_catalog(&store, &titles_url, &versions_url, |_, _, _| {})
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::Download { .. }));
}

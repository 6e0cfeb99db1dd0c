//! SQLite-backed catalog store.
//!
//! Entries are stored as JSON documents keyed by family prefix. Queries
//! run against a lazily loaded snapshot of the whole table, refreshed
//! after every write.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{paginate, CatalogFilters, CatalogStore, Page, StoreError};
use crate::catalog::{CatalogEntry, CatalogMetadata};
use crate::domain::family_prefix_of;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS catalog_entries (
        family TEXT PRIMARY KEY,
        data   TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS catalog_metadata (
        id            INTEGER PRIMARY KEY CHECK (id = 1),
        titles_etag   TEXT NOT NULL,
        versions_etag TEXT NOT NULL
    );
";

struct StoreState {
    conn: Connection,

    /// Loaded catalog snapshot, `None` until first query or after a write
    cache: Option<Arc<Vec<CatalogEntry>>>,
}

/// Catalog store persisted in a single SQLite file
pub struct SqliteCatalogStore {
    state: Mutex<StoreState>,
}

impl SqliteCatalogStore {
    /// Open (or create) the database at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        info!("Opened catalog database at {}", path.display());
        Self::with_connection(conn)
    }

    /// Database that lives only as long as this value
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            state: Mutex::new(StoreState { conn, cache: None }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Number of stored entries
    pub fn count(&self) -> Result<usize, StoreError> {
        let state = self.lock()?;
        let count: i64 =
            state
                .conn
                .query_row("SELECT COUNT(*) FROM catalog_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn load_all(conn: &Connection) -> Result<Vec<CatalogEntry>, StoreError> {
        let mut stmt = conn.prepare("SELECT data FROM catalog_entries ORDER BY family")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(serde_json::from_str(&row?)?);
        }
        Ok(entries)
    }

    fn insert_entries(
        conn: &Connection,
        entries: &HashMap<String, CatalogEntry>,
    ) -> Result<(), StoreError> {
        let mut stmt = conn.prepare(
            "INSERT OR REPLACE INTO catalog_entries (family, data) VALUES (?1, ?2)",
        )?;
        for (family, entry) in entries {
            let data = serde_json::to_string(entry)?;
            stmt.execute(params![family.to_ascii_uppercase(), data])?;
        }
        Ok(())
    }

    fn write_metadata(conn: &Connection, metadata: &CatalogMetadata) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO catalog_metadata (id, titles_etag, versions_etag) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                titles_etag = excluded.titles_etag,
                versions_etag = excluded.versions_etag",
            params![metadata.titles_etag, metadata.versions_etag],
        )?;
        Ok(())
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn get_catalog_metadata(&self) -> Result<CatalogMetadata, StoreError> {
        let state = self.lock()?;
        let metadata = state
            .conn
            .query_row(
                "SELECT titles_etag, versions_etag FROM catalog_metadata WHERE id = 1",
                [],
                |row| {
                    Ok(CatalogMetadata {
                        titles_etag: row.get(0)?,
                        versions_etag: row.get(1)?,
                    })
                },
            )
            .optional()?;

        Ok(metadata.unwrap_or_default())
    }

    fn update_catalog_metadata(&self, metadata: &CatalogMetadata) -> Result<(), StoreError> {
        let state = self.lock()?;
        Self::write_metadata(&state.conn, metadata)
    }

    fn clear_catalog(&self) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.conn.execute("DELETE FROM catalog_entries", [])?;
        state.cache = None;
        Ok(())
    }

    fn add_catalog_entries(
        &self,
        entries: &HashMap<String, CatalogEntry>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let tx = state.conn.transaction()?;
        Self::insert_entries(&tx, entries)?;
        tx.commit()?;
        state.cache = None;
        Ok(())
    }

    fn replace_catalog(
        &self,
        entries: &HashMap<String, CatalogEntry>,
        metadata: &CatalogMetadata,
    ) -> Result<(), StoreError> {
        // The lock is held across the transaction, so queries wait for
        // the commit (or rollback) instead of reading a half-built table.
        let mut state = self.lock()?;
        let tx = state.conn.transaction()?;
        tx.execute("DELETE FROM catalog_entries", [])?;
        Self::insert_entries(&tx, entries)?;
        Self::write_metadata(&tx, metadata)?;
        tx.commit()?;
        state.cache = None;

        info!(entries = entries.len(), "Catalog replaced");
        Ok(())
    }

    fn get_catalog_entry(&self, id: &str) -> Result<Option<CatalogEntry>, StoreError> {
        let family = family_prefix_of(id);
        let state = self.lock()?;
        let data: Option<String> = state
            .conn
            .query_row(
                "SELECT data FROM catalog_entries WHERE family = ?1",
                params![family],
                |row| row.get(0),
            )
            .optional()?;

        data.map(|d| serde_json::from_str(&d).map_err(StoreError::from))
            .transpose()
    }

    fn get_catalog_entries(
        &self,
        filters: Option<&CatalogFilters>,
        page_size: usize,
        cursor: usize,
    ) -> Result<Page<CatalogEntry>, StoreError> {
        let snapshot = {
            let mut state = self.lock()?;
            match state.cache.clone() {
                Some(cache) => cache,
                None => {
                    let loaded = Arc::new(Self::load_all(&state.conn)?);
                    debug!(entries = loaded.len(), "Loaded catalog into memory");
                    state.cache = Some(Arc::clone(&loaded));
                    loaded
                }
            }
        };

        Ok(match filters {
            Some(filters) => paginate(&filters.apply(&snapshot), page_size, cursor),
            None => paginate(&snapshot, page_size, cursor),
        })
    }
}

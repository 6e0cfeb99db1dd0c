//! Catalog CLI subcommands.
//!
//! - `update`: download the remote feed and rebuild the local catalog
//! - `list`: page through the catalog with filters
//! - `show`: print one catalog entry

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};

use super::open_store;
use crate::catalog::{build_catalog, BuildOutcome};
use crate::config;
use crate::store::{CatalogFilters, CatalogSortBy, CatalogStore};

/// Catalog-related subcommands
#[derive(Subcommand, Debug)]
pub enum CatalogCommands {
    /// Download the title feed and rebuild the catalog
    Update,

    /// List catalog entries one page at a time
    List {
        /// Case-insensitive name substring
        #[arg(short, long)]
        name: Option<String>,

        /// Title ID prefix
        #[arg(short, long)]
        id: Option<String>,

        /// Region to include (repeatable)
        #[arg(short, long)]
        region: Vec<String>,

        /// Sort order
        #[arg(short, long, value_enum)]
        sort: Option<SortArg>,

        /// Entries per page
        #[arg(long, default_value = "20")]
        page_size: usize,

        /// Cursor returned by the previous page
        #[arg(long, default_value = "0")]
        cursor: usize,

        /// Print the page as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the catalog entry for a title ID or family prefix
    Show {
        /// Title ID
        id: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortArg {
    Name,
    Id,
}

impl From<SortArg> for CatalogSortBy {
    fn from(s: SortArg) -> Self {
        match s {
            SortArg::Name => CatalogSortBy::Name,
            SortArg::Id => CatalogSortBy::Id,
        }
    }
}

/// Rebuild the catalog from the configured endpoints
pub async fn execute_update() -> Result<()> {
    let cfg = config::config()?;
    let store = open_store(cfg)?;

    let outcome = build_catalog(
        &store,
        &cfg.settings.titles_endpoint,
        &cfg.settings.versions_endpoint,
        |step, total, message| eprintln!("[{}/{}] {}", step, total, message),
    )
    .await
    .context("Catalog update failed")?;

    match outcome {
        BuildOutcome::AlreadyBuilt => println!("Catalog already built"),
        BuildOutcome::Unchanged => println!("Catalog is up to date"),
        BuildOutcome::Rebuilt { entries } => println!("Catalog rebuilt: {} titles", entries),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn execute_list(
    name: Option<String>,
    id: Option<String>,
    region: Vec<String>,
    sort: Option<SortArg>,
    page_size: usize,
    cursor: usize,
    json: bool,
) -> Result<()> {
    let cfg = config::config()?;
    let store = open_store(cfg)?;

    let filters = CatalogFilters {
        name,
        id,
        region,
        sort_by: sort.map(Into::into),
    };
    let page = store.get_catalog_entries(Some(&filters), page_size, cursor)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.data.is_empty() {
        println!("No catalog entries found. Use 'slm catalog update' to fetch the catalog.");
        return Ok(());
    }

    println!("{:<18} {:<8} {:<12} {:<40}", "ID", "REGION", "RELEASED", "NAME");
    println!("{}", "-".repeat(80));
    for entry in &page.data {
        let name = if entry.data.name.chars().count() > 40 {
            format!("{}...", entry.data.name.chars().take(37).collect::<String>())
        } else {
            entry.data.name.clone()
        };
        println!(
            "{:<18} {:<8} {:<12} {:<40}",
            entry.data.id, entry.data.region, entry.data.release_date, name
        );
    }

    println!("\nTotal: {} entries", page.total_count);
    if !page.is_last_page {
        println!("Next page: --cursor {}", page.next_cursor);
    }
    Ok(())
}

pub async fn execute_show(id: &str) -> Result<()> {
    let cfg = config::config()?;
    let store = open_store(cfg)?;

    let entry = store
        .get_catalog_entry(id)?
        .ok_or_else(|| anyhow::anyhow!("Title not found in catalog: {}", id))?;

    println!("{}", serde_json::to_string_pretty(&entry)?);
    Ok(())
}

//! Command-line interface for slm.
//!
//! Provides commands for updating and browsing the title catalog,
//! scanning the local library, and serving it to installer clients.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::{self, ResolvedConfig};
use crate::keys::{KeyProvider, ProdKeys};
use crate::library::{assemble, LibraryIndex, LibraryManager, ScanReport};
use crate::server::{ContentServer, LogReporter};
use crate::store::SqliteCatalogStore;

pub mod catalog;

/// slm - Switch library manager and NUT server
#[derive(Parser, Debug)]
#[command(name = "slm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the title catalog
    Catalog {
        #[command(subcommand)]
        command: catalog::CatalogCommands,
    },

    /// Scan the library directories and report what was found
    Scan {
        /// Directories to scan (defaults to scanDirectories from settings)
        directories: Vec<PathBuf>,

        /// Re-extract metadata for every file
        #[arg(long)]
        hard: bool,
    },

    /// List library games joined with the catalog
    Library {
        /// Directories to scan (defaults to scanDirectories from settings)
        directories: Vec<PathBuf>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan the library and serve it over HTTP
    Serve {
        /// Address to bind to (defaults to server.host from settings)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port from settings)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directories to scan (defaults to scanDirectories from settings)
        directories: Vec<PathBuf>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Catalog { command } => execute_catalog(command).await,
            Commands::Scan { directories, hard } => scan(directories, hard).await,
            Commands::Library { directories, json } => list_library(directories, json).await,
            Commands::Serve {
                host,
                port,
                directories,
            } => serve(host, port, directories).await,
            Commands::Config => show_config(),
        }
    }
}

/// Execute catalog subcommands
async fn execute_catalog(command: catalog::CatalogCommands) -> Result<()> {
    match command {
        catalog::CatalogCommands::Update => catalog::execute_update().await,
        catalog::CatalogCommands::List {
            name,
            id,
            region,
            sort,
            page_size,
            cursor,
            json,
        } => catalog::execute_list(name, id, region, sort, page_size, cursor, json).await,
        catalog::CatalogCommands::Show { id } => catalog::execute_show(&id).await,
    }
}

/// Open the catalog database, creating the home directory if needed
pub(crate) fn open_store(cfg: &ResolvedConfig) -> Result<SqliteCatalogStore> {
    std::fs::create_dir_all(&cfg.home)
        .with_context(|| format!("Failed to create {}", cfg.home.display()))?;
    let path = cfg.catalog_db();
    SqliteCatalogStore::open(&path)
        .with_context(|| format!("Failed to open catalog database: {}", path.display()))
}

/// Load product keys; without them the scanner uses file names
fn load_keys(cfg: &ResolvedConfig) -> Arc<dyn KeyProvider> {
    match ProdKeys::load_from_files(&cfg.key_file_candidates()) {
        Ok(keys) => {
            if let Some(source) = keys.source() {
                info!(keys = keys.len(), "Loaded product keys from {}", source.display());
            }
            Arc::new(keys)
        }
        Err(e) => {
            warn!("{}", e);
            Arc::new(ProdKeys::empty())
        }
    }
}

fn library_manager(cfg: &ResolvedConfig, directories: Vec<PathBuf>) -> Result<LibraryManager> {
    let directories = if directories.is_empty() {
        cfg.settings.scan_directories.clone()
    } else {
        directories
    };
    if directories.is_empty() {
        anyhow::bail!(
            "No directories to scan. Pass them as arguments or set scanDirectories in {}",
            cfg.home.join(config::paths::SETTINGS_FILE).display()
        );
    }

    Ok(LibraryManager::new(load_keys(cfg), directories).recursive(cfg.settings.scan_recursive))
}

/// Run a rescan off the async runtime
async fn run_scan(manager: Arc<LibraryManager>, hard: bool) -> Result<ScanReport> {
    tokio::task::spawn_blocking(move || {
        manager.rescan(hard, |current, total, message| {
            tracing::debug!(current, total, "{}", message);
        })
    })
    .await
    .context("Scan task failed")
}

async fn scan(directories: Vec<PathBuf>, hard: bool) -> Result<()> {
    let cfg = config::config()?;
    let manager = Arc::new(library_manager(cfg, directories)?);
    let report = run_scan(Arc::clone(&manager), hard).await?;

    println!("{:<18} {:<9} {:<6} {:<40}", "ID", "VERSION", "MODE", "FILE");
    println!("{}", "-".repeat(80));
    for entry in manager.entries().iter() {
        for id in entry.title_ids() {
            let version = entry
                .metadata
                .base_games
                .iter()
                .filter(|g| &g.id == id)
                .map(|g| g.version)
                .chain(entry.metadata.updates.iter().filter(|u| &u.id == id).map(|u| u.version))
                .chain(entry.metadata.dlcs.iter().filter(|d| &d.id == id).map(|d| d.version))
                .next()
                .unwrap_or_default();
            println!(
                "{:<18} {:<9} {:<6} {:<40}",
                id.as_str(),
                version,
                entry.metadata.extraction_type.to_string(),
                entry.file_name()
            );
        }
    }

    println!("\nIndexed: {} files", report.indexed);
    if !report.errors.is_empty() {
        println!("Skipped: {} files", report.errors.len());
        for (path, error) in &report.errors {
            println!("  {}: {}", path.display(), error);
        }
    }
    Ok(())
}

async fn list_library(directories: Vec<PathBuf>, json: bool) -> Result<()> {
    let cfg = config::config()?;
    let manager = Arc::new(library_manager(cfg, directories)?);
    run_scan(Arc::clone(&manager), false).await?;

    let store = open_store(cfg)?;
    let games = assemble(&manager.entries(), &store)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&games)?);
        return Ok(());
    }
    if games.is_empty() {
        println!("No games found in the library");
        return Ok(());
    }

    println!("{:<18} {:<6} {:<8} {:<5} {:<40}", "ID", "BASE", "UPDATES", "DLC", "NAME");
    println!("{}", "-".repeat(80));
    for game in &games {
        let dlcs_owned = game.dlcs.values().filter(|d| d.in_library).count();
        let update_marker = if game.is_recent_update_in_library { "*" } else { "" };
        println!(
            "{:<18} {:<6} {:<8} {:<5} {:<40}",
            game.game.data.id,
            if game.game.in_library { "yes" } else { "no" },
            format!("{}{}", game.updates.len(), update_marker),
            format!("{}/{}", dlcs_owned, game.dlcs.len()),
            game.game.data.name
        );
    }
    println!("\nTotal: {} games (* = latest update present)", games.len());
    Ok(())
}

async fn serve(host: Option<String>, port: Option<u16>, directories: Vec<PathBuf>) -> Result<()> {
    let cfg = config::config()?;
    let manager = Arc::new(library_manager(cfg, directories)?);
    run_scan(Arc::clone(&manager), false).await?;

    let host = host.unwrap_or_else(|| cfg.settings.server.host.clone());
    let port = port.unwrap_or(cfg.settings.server.port);
    let server = ContentServer::new(host, port, manager, Arc::new(LogReporter));

    server
        .listen(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutting down");
        })
        .await
        .context("Content server failed")
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;
    let s = &cfg.settings;

    println!(
        "Settings file: {}",
        cfg.settings_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:             {}", cfg.home.display());
    println!("  Catalog database: {}", cfg.catalog_db().display());
    println!("  Key files:");
    for candidate in cfg.key_file_candidates() {
        println!("    {}", candidate.display());
    }
    println!();
    println!("Library:");
    if s.scan_directories.is_empty() {
        println!("  (no scan directories)");
    }
    for dir in &s.scan_directories {
        println!("  {}", dir.display());
    }
    println!("  Recursive: {}", s.scan_recursive);
    println!();
    println!("Catalog feed:");
    println!("  Titles:   {}", s.titles_endpoint);
    println!("  Versions: {}", s.versions_endpoint);
    println!();
    println!("Server: {}:{}", s.server.host, s.server.port);
    println!("Debug:  {}", s.debug);

    Ok(())
}

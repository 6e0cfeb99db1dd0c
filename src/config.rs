//! Configuration for slm.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SLM_CONFIG, SLM_HOME)
//! 2. Settings file (settings.yaml in the slm home)
//! 3. Defaults (~/.slm)
//!
//! A missing settings file is not an error; every field has a default.

pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const DEFAULT_TITLES_ENDPOINT: &str = "https://tinfoil.media/repo/db/titles.json";
pub const DEFAULT_VERSIONS_ENDPOINT: &str = "https://tinfoil.media/repo/db/versions.json";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8465;

/// Raw settings file schema (matches YAML structure)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub debug: bool,
    pub prod_keys_path: Option<PathBuf>,
    pub scan_directories: Vec<PathBuf>,
    pub scan_recursive: bool,
    pub titles_endpoint: String,
    pub versions_endpoint: String,
    pub server: ServerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            prod_keys_path: None,
            scan_directories: Vec::new(),
            scan_recursive: true,
            titles_endpoint: DEFAULT_TITLES_ENDPOINT.to_string(),
            versions_endpoint: DEFAULT_VERSIONS_ENDPOINT.to_string(),
            server: ServerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Settings together with where they came from
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to the slm home (database, default key file)
    pub home: PathBuf,
    /// Settings file that was read, if one existed
    pub settings_file: Option<PathBuf>,
    pub settings: Settings,
}

impl ResolvedConfig {
    /// SQLite catalog database
    pub fn catalog_db(&self) -> PathBuf {
        self.home.join(paths::CATALOG_DB)
    }

    /// Key files to try, in order
    pub fn key_file_candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(path) = &self.settings.prod_keys_path {
            candidates.push(path.clone());
        }
        candidates.push(self.home.join(paths::PROD_KEYS));
        if let Some(path) = paths::switch_keys_file() {
            candidates.push(path);
        }
        candidates
    }
}

/// Load and parse a settings file
pub fn load_settings_file(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse settings file: {}", path.display()))
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let home = paths::slm_home()?;
    let settings_path = match std::env::var_os(paths::CONFIG_ENV) {
        Some(path) => PathBuf::from(path),
        None => home.join(paths::SETTINGS_FILE),
    };

    let (settings, settings_file) = if settings_path.exists() {
        (load_settings_file(&settings_path)?, Some(settings_path))
    } else {
        (Settings::default(), None)
    };

    Ok(ResolvedConfig {
        home,
        settings_file,
        settings,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration, bypassing the cache (useful for testing)
pub fn reload() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert!(!settings.debug);
        assert!(settings.scan_recursive);
        assert!(settings.scan_directories.is_empty());
        assert_eq!(settings.titles_endpoint, DEFAULT_TITLES_ENDPOINT);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8465);
    }

    #[test]
    fn test_settings_file_parsing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
debug: true
prodKeysPath: /keys/prod.keys
scanDirectories:
  - /games
  - /more-games
scanRecursive: false
server:
  port: 9000
"#
        )
        .unwrap();

        let settings = load_settings_file(&path).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.prod_keys_path, Some(PathBuf::from("/keys/prod.keys")));
        assert_eq!(settings.scan_directories.len(), 2);
        assert!(!settings.scan_recursive);
        assert_eq!(settings.server.port, 9000);
        // Unset fields keep their defaults
        assert_eq!(settings.server.host, DEFAULT_HOST);
        assert_eq!(settings.versions_endpoint, DEFAULT_VERSIONS_ENDPOINT);
    }

    #[test]
    fn test_empty_settings_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.yaml");
        std::fs::write(&path, "\n").unwrap();
        assert_eq!(load_settings_file(&path).unwrap(), Settings::default());
    }

    #[test]
    fn test_invalid_settings_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.yaml");
        std::fs::write(&path, "server: [1, 2").unwrap();
        assert!(load_settings_file(&path).is_err());
    }

    #[test]
    fn test_key_file_candidates_order() {
        let config = ResolvedConfig {
            home: PathBuf::from("/test/.slm"),
            settings_file: None,
            settings: Settings {
                prod_keys_path: Some(PathBuf::from("/keys/prod.keys")),
                ..Default::default()
            },
        };

        let candidates = config.key_file_candidates();
        assert_eq!(candidates[0], PathBuf::from("/keys/prod.keys"));
        assert_eq!(candidates[1], PathBuf::from("/test/.slm/prod.keys"));
        assert_eq!(config.catalog_db(), PathBuf::from("/test/.slm/catalog.db"));
    }
}

//! Canonical paths for slm.
//!
//! | Location | Purpose |
//! |----------|---------|
//! | `$SLM_HOME` (`~/.slm`) | settings, catalog database, default key file |
//! | `$SLM_CONFIG` | explicit settings file, overrides the home one |
//! | `~/.switch/prod.keys` | key file location shared with other tools |

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Environment variable overriding the home directory
pub const HOME_ENV: &str = "SLM_HOME";

/// Environment variable pointing at a settings file
pub const CONFIG_ENV: &str = "SLM_CONFIG";

pub const SETTINGS_FILE: &str = "settings.yaml";
pub const CATALOG_DB: &str = "catalog.db";
pub const PROD_KEYS: &str = "prod.keys";

/// Get the slm home directory ($SLM_HOME, else ~/.slm)
pub fn slm_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }
    Ok(dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".slm"))
}

/// Key file in the user's `~/.switch` directory
pub fn switch_keys_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".switch").join(PROD_KEYS))
}

//! Configuration loading and resolution
//!
//! Every knob resolves in the same priority order:
//! 1. Command-line argument (clap also folds in environment variables)
//! 2. TOML config file (`~/.config/drift/config.toml`, or
//!    `/etc/drift/config.toml` on Linux)
//! 3. Compiled default

use serde::Deserialize;
use std::path::PathBuf;
use tracing::warn;

/// Default HTTP port for the daemon
pub const DEFAULT_PORT: u16 = 5750;

/// Default remote catalog location (plain text, one track URL per line)
pub const DEFAULT_CATALOG_URL: &str =
    "https://atourcity.com/bkgoswami.com/wp/wp-content/uploads/all_files.txt";

/// Optional overrides read from the TOML config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
    pub catalog_url: Option<String>,
}

/// Fully resolved daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub catalog_url: String,
}

impl Config {
    /// Merge CLI arguments, file config, and compiled defaults.
    pub fn resolve(
        cli_port: Option<u16>,
        cli_database: Option<PathBuf>,
        cli_catalog_url: Option<String>,
        file: &FileConfig,
    ) -> Self {
        Self {
            port: cli_port.or(file.port).unwrap_or(DEFAULT_PORT),
            database_path: cli_database
                .or_else(|| file.database_path.clone())
                .unwrap_or_else(default_database_path),
            catalog_url: cli_catalog_url
                .or_else(|| file.catalog_url.clone())
                .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
        }
    }
}

/// Load the TOML config file if one exists.
///
/// A missing file is normal and yields defaults; an unreadable or
/// unparsable file is logged and ignored rather than blocking startup.
pub fn load_config_file() -> FileConfig {
    let Some(path) = find_config_file() else {
        return FileConfig::default();
    };

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!("Could not read config file {}: {}", path.display(), e);
            return FileConfig::default();
        }
    };

    match toml::from_str::<FileConfig>(&contents) {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring malformed config file {}: {}", path.display(), e);
            FileConfig::default()
        }
    }
}

/// First existing config file path for the platform
fn find_config_file() -> Option<PathBuf> {
    if let Some(path) = dirs::config_dir().map(|d| d.join("drift").join("config.toml")) {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/drift/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("drift"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/drift"))
        .join("drift.db")
}

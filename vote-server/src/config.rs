//! Startup configuration read from a JSON file.
//!
//! Keys are PascalCase and all optional; anything left out keeps its
//! default. A missing file is not an error, it just means "all defaults".

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct Config {
    /// Socket the HTTP server binds to.
    pub http_address: SocketAddr,
    /// Tally ledger file. The attempt ledger, when enabled, sits beside it
    /// with a `.count` suffix.
    pub database_path: PathBuf,
    /// Folder whose files become votable resources, served at `/static`.
    pub static_folder: PathBuf,
    /// Log file to append to. Empty means stdout.
    pub log_location: String,
    /// Raise the default log level to `debug`.
    pub debug: bool,
    /// Also keep a ledger of raw vote attempts per resource.
    pub dual_ledger: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_path: PathBuf::from("./votes.db"),
            static_folder: PathBuf::from("./static"),
            log_location: String::new(),
            debug: false,
            dual_ledger: false,
        }
    }
}

impl Config {
    /// Reads the file at `path`.
    ///
    /// Returns `Ok(None)` when the file does not exist so the caller can log
    /// the fallback once logging is up. A file that exists but does not
    /// parse is an error.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read config file {}", path.display()));
            }
        };

        let config = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(Some(config))
    }

    /// Log file path, if logs should not go to stdout.
    pub fn log_file(&self) -> Option<&Path> {
        let trimmed = self.log_location.trim();
        (!trimmed.is_empty()).then(|| Path::new(trimmed))
    }
}

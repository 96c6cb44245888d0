//! Registers every file under the static folder as a votable resource.
//!
//! The walk is iterative (an explicit stack of directories), so deeply
//! nested trees cannot overflow the call stack. Keys are the path the file
//! is served at, e.g. `static/cats/tabby.png`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tally_store::TallyError;
use tracing::{debug, warn};

use crate::backend::Tallies;

/// URL prefix (and key prefix) the static folder is mounted at.
pub const STATIC_MOUNT: &str = "static";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    /// Resources registered by this walk.
    pub inserted: usize,
    /// Resources that were already known from a previous run.
    pub existing: usize,
}

/// Walks `root` and registers each regular file with a zero tally.
///
/// Files already present keep their tallies, so seeding on every startup
/// is safe.
pub fn seed(root: &Path, tallies: &Tallies) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    let mut pending: Vec<(PathBuf, String)> = vec![(root.to_path_buf(), STATIC_MOUNT.to_string())];

    while let Some((dir, prefix)) = pending.pop() {
        let entries = std::fs::read_dir(&dir)
            .with_context(|| format!("failed to read directory {}", dir.display()))?;

        for entry in entries {
            let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
            let file_type = entry
                .file_type()
                .with_context(|| format!("failed to stat {}", entry.path().display()))?;

            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                warn!(path = %entry.path().display(), "skipping non-UTF-8 file name");
                continue;
            };
            let key = format!("{prefix}/{name}");

            if file_type.is_dir() {
                pending.push((entry.path(), key));
                continue;
            }

            match tallies.register(key.as_bytes()) {
                Ok(()) => {
                    debug!(%key, "registered resource");
                    report.inserted += 1;
                }
                Err(TallyError::AlreadyExists) => report.existing += 1,
                Err(err) => {
                    return Err(err).with_context(|| format!("failed to register {key}"));
                }
            }
        }
    }

    Ok(report)
}

//! Where log output goes and how loud it is.
//!
//! Events go through a [`tracing_appender::non_blocking`] writer, so handlers
//! never block on log I/O. The returned [`WorkerGuard`] flushes on drop and
//! must be held until the process exits.

use std::path::{Path, PathBuf};

use tracing::{warn, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::Config;

/// Where [`open_writer`] ended up sending output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
    /// The configured file could not be opened; output went to stdout.
    Fallback { path: PathBuf, reason: String },
}

impl Destination {
    fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }
}

/// Log level used when `RUST_LOG` is not set.
pub fn default_level(config: &Config) -> &'static str {
    if config.debug { "debug" } else { "info" }
}

/// Opens the configured log file in append mode, or stdout when no file is
/// configured or the file is unusable.
pub fn open_writer(config: &Config) -> (NonBlocking, WorkerGuard, Destination) {
    let Some(path) = config.log_file() else {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        return (writer, guard, Destination::Stdout);
    };

    match file_appender(path) {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (writer, guard, Destination::File(path.to_path_buf()))
        }
        Err(reason) => {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            let destination = Destination::Fallback {
                path: path.to_path_buf(),
                reason,
            };
            (writer, guard, destination)
        }
    }
}

fn file_appender(path: &Path) -> Result<RollingFileAppender, String> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| "log location has no file name".to_string())?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|err| err.to_string())
}

/// The formatting subscriber used by the server, writing to `writer`.
pub fn subscriber<W>(
    config: &Config,
    writer: W,
    ansi: bool,
) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(config)));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(writer)
        .finish()
}

/// Installs the global subscriber. Keep the guard alive until exit.
pub fn init(config: &Config) -> WorkerGuard {
    let (writer, guard, destination) = open_writer(config);
    let _ = subscriber(config, writer, !destination.is_file()).try_init();

    if let Destination::Fallback { path, reason } = &destination {
        warn!(path = %path.display(), %reason, "cannot open log file, logging to stdout");
    }
    guard
}

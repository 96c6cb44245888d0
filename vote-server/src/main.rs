use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use vote_server::{
    api::{self, AppState},
    backend::Tallies,
    cli::Cli,
    config::Config,
    logging, seed,
    server::VoteServer,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = Config::load(&cli.config)?;
    let config = loaded.clone().unwrap_or_default();
    let _log_guard = logging::init(&config);

    if loaded.is_none() {
        warn!(path = %cli.config.display(), "config file not found, using defaults");
    }
    info!(
        version = env!("CARGO_PKG_VERSION"),
        database = %config.database_path.display(),
        dual_ledger = config.dual_ledger,
        "starting vote server"
    );

    let tallies = Tallies::open(&config.database_path, config.dual_ledger).with_context(|| {
        format!(
            "failed to open tally store at {}",
            config.database_path.display()
        )
    })?;

    let report = seed::seed(&config.static_folder, &tallies)?;
    let size = tallies.repository().count()?;
    info!(
        inserted = report.inserted,
        existing = report.existing,
        total = size,
        "seeded resources"
    );

    let tallies = Arc::new(tallies);
    let app = api::router(AppState::new(Arc::clone(&tallies), size), &config.static_folder);

    let listener = TcpListener::bind(config.http_address)
        .await
        .with_context(|| format!("failed to bind {}", config.http_address))?;
    let server = VoteServer::new(listener, app);
    info!("listening on {}", server.local_addr()?);

    let outcome = server.run_until_ctrl_c().await;

    match Arc::try_unwrap(tallies) {
        Ok(tallies) => tallies.close(),
        Err(_) => warn!("tally store still in use at shutdown, releasing on drop"),
    }

    if let Err(err) = &outcome {
        warn!("server exited with error: {err:?}");
    }
    outcome
}

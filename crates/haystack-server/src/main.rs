//! `haystackd`: process entry point. Parses CLI flags, opens volumes,
//! wraps them in the single-node consensus reference implementation, and
//! runs the HTTP frontend until SIGINT.

mod config;
mod error;
mod http;
mod mime_type;
mod multipart;
mod routes;
mod server;
mod upload;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use haystack_replicate::SoloLog;
use haystack_store::{DiskLocation, Store};
use tracing::{info, warn};

use config::Config;

fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::parse();
    if let Err(e) = run(config) {
        tracing::error!(error = %e, "haystackd exited with an error");
        std::process::exit(1);
    }
}

fn run(config: Config) -> error::ServerResult<()> {
    let data_path = Path::new(&config.data_path);
    let identity = server::load_or_create_identity(data_path)?;
    info!(identity = %identity, connection = %config.connection_string(), "starting haystackd");

    let volume_dir_string = config.volume_dir();
    let mut location = DiskLocation::new(Path::new(&volume_dir_string))?;
    location.discover()?;

    let bootstrap_ids = config.bootstrap_volume_ids();
    for &id in &bootstrap_ids {
        if !location.contains(id) {
            location.add_volume(id, &config.collection)?;
        }
    }

    let store = Store::new(vec![location], bootstrap_ids);
    let log: Arc<dyn haystack_replicate::ConsensusLog> =
        Arc::new(SoloLog::new(store, config.connection_string()));
    log.start()?;

    if !config.join.is_empty() {
        warn!(leader = %config.join, "join is opaque to this reference consensus implementation; ignoring");
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handle = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        shutdown_handle.store(true, Ordering::SeqCst);
    })
    .expect("failed to install SIGINT handler");

    let server = server::Server::bind(&config.host, config.port, shutdown)?;
    server.run(log);

    Ok(())
}

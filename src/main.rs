//! line-echo: a concurrent TCP line-echo server
//!
//! Every newline-terminated message a client sends is written back to it
//! unchanged.
//!
//! Features:
//! - One task per connection, bounded by a fixed admission gate
//! - Graceful shutdown on SIGTERM: stop accepting, let in-flight
//!   connections finish their current exchange, then exit
//! - Logs to stdout (info) and stderr (errors)

mod admission;
mod config;
mod error;
mod logging;
mod protocols;
mod server;
mod shutdown;

use config::Config;
use server::Server;
use tracing::{error, info};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    logging::init(&config.log_level)?;

    info!(
        listen = %config.listen,
        max_connections = config.max_connections,
        workers = ?config.workers,
        drain_timeout = ?config.drain_timeout,
        "Starting line-echo server"
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(workers) = config.workers.filter(|&n| n > 0) {
        builder.worker_threads(workers);
    }
    let runtime = builder.enable_all().build()?;

    runtime.block_on(serve(config))
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Fatal: unable to start listener");
            std::process::exit(1);
        }
    };

    let _signal = shutdown::watch_termination(server.shutdown_notice())?;

    server.run().await?;
    Ok(())
}

//! Relay server executable.
//!
//! Holds no document state: it assigns site identifiers, tracks presence,
//! and fans out frames between connected editors.

use std::process::ExitCode;

use clap::Parser;
use edito_collab::server::{CollabServer, ServerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "edito-server", about = "Relay server for edito sessions")]
struct Flags {
    /// Network address to listen on.
    #[arg(long, default_value = ":8080")]
    addr: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let flags = Flags::parse();
    let server = CollabServer::new(ServerConfig {
        addr: flags.addr,
        ..ServerConfig::default()
    });

    tracing::info!("starting server on {}", server.addr());
    if let Err(e) = server.run().await {
        tracing::error!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

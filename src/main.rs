//! hostbridge - Host Access Services for Remote Agents
//!
//! CLI entry point. Two services share this binary:
//! - `hostbridge files`    - filesystem service (default port 8080)
//! - `hostbridge terminal` - shell execution service (default port 8081)

#![forbid(unsafe_code)]

mod api;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hostbridge", version, about = "Session-oriented host access services")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the file service (file and directory operations, diff, project context)
    Files {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Run the terminal service (commands, processes, history)
    Terminal {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8081)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if present)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hostbridge=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting hostbridge v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    match cli.command {
        Command::Files { host, port } => server::run_files(&host, port).await,
        Command::Terminal { host, port } => server::run_terminal(&host, port).await,
    }
}

//! simpledbd: the SimpleDB operator daemon.
//!
//! Single binary that assembles the operator:
//! - State store (redb)
//! - Control loop (work queue + reconciler workers)
//! - Rollout simulator
//! - REST API
//!
//! # Usage
//!
//! ```text
//! simpledbd run --config simpledb.toml --port 8080 --data-dir /var/lib/simpledb
//! ```

mod config;
mod standalone;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::OperatorConfig;

const DEFAULT_LOG_FILTER: &str = "info,simpledbd=debug,simpledb=debug";

#[derive(Parser)]
#[command(name = "simpledbd", about = "SimpleDB operator daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the operator (store, controller, rollout simulator and API in one process).
    Run {
        /// Path to simpledb.toml.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides `[server] port`).
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state (overrides `[store] data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Emit logs as JSON lines.
        #[arg(long)]
        log_json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            port,
            data_dir,
            log_json,
        } => {
            init_tracing(log_json);

            let mut operator_config = match config {
                Some(path) => OperatorConfig::from_file(&path)?,
                None => OperatorConfig::default(),
            };
            if let Some(port) = port {
                operator_config.server.port = port;
            }
            if let Some(data_dir) = data_dir {
                operator_config.store.data_dir = data_dir;
            }

            standalone::run(operator_config).await
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

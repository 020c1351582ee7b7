//! cqlmux-cli - Command-line interface for cqlmux
//!
//! Provides both a REPL and one-shot query execution.

mod commands;
mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use cqlmux_client::{Connection, ConnectionConfig};
use cqlmux_protocol::{Consistency, DEFAULT_CQL_VERSION, DEFAULT_PORT, PROTOCOL_VERSION};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cqlmux-cli")]
#[command(about = "Command-line client for CQL native protocol servers")]
#[command(version)]
struct Cli {
    /// Server host
    #[arg(long, env = "CQLMUX_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, env = "CQLMUX_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// CQL version announced in STARTUP
    #[arg(long, env = "CQLMUX_CQL_VERSION", default_value = DEFAULT_CQL_VERSION)]
    cql_version: String,

    /// Native protocol version (3 or 4)
    #[arg(long, env = "CQLMUX_PROTOCOL_VERSION", default_value_t = PROTOCOL_VERSION)]
    protocol_version: u8,

    /// Consistency level for queries
    #[arg(short, long, env = "CQLMUX_CONSISTENCY", default_value = "ONE")]
    consistency: Consistency,

    /// Print rows as JSON objects
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive REPL
    Repl,

    /// Run a single statement and exit
    Query {
        /// CQL statement
        cql: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = ConnectionConfig::new(cli.host.clone(), cli.port)
        .with_cql_version(cli.cql_version.clone())
        .with_protocol_version(cli.protocol_version);

    match cli.command {
        Some(Commands::Repl) | None => {
            tracing::debug!("starting REPL against {}", config.addr());
            repl::run(config, cli.consistency, cli.json).await?;
        }
        Some(Commands::Query { cql }) => {
            tracing::debug!("running one-shot query against {}", config.addr());
            let conn = Connection::connect(config).await.map_err(|e| {
                eprintln!("{}: {}", "Connection failed".red(), e);
                e
            })?;

            match commands::execute(&conn, &cql, cli.consistency, cli.json).await {
                Ok(output) => println!("{}", output),
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    let _ = conn.close().await;
                    std::process::exit(1);
                }
            }

            conn.close().await?;
        }
    }

    Ok(())
}

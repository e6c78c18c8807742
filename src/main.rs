//! Nalu MCP Server - Main entrypoint.
//!
//! Parses the command line, loads configuration, sets up logging and runs
//! the HTTP server on a runtime sized from the configuration.

use anyhow::Context;
use clap::{Parser, Subcommand};
use nalu_mcp_lib::config::{ConfigLoader, LogConfig, NaluConfig};
use nalu_mcp_lib::error::{NaluError, NaluResult};
use nalu_mcp_lib::server::NaluServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Environment variable prefix for configuration overrides.
const ENV_PREFIX: &str = "NALU";

/// Command line arguments for the Nalu MCP Server.
#[derive(Parser, Debug)]
#[clap(name = "Nalu MCP Server", version, author, about)]
struct Args {
    /// Path to configuration file
    #[clap(short, long, value_parser)]
    config: Option<PathBuf>,

    /// Command to execute
    #[clap(subcommand)]
    command: Option<Command>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start the server
    Start {
        /// Address to bind, overriding the configuration
        #[clap(short, long, value_parser)]
        address: Option<SocketAddr>,
    },

    /// Validate the configuration file
    Validate,

    /// Generate a default configuration file
    GenConfig {
        /// Path to output configuration file
        #[clap(short, long, value_parser)]
        output: PathBuf,
    },
}

/// Initialize the logging system.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(log: &LogConfig) -> NaluResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_line_number(log.source_location)
        .with_file(log.source_location)
        .with_thread_names(true);

    let installed = if log.json {
        builder.json().try_init()
    } else {
        builder.pretty().try_init()
    };
    installed.map_err(|e| NaluError::Custom(format!("Failed to set global tracing subscriber: {e}")))
}

fn load_config(loader: &ConfigLoader) -> NaluConfig {
    match loader.load() {
        Ok(config) => config,
        Err(e) => {
            // Logging is not configured yet; fall back to the defaults to report.
            let _ = init_logging(&LogConfig::default());
            error!("Configuration error: {}", e);
            process::exit(1);
        }
    }
}

fn start(config: NaluConfig) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.worker_threads)
        .thread_name("nalu-worker")
        .enable_all()
        .build()
        .context("failed to build the tokio runtime")?;

    runtime.block_on(async move {
        let server = NaluServer::build(config)
            .await
            .context("failed to build server components")?;
        server.run().await.context("server terminated with an error")
    })
}

/// Main entry point for the application.
fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let loader = ConfigLoader::new(args.config.as_deref(), ENV_PREFIX);

    match args.command.unwrap_or(Command::Start { address: None }) {
        Command::Start { address } => {
            let mut config = load_config(&loader);
            if let Some(address) = address {
                config.server.address = address;
            }
            init_logging(&config.log)?;
            nalu_mcp_lib::init();

            info!(
                name = %config.server.name,
                address = %config.server.address,
                worker_threads = config.server.worker_threads,
                "Server configured"
            );
            start(config)
        }
        Command::Validate => {
            let config = load_config(&loader);
            init_logging(&config.log)?;
            info!("Configuration validated successfully");
            Ok(())
        }
        Command::GenConfig { output } => {
            init_logging(&LogConfig::default())?;
            info!("Generating default configuration");
            let default_config = NaluConfig::default();

            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent).map_err(NaluError::Io)?;
            }

            let toml = toml::to_string_pretty(&default_config)
                .map_err(|e| NaluError::Custom(format!("Failed to serialize config: {e}")))?;
            std::fs::write(&output, toml).map_err(NaluError::Io)?;

            info!("Default configuration written to {:?}", output);
            Ok(())
        }
    }
}

//! College directory proxy CLI
//!
//! Runs the HTTP proxy, validates configuration, and issues one-off queries
//! against the directory for debugging.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use college_proxy::{
    error::Result,
    models::{Config, PageRequest},
    server,
    services::{Partition, QueryEngine, QueryFilters},
};
use serde_json::json;

/// college-proxy - Caching proxy for an external college directory
#[derive(Parser, Debug)]
#[command(name = "college-proxy", version, about = "College directory proxy")]

struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP proxy
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,

        /// Prefetch a state's colleges in the background at startup
        #[arg(long = "warm-state")]
        warm_states: Vec<String>,

        /// Prefetch a district's colleges in the background at startup
        #[arg(long = "warm-district")]
        warm_districts: Vec<String>,
    },

    /// Validate the configuration file
    Validate,

    /// Run one query and print the JSON result
    Fetch {
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        district: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        limit: Option<i64>,
    },

    /// List states, or the districts of one state
    Regions {
        /// List districts of this state instead of all states
        #[arg(long)]
        state: Option<String>,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    log::debug!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Serve {
            port,
            warm_states,
            warm_districts,
        } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;

            let engine = Arc::new(QueryEngine::from_config(&config)?);
            log::info!(
                "Proxying {} (TTL {}s, page size {})",
                config.upstream.base_url,
                config.cache.ttl_secs,
                config.upstream.page_size
            );

            let partitions: Vec<Partition> = warm_states
                .into_iter()
                .map(Partition::State)
                .chain(warm_districts.into_iter().map(Partition::District))
                .collect();
            if !partitions.is_empty() {
                let engine = Arc::clone(&engine);
                let concurrency = config.server.warm_concurrency;
                tokio::spawn(async move {
                    engine.warm(partitions, concurrency).await;
                });
            }

            server::serve(&config.server, engine).await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }

        Command::Fetch {
            state,
            district,
            search,
            page,
            limit,
        } => {
            config.validate()?;
            let engine = QueryEngine::from_config(&config)?;
            let filters = QueryFilters {
                state,
                district,
                search,
            };

            let result = engine
                .query(&filters, PageRequest::new(page, limit))
                .await?;
            let output = json!({
                "success": true,
                "colleges": result.items,
                "pagination": result.pagination,
                "source": result.source,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Regions { state } => {
            config.validate()?;
            let engine = QueryEngine::from_config(&config)?;

            let names = match state {
                Some(state) => engine.districts(&state).await?,
                None => engine.states().await?,
            };
            for name in names.iter() {
                println!("{}", name);
            }
            log::info!("{} entries", names.len());
        }
    }

    Ok(())
}

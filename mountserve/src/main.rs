//! Mountserve - serve local directories over HTTP under URL prefixes
//!
//! This is the main entry point for the mountserve CLI.

use anyhow::Context;
use clap::{Parser, Subcommand};
use mountserve_core::config::{ConfigLoader, LogFormat, LoggingConfig, MountserveConfig};
use mountserve_http::{bind, MountServer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(target_os = "linux")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Mountserve - serve local directories under URL prefixes
#[derive(Parser)]
#[command(name = "mountserve")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server with a configuration file
    Run {
        /// Path to the configuration file (.json or .toml)
        #[arg(default_value = "mountserve.toml")]
        config: String,
    },

    /// Serve a single directory at `/`
    Serve {
        /// Address to listen on
        #[arg(long, default_value = ":8080")]
        listen: String,

        /// Directory to serve
        #[arg(long, default_value = ".")]
        dir: String,

        /// Refuse uploads, directory creation and deletion
        #[arg(long)]
        readonly: bool,

        /// Show dot-files in listings
        #[arg(long)]
        show_hidden: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "mountserve.toml")]
        config: String,
    },

    /// Show version information
    Version,
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match logging.format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config: config_path } => {
            let config = ConfigLoader::load(&config_path)
                .with_context(|| format!("Failed to load config from {}", config_path))?;
            init_tracing(&config.logging, cli.verbose);
            tracing::info!("Starting mountserve with config: {}", config_path);
            run_server(config).await
        }

        Commands::Serve {
            listen,
            dir,
            readonly,
            show_hidden,
        } => {
            let mut config = MountserveConfig::single(listen, dir, readonly);
            config.server.show_hidden = show_hidden;
            init_tracing(&config.logging, cli.verbose);
            run_server(config).await
        }

        Commands::Validate { config: config_path } => {
            let config = ConfigLoader::load(&config_path)
                .with_context(|| format!("Failed to load config from {}", config_path))?;
            let addr = config.listen_addr()?;
            let mounts = config.validate()?;

            println!("✅ Configuration is valid: {}", config_path);
            println!("   Listen: {}", addr);
            for mount in mounts {
                println!(
                    "   📂 {} -> {}{}",
                    mount.url_prefix,
                    mount.local_dir.display(),
                    if mount.readonly { " (readonly)" } else { "" }
                );
            }
            Ok(())
        }

        Commands::Version => {
            println!("mountserve {}", mountserve_core::VERSION);
            Ok(())
        }
    }
}

async fn run_server(config: MountserveConfig) -> anyhow::Result<()> {
    let addr = config.listen_addr()?;
    let cancel = CancellationToken::new();
    let server = Arc::new(MountServer::from_config(&config, cancel.clone())?);
    let listener = bind(addr).await?;

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("👋 Received Ctrl-C, shutting down"),
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
        shutdown.cancel();
    });

    println!("🚀 Mountserve running on http://{}", addr);
    server.serve(listener).await?;
    Ok(())
}

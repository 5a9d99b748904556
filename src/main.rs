//! opwire - UDP Operation Routing
//!
//! A datagram router that decodes typed binary operations from peers and
//! streams application state back, with a demo arena service on top.

mod arena;
mod config;
mod network;
mod protocol;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use arena::{ArenaEvents, MoveTranslator, PositionGenerator, ProbeTranslator};
use config::Config;
use network::{Router, RouterConfig};

/// opwire - UDP operation routing
#[derive(Parser)]
#[command(name = "opwire")]
#[command(author = "Opwire Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Route typed binary operations over UDP", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the arena server
    Serve {
        /// Address to listen on (host:port)
        #[arg(short, long)]
        listen: Option<String>,

        /// Maximum datagram size in bytes
        #[arg(short, long)]
        max_datagram_size: Option<usize>,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show system information
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    match cli.command {
        Commands::Serve {
            listen,
            max_datagram_size,
        } => {
            run_server(config, listen, max_datagram_size).await?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config();
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
        Commands::Info => {
            print_info(&config);
        }
    }

    Ok(())
}

/// Run the arena server
async fn run_server(
    config: Config,
    listen: Option<String>,
    max_datagram_size: Option<usize>,
) -> anyhow::Result<()> {
    let listen = listen.unwrap_or_else(|| config.network.listen.clone());
    let max_datagram_size = max_datagram_size.unwrap_or(config.network.max_datagram_size);

    tracing::info!(
        "Starting opwire server '{}' on {}",
        config.general.name,
        listen
    );

    let router_config = RouterConfig::new(listen).with_max_datagram_size(max_datagram_size);
    let events = ArenaEvents::new(config.arena.clone());

    let mut router = Router::bind(router_config, Box::new(events)).await?;
    router.add_translator(Box::new(ProbeTranslator));
    router.add_translator(Box::new(MoveTranslator));
    router.add_generator(Box::new(PositionGenerator));

    let router = Arc::new(router);
    let local_addr = router.local_addr()?;

    println!("\n========================================");
    println!("  Opwire Arena Running");
    println!("========================================");
    println!("  Name: {}", config.general.name);
    println!("  Listen: {}", local_addr);
    println!("  Max datagram: {} bytes", max_datagram_size);
    println!("========================================");
    println!("\nWaiting for peers...");
    println!("Press Ctrl+C to stop.\n");

    tokio::select! {
        _ = router.run() => {}
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    tracing::info!("Server stopped");

    Ok(())
}

/// Print system information
fn print_info(config: &Config) {
    println!("Opwire System Information");
    println!("=========================\n");

    println!("Instance: {} ({})", config.general.name, config.instance_id());
    println!("Listen address: {}", config.network.listen);
    println!("Max datagram size: {} bytes", config.network.max_datagram_size);

    println!("\nWire format: [u32 type tag][payload], big-endian, packed per datagram");
    println!("Default port: {}", protocol::DEFAULT_PORT);
    println!(
        "Arena: tick {} ms, idle timeout {} ms, speed {}, field +/-{} x +/-{}",
        config.arena.tick_interval_ms,
        config.arena.idle_timeout_ms,
        config.arena.move_speed,
        config.arena.bounds_x,
        config.arena.bounds_y
    );
}

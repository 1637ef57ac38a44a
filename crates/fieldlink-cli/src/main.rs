//! Command-line interface for the FieldLink gateway.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fieldlink_core::GatewayConfig;
use fieldlink_gateway::Gateway;

/// FieldLink - route device commands across MQTT, WebSocket, and serial.
#[derive(Parser, Debug)]
#[command(name = "fieldlink")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Configuration file (JSON).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Run the gateway.
    Serve,
    /// Validate the configuration and print the resolved form.
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up panic hook to catch panics before they abort
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\n=== PANIC ===");
        if let Some(location) = panic_info.location() {
            eprintln!(
                "Location: {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        } else {
            eprintln!("Location: <unknown>");
        }
        eprintln!("Message: {}", panic_info);
        eprintln!("==============\n");
    }));

    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => GatewayConfig::from_file(path)?,
        None => GatewayConfig::default(),
    };

    match args.command {
        Command::Serve => {
            tracing::info!(
                "starting gateway for {} devices on {}",
                config.devices.len(),
                config.websocket.bind_addr()
            );
            Gateway::new(config).run().await?;
        }
        Command::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Initialize tracing output.
fn init_logging(verbose: bool) {
    let default_directive = if verbose {
        "fieldlink=debug"
    } else {
        "fieldlink=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    // JSON format for production/container environments
    let json_logging = std::env::var("FIELDLINK_LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }
}

//! OpenAuto Companion - Head Unit Companion Client
//!
//! This is the main entry point for the companion daemon.

use anyhow::{bail, Result};
use clap::Parser;
use openauto_companion::companion::run_companion;
use openauto_companion::config::{load_config, Config};
use openauto_companion::pairing::{derive_secret, PairingPayload, Vehicle, VehicleRegistry};
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// OpenAuto Companion - paired telemetry client and SOCKS5 relay
#[derive(Parser, Debug)]
#[command(name = "openauto-companion")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,

    /// Pairing payload scanned from the head unit (openauto://pair?...)
    #[arg(long, value_name = "URI")]
    pair: Option<String>,

    /// Print the management URL from the pairing payload and exit
    #[arg(long, requires = "pair")]
    print_management_url: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level, args.json_log)?;

    // Load configuration
    let mut config = match &args.config {
        Some(path) => {
            let config = load_config(path)?;
            info!("Configuration loaded from: {:?}", path);
            config
        }
        None => Config::default(),
    };

    // Apply a freshly scanned pairing payload before starting
    if let Some(raw) = &args.pair {
        let Some(payload) = PairingPayload::parse(raw) else {
            bail!("Not a valid pairing payload: {}", raw);
        };

        if args.print_management_url {
            println!("{}", payload.management_url());
            return Ok(());
        }

        apply_pairing(&mut config, &payload)?;
    }

    info!("OpenAuto Companion v{}", openauto_companion::VERSION);
    info!(
        "Gateway: {}:{}",
        config.companion.gateway_host, config.companion.gateway_port
    );

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    // Handle Ctrl+C and termination signals (cross-platform)
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            // On Windows, only handle Ctrl+C
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C, shutting down...");
        }

        let _ = shutdown_tx_clone.send(true);
    });

    // Run the companion
    run_companion(config, shutdown_rx).await
}

/// Fold a pairing payload into the configuration and the vehicle registry.
fn apply_pairing(config: &mut Config, payload: &PairingPayload) -> Result<()> {
    let secret = derive_secret(&payload.pin);

    config.companion.shared_secret = Some(secret.clone());
    config.companion.vehicle_ssid = Some(payload.ssid.clone());
    if let Some(device_id) = &payload.device_id {
        config.companion.vehicle_id = Some(device_id.clone());
    }

    if let Some(path) = &config.companion.registry_path {
        let mut registry = VehicleRegistry::load(path)?;
        let mut vehicle = Vehicle::new(payload.ssid.clone(), secret);
        if let Some(device_id) = &payload.device_id {
            vehicle.id = device_id.clone();
        }
        match registry.add(vehicle) {
            Ok(()) => {
                registry.save(path)?;
                info!("Vehicle '{}' saved to registry {:?}", payload.ssid, path);
            }
            // An already paired vehicle keeps its registry record; the
            // freshly derived secret still applies to this run.
            Err(e) => warn!("Vehicle not added to registry: {}", e),
        }
    }

    info!("Paired with '{}'", payload.ssid);
    info!("Management URL: {}", payload.management_url());
    Ok(())
}

/// Setup logging based on configuration
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}

// src/main.rs - navap client entry point
use clap::Parser;
use navap::config::{self, Config};
use navap::nav::{Autopilot, CancelFlag, NavError};
use navap::transport::UdpLink;
use std::path::Path;
use tokio::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "navap", about = "Remote navigation autopilot client")]
struct Args {
    /// Address of the simulator host
    #[arg(short, long)]
    server: Option<String>,

    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "navap.toml")]
    config: String,

    /// Verbose control-loop logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let args = Args::parse();

    let level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    tracing::info!("Starting navap navigation autopilot");

    // Missing config file just means defaults; a broken one is fatal
    let mut config = if Path::new(&args.config).exists() {
        tracing::info!("Loading configuration from: {}", args.config);
        config::load_config(&args.config).map_err(|error| {
            tracing::error!("Failed to load config from '{}': {}", args.config, error);
            Box::new(error) as Box<dyn std::error::Error + Send + Sync + 'static>
        })?
    } else {
        tracing::info!("No config file at '{}', using defaults", args.config);
        Config::default()
    };

    if let Some(server) = args.server {
        config.link.server = Some(server);
    }
    if config.link.server.is_none() {
        tracing::error!("No server address supplied (use --server or link.server in the config)");
        return Err("server address is required".into());
    }

    let cancel = CancelFlag::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            signal_cancel.cancel();
        }
    });

    let handshake_window = Duration::from_millis(config.link.handshake_timeout_ms);
    let mut link = UdpLink::bind(&config.link).await?;
    tracing::info!("Awaiting incoming connections...");

    // One navigation session per host connection; navigating somewhere else
    // means the host opens a new session.
    while !cancel.is_cancelled() {
        if let Err(error) = link.await_handshake(handshake_window).await {
            tracing::debug!(%error, "no session opened, listening again");
            continue;
        }

        let mut autopilot = Autopilot::new(link, &config.nav, cancel.clone());
        match autopilot.run().await {
            Ok(()) => tracing::info!("session complete, vessel at destination"),
            Err(NavError::Cancelled) => {
                tracing::info!("session cancelled");
                break;
            }
            Err(error) => {
                // session is dead but the process survives to take a new one
                tracing::error!(%error, "session failed, tearing down");
            }
        }
        link = autopilot.into_link();
        link.disconnect();
    }

    Ok(())
}

//! Example: follow the X-Ray stream in the terminal
//!
//! Run with: cargo run -p pmoxray --example now_playing
//! Or with a config file: cargo run -p pmoxray --example now_playing -- ./xray.yaml
//!
//! The access token can be given without a file:
//! PMOXRAY_CONFIG__AUTH__VALUE=<token> cargo run -p pmoxray --example now_playing

use pmoxray::{LogDisplay, LogRedirect, XrayConfig, XraySession};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = env::args().nth(1).map(PathBuf::from);
    let config = XrayConfig::load(path.as_deref())?;

    if !config.auth.has_credentials() {
        tracing::warn!("No access token configured, expect a redirect to {}", config.login_url);
    }

    println!("Following {}...\n", config.endpoint);

    let redirect = LogRedirect::new(config.login_url.clone());
    let mut session = XraySession::connect(&config, LogDisplay, LogDisplay, redirect)?;

    tokio::select! {
        _ = session.run() => println!("Stream closed"),
        _ = tokio::signal::ctrl_c() => println!("Interrupted"),
    }

    session.stop();
    let reconciler = session.reconciler();
    println!(
        "{} snapshots, {} transport errors",
        reconciler.snapshot_count(),
        reconciler.transport_error_count()
    );

    Ok(())
}

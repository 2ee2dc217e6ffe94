#![deny(unsafe_code)]
use anyhow::{Context, Result};
use clap::Parser;
use relay_config::load_from_path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "relay-daemon", version, about = "Relay bus daemon")]
struct Args {
    /// Path to a `relay.toml` configuration file.
    #[arg(long, default_value = "relay.toml")]
    config: std::path::PathBuf,

    /// Working directory new agent sessions are rooted at absent a more
    /// specific one.
    #[arg(long, default_value = ".")]
    default_cwd: std::path::PathBuf,

    /// Enable verbose debug logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("relay=debug")
    } else {
        EnvFilter::new("relay=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let (options, warnings) = load_from_path(&args.config).with_context(|| format!("load {}", args.config.display()))?;
    for warning in warnings {
        warn!(target: "relay.daemon", %warning, "configuration warning");
    }

    let daemon = relay_daemon::assemble(options, args.default_cwd.display().to_string())
        .await
        .context("assemble relay bus")?;

    info!(target: "relay.daemon", "relay bus running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await.context("await ctrl-c")?;
    info!(target: "relay.daemon", "shutdown signal received");

    daemon.shutdown();
    Ok(())
}

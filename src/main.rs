#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::style)]

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use sharebox::cli::Args;
use sharebox::{LifecycleOptions, ProxyLifecycle};
use tracing_subscriber::EnvFilter;

const ENGINE_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args).await {
        tracing::error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let descriptor = sharebox::decode(&args.link).context("Failed to decode share link")?;
    tracing::info!(
        "Decoded {} outbound '{}' -> {}",
        descriptor.kind(),
        descriptor.tag,
        descriptor.address()
    );

    let mut options = LifecycleOptions::new();
    options.listen_addr = args.listen;
    options.log_level = args.log_level;
    let mut lifecycle = ProxyLifecycle::new(descriptor, options);

    match &args.output {
        Some(path) => {
            lifecycle
                .routing_config()
                .write_to_file(path)
                .with_context(|| format!("Failed to write config to {}", path.display()))?;
            tracing::info!("Config written to {}", path.display());
        }
        None if !args.run => {
            println!("{}", lifecycle.routing_config().to_json_pretty()?);
        }
        None => {}
    }

    if !args.run {
        return Ok(());
    }

    lifecycle
        .start_with_timeout(ENGINE_TIMEOUT)
        .await
        .context("Failed to start proxy")?;
    tracing::info!("Proxy listening on {}, press Ctrl-C to stop", lifecycle.listen_address());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    lifecycle
        .stop_with_timeout(ENGINE_TIMEOUT)
        .await
        .context("Failed to stop proxy")?;
    tracing::info!("Proxy stopped");
    Ok(())
}

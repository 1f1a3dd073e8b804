//! Main entry point for the media-relay server

use anyhow::Context;
use clap::Parser;
use media_relay::cli::{Args, VerbosityLevel};
use media_relay::download::{SweepConfig, Sweeper};
use media_relay::server::{self, AppState};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.verbosity_level());
    debug!("Starting media-relay with args: {:?}", args);

    let config = args.into_config();
    info!(
        "Using {} (ffmpeg: {}), transient files in {}",
        config.yt_dlp.display_name(),
        config.ffmpeg_location,
        config.temp_dir.display()
    );

    let state = AppState::from_config(&config).context("failed to initialize services")?;
    let sweeper = Sweeper::start(SweepConfig::from_config(&config));

    let result = server::serve(&config, state)
        .await
        .with_context(|| format!("server on {} failed", config.bind_addr));

    sweeper.stop().await;
    result
}

fn init_logging(verbosity: VerbosityLevel) {
    // RUST_LOG wins over the command line level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(verbosity.default_filter()));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .compact())
        .init();
}

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use volta_feed::clock::SystemClock;
use volta_feed::config::{AppConfig, CONFIG_PATH};
use volta_feed::connection::{FeedHandle, WsConnector};
use volta_feed::reporter;
use volta_feed::ticker::MatchTicker;
use volta_feed::types::FeedEvent;

#[derive(Parser)]
#[command(name = "volta-feed", about = "Volta virtual football live feed consumer")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Feed WebSocket URL (overrides config and VOLTA_WS_URL)
    #[arg(long)]
    url: Option<String>,

    /// Feed client id (overrides config and VOLTA_CLIENT_ID)
    #[arg(long)]
    client_id: Option<String>,

    /// Feed token (overrides config and VOLTA_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Delay in milliseconds before reconnecting after a dropped channel
    #[arg(long)]
    reconnect_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Load config: file, then environment, then flags
    let mut config = AppConfig::load_or_default(&args.config)?;
    config.apply_env();
    if let Some(url) = args.url {
        config.feed.url = url;
    }
    if let Some(client_id) = args.client_id {
        config.feed.client_id = client_id;
    }
    if let Some(token) = args.token {
        config.feed.token = token;
    }
    if let Some(ms) = args.reconnect_ms {
        config.settings.reconnect_delay_ms = ms;
    }
    if config.settings.reconnect_delay_ms == 0 {
        anyhow::bail!("--reconnect-ms must be positive");
    }

    let endpoint = config.feed.endpoint()?;
    info!(
        "Feed: {}://{}{} (retry after {}ms)",
        endpoint.scheme(),
        endpoint.host_str().unwrap_or("?"),
        endpoint.path(),
        config.settings.reconnect_delay_ms
    );

    let feed = FeedHandle::spawn(endpoint, WsConnector, config.settings.reconnect_delay());
    let ticker = MatchTicker::spawn(feed.reader(), SystemClock);

    let mut reader = feed.reader();
    let mut readings = ticker.readings();
    let mut reported = 0u64;
    let mut last_error: Option<String> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            changed = reader.changed() => {
                if changed.is_err() {
                    warn!("Feed stopped unexpectedly");
                    break;
                }
                let state = reader.snapshot_and_mark_seen();
                if state.last_error != last_error {
                    if let Some(err) = &state.last_error {
                        warn!("{err}");
                    }
                    last_error = state.last_error.clone();
                }
                if state.snapshots > reported {
                    reported = state.snapshots;
                    if let Some(league) = &state.league {
                        reporter::report_event(&FeedEvent::from_league(league));
                    }
                }
            }
            changed = readings.changed() => {
                if changed.is_err() {
                    break;
                }
                let reading = readings.borrow_and_update().clone();
                if let Some(reading) = reading {
                    info!(
                        "Match {} [{}] {}",
                        reading.match_id,
                        reading.phase.label(),
                        reading.display
                    );
                }
            }
        }
    }

    ticker.shutdown().await;
    feed.shutdown().await;
    info!("Stopped after {reported} snapshot(s)");
    Ok(())
}

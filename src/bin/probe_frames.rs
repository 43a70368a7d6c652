//! Raw feed probe: open one channel, print every frame's tag and how it decodes.
//!
//! Reads credentials the same way as `volta-feed` (config.toml, then `VOLTA_*`
//! environment) and runs for a bounded duration, then prints counts by tag.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use volta_feed::config::{AppConfig, CONFIG_PATH};
use volta_feed::decoder::{CURRENT_TAG, Decoded, decode_frame};

#[derive(Parser)]
#[command(name = "probe_frames", about = "Print raw Volta feed frames and decode results")]
struct Args {
    /// How long to listen, in seconds
    #[arg(long, default_value_t = 30)]
    seconds: u64,

    /// Characters of each raw frame to print
    #[arg(long, default_value_t = 120)]
    preview: usize,
}

#[derive(Default)]
struct TagStats {
    frames: usize,
    decoded: usize,
    failed: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = AppConfig::load_or_default(Path::new(CONFIG_PATH))?;
    config.apply_env();
    let endpoint = config.feed.endpoint()?;

    println!("=== Volta Feed Probe ===");
    println!("Endpoint: {}://{}{}", endpoint.scheme(), endpoint.host_str().unwrap_or("?"), endpoint.path());
    println!("Duration: {}s", args.seconds);
    println!();

    let (mut ws, _) = connect_async(endpoint.as_str())
        .await
        .context("failed to open feed channel")?;
    println!("Connected.");

    let duration = Duration::from_secs(args.seconds);
    let start = Instant::now();
    let mut by_tag: HashMap<String, TagStats> = HashMap::new();
    let mut other_messages = 0usize;

    while start.elapsed() < duration {
        match tokio::time::timeout(Duration::from_secs(1), ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                let elapsed = start.elapsed().as_secs_f64();
                let preview: String = text.chars().take(args.preview).collect();
                match decode_frame(&text) {
                    Ok(Decoded::Snapshot(league)) => {
                        let stats = by_tag.entry(CURRENT_TAG.to_string()).or_default();
                        stats.frames += 1;
                        stats.decoded += 1;
                        let first = league.current_match();
                        println!(
                            "[{elapsed:.1}s] current | league {} '{}' | {} match(es) | first: {}",
                            league.id,
                            league.name,
                            league.matches.len(),
                            first
                                .map(|m| format!("#{} {} vs {} ({})", m.match_id, m.home_team, m.away_team, m.phase().label()))
                                .unwrap_or_else(|| "-".to_string())
                        );
                    }
                    Ok(Decoded::Ignored { tag }) => {
                        println!("[{elapsed:.1}s] {tag} | ignored | {preview}");
                        by_tag.entry(tag).or_default().frames += 1;
                    }
                    Err(e) => {
                        println!("[{elapsed:.1}s] ? | {e} | {preview}");
                        let stats = by_tag.entry("<undecodable>".to_string()).or_default();
                        stats.frames += 1;
                        stats.failed += 1;
                    }
                }
            }
            Ok(Some(Ok(Message::Close(frame)))) => {
                println!("Server closed channel: {frame:?}");
                break;
            }
            Ok(Some(Ok(_))) => other_messages += 1,
            Ok(Some(Err(e))) => {
                println!("Channel error: {e}");
                break;
            }
            Ok(None) => {
                println!("Stream ended");
                break;
            }
            Err(_) => {} // 1s idle, check the deadline
        }
    }

    // Summary
    println!();
    println!("=== Summary ===");
    println!("Duration: {:.1}s", start.elapsed().as_secs_f64());
    println!("Non-text messages: {other_messages}");
    let mut tags: Vec<_> = by_tag.into_iter().collect();
    tags.sort_by(|a, b| b.1.frames.cmp(&a.1.frames));
    for (tag, stats) in tags {
        println!(
            "  {tag}: {} frame(s), {} decoded, {} failed",
            stats.frames, stats.decoded, stats.failed
        );
    }

    Ok(())
}

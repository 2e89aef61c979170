use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use hls_monitor::{
    config::Config,
    models::LiveSnapshot,
    services::LiveMetricsService,
    utils::UrlUtils,
};

#[derive(Parser)]
#[command(name = "hls-monitor")]
#[command(version)]
#[command(about = "Live HLS stream health monitor with adaptive polling")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path (defaults to $CONFIG_FILE or config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info", global = true)]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Poll a playlist repeatedly, paced by the adaptive refresh interval
    Watch {
        /// Playlist URL (may be percent-encoded)
        url: String,
        /// Stop after this many polls
        #[arg(long)]
        max_polls: Option<u64>,
        /// Print full JSON snapshots instead of one-line summaries
        #[arg(long)]
        json: bool,
    },
    /// Run a single poll cycle and print the snapshot as JSON
    Poll {
        /// Playlist URL (may be percent-encoded)
        url: String,
    },
    /// Check that a playlist URL answers and parses
    TestUrl { url: String },
    /// Probe and check a single segment
    Segment { url: String },
    /// Report whether ffprobe can be executed
    CheckFfprobe,
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load()?,
    };

    if let Command::Config = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let service = LiveMetricsService::from_config(&config)?;

    match cli.command {
        Command::Watch {
            url,
            max_polls,
            json,
        } => watch(&service, &UrlUtils::decode_path_param(&url), max_polls, json).await?,
        Command::Poll { url } => match service.poll_encoded(&url).await {
            Ok(snapshot) => print_json(&snapshot)?,
            Err(failure) => {
                print_json(&failure)?;
                bail!("poll failed: {}", failure);
            }
        },
        Command::TestUrl { url } => {
            let report = service.test_url(&UrlUtils::decode_path_param(&url)).await;
            print_json(&report)?;
        }
        Command::Segment { url } => {
            let details = service.segment_details(&UrlUtils::decode_path_param(&url)).await;
            print_json(&details)?;
        }
        Command::CheckFfprobe => {
            let available = service.prober().ffprobe_available().await;
            print_json(&serde_json::json!({ "available": available }))?;
        }
        Command::Config => {}
    }

    service.shutdown().await;
    Ok(())
}

fn init_tracing(log_level: &str, format: LogFormat) {
    let log_filter = format!("hls_monitor={log_level}");
    let json = format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn summary_line(snapshot: &LiveSnapshot) -> String {
    format!(
        "{} segments={} success={:.1}% bitrate={}bps video={} {} {:.2}fps audio={} {} next={:.0}s",
        snapshot.timestamp.format("%H:%M:%S"),
        snapshot.total_segments,
        snapshot.stats.success_rate,
        snapshot.stats.avg_bitrate,
        snapshot.video_info.codec,
        snapshot.video_info.resolution,
        snapshot.video_info.frame_rate,
        snapshot.audio_info.codec,
        snapshot.audio_info.channel_layout,
        snapshot.performance.recommended_refresh_interval,
    )
}

async fn watch(service: &LiveMetricsService, url: &str, max_polls: Option<u64>, json: bool) -> Result<()> {
    info!(
        "Starting live monitoring of {}",
        UrlUtils::obfuscate_credentials(url)
    );

    let mut polls = 0u64;
    loop {
        match service.poll(url).await {
            Ok(snapshot) if json => print_json(&snapshot)?,
            Ok(snapshot) => println!("{}", summary_line(&snapshot)),
            Err(failure) => warn!("Poll failed: {}", failure),
        }

        polls += 1;
        if max_polls.is_some_and(|max| polls >= max) {
            break;
        }

        let interval: Duration = service.recommended_interval().await;
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
        }
    }

    Ok(())
}

//! renderq CLI Application

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use renderq_core::domain::RenderqConfig;
use renderq_infra::audio::{Bridge, ClockReport, RenderClock, SineSource};

#[derive(Parser)]
#[command(name = "renderq")]
#[command(about = "Real-time to worker audio render bridge", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bridge for a while and print its counters as JSON
    Run {
        /// TOML configuration file; defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// How long to run, in seconds
        #[arg(short, long, default_value_t = 2.0)]
        seconds: f64,

        /// What drives the audio side
        #[arg(long, value_enum, default_value_t = HostKind::Clock)]
        host: HostKind,
    },

    /// Write the default configuration
    Config {
        /// Destination file
        #[arg(short, long, default_value = "renderq.toml")]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum HostKind {
    /// Simulated device clock
    Clock,
    /// Default output device (requires the `cpal-host` feature)
    Cpal,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    tracing::info!("renderq starting...");

    match cli.command {
        Command::Run {
            config,
            seconds,
            host,
        } => {
            let config = match config {
                Some(path) => RenderqConfig::load_from_file(&path)
                    .await
                    .with_context(|| format!("loading {}", path.display()))?,
                None => RenderqConfig::default(),
            };
            let duration = Duration::from_secs_f64(seconds.max(0.0));
            match host {
                HostKind::Clock => run_clock(&config, duration).await,
                HostKind::Cpal => run_cpal(&config, duration).await,
            }
        }
        Command::Config { output } => {
            RenderqConfig::default()
                .save_to_file(&output)
                .await
                .with_context(|| format!("writing {}", output.display()))?;
            println!("{}", output.display());
            Ok(())
        }
    }
}

async fn run_clock(config: &RenderqConfig, duration: Duration) -> anyhow::Result<()> {
    let bridge = Bridge::build(&config.bridge, config.clock.kernel.build())?;
    let running = bridge.start()?;
    if !running.monitor().wait_until_ready(Duration::from_secs(1)) {
        anyhow::bail!("worker did not start");
    }
    let (audio, worker, monitor) = running.into_parts();

    let sample_rate = config.clock.sample_rate;
    let clock = RenderClock::new(config.bridge.quantum()?, sample_rate, config.bridge.max_channels)?
        .with_source(SineSource::new(config.clock.tone_hz, sample_rate));
    let handle = clock.start(audio)?;

    tokio::time::sleep(duration).await;

    let (_audio, report) = handle.stop()?;
    worker.stop()?;
    print_stats(Some(report), &monitor.stats())
}

#[cfg(feature = "cpal-host")]
async fn run_cpal(config: &RenderqConfig, duration: Duration) -> anyhow::Result<()> {
    use renderq_infra::audio::CpalOutputHost;

    let host = CpalOutputHost::open_default()?;
    let bridge = Bridge::build(&config.bridge, config.clock.kernel.build())?;
    let running = bridge.start()?;
    if !running.monitor().wait_until_ready(Duration::from_secs(1)) {
        anyhow::bail!("worker did not start");
    }
    let (audio, worker, monitor) = running.into_parts();

    let source = SineSource::new(config.clock.tone_hz, host.sample_rate());
    let stream = host.play(
        audio,
        source,
        config.bridge.quantum()?,
        config.bridge.max_channels,
    )?;

    tokio::time::sleep(duration).await;

    drop(stream);
    worker.stop()?;
    print_stats(None, &monitor.stats())
}

#[cfg(not(feature = "cpal-host"))]
async fn run_cpal(_config: &RenderqConfig, _duration: Duration) -> anyhow::Result<()> {
    anyhow::bail!("renderq was built without the cpal-host feature")
}

fn print_stats(
    clock: Option<ClockReport>,
    bridge: &renderq_infra::audio::BridgeStats,
) -> anyhow::Result<()> {
    let report = serde_json::json!({
        "clock": clock,
        "bridge": bridge,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

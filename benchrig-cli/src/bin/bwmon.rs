//! `bwmon` - memory and LLC bandwidth sampler
//!
//! Reads the BlueField-3 hwmon event counters at a fixed interval and prints
//! one block of bandwidth lines per tick on stdout. Runs until SIGINT or
//! SIGTERM; the orchestrator starts it as a background role and reads its log
//! back with the active-window estimator.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use benchrig_core::sampler::{CounterWidth, SamplerEvent};
use benchrig_core::{
    BenchError, BenchResult, ConfigError, CounterLayout, SamplerSettings, TelemetryError,
    TracingConfig, TracingLevel, init_tracing, start_sampler,
};
use clap::{Args, Parser, Subcommand};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};

/// Hardware counter bandwidth sampler
#[derive(Parser)]
#[command(name = "bwmon")]
#[command(author, version, about = "Samples DPU memory and LLC bandwidth counters")]
struct Bwmon {
    /// Increase log verbosity on stderr (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    profile: Profile,
}

#[derive(Subcommand)]
enum Profile {
    /// DRAM read/write bandwidth in MB/s (mss0 + mss1)
    Memory(CounterArgs),

    /// LLC access and miss traffic in MB per interval
    Llc {
        #[command(flatten)]
        counters: CounterArgs,

        /// Number of LLC tiles
        #[arg(long)]
        channels: Option<usize>,
    },
}

#[derive(Args)]
struct CounterArgs {
    /// Parent directory of the hwmon devices
    #[arg(long)]
    root: Option<PathBuf>,

    /// hwmon device name
    #[arg(long)]
    device: Option<String>,

    /// Sampling interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Counter width in bits
    #[arg(long)]
    width: Option<u32>,

    /// Bytes represented by one counter event
    #[arg(long)]
    bytes_per_event: Option<u64>,
}

impl CounterArgs {
    fn settings(&self) -> BenchResult<SamplerSettings> {
        let mut settings = SamplerSettings::default();
        if let Some(ref root) = self.root {
            settings.hwmon_root.clone_from(root);
        }
        if let Some(ref device) = self.device {
            settings.device.clone_from(device);
        }
        if let Some(interval_ms) = self.interval_ms {
            settings.interval_ms = interval_ms;
        }
        if let Some(bits) = self.width {
            settings.counter_width = CounterWidth::new(bits).ok_or_else(|| {
                ConfigError::Invalid(format!("counter width must be 1..=64 bits, got {bits}"))
            })?;
        }
        if let Some(bytes) = self.bytes_per_event {
            if bytes == 0 {
                return Err(ConfigError::Invalid("bytes per event must be positive".into()).into());
            }
            settings.bytes_per_event = bytes;
        }
        Ok(settings)
    }
}

impl Profile {
    fn resolve(&self) -> BenchResult<(CounterLayout, SamplerSettings)> {
        match self {
            Self::Memory(args) => {
                let settings = args.settings()?;
                Ok((CounterLayout::memory(&settings.device_dir()), settings))
            }
            Self::Llc { counters, channels } => {
                let mut settings = counters.settings()?;
                if let Some(channels) = *channels {
                    settings.llc_channels = channels;
                }
                let layout = CounterLayout::llc(&settings.device_dir(), settings.llc_channels);
                Ok((layout, settings))
            }
        }
    }
}

async fn sample(layout: CounterLayout, settings: &SamplerSettings) -> BenchResult<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    info!(
        device = %settings.device_dir().display(),
        interval_ms = settings.effective_interval().as_millis() as u64,
        "Sampling started"
    );
    let (handle, mut events) = start_sampler(layout, settings);
    let mut stdout = std::io::stdout();
    let mut requested = false;
    let mut last_error: Option<String> = None;

    loop {
        tokio::select! {
            _ = sigint.recv(), if !requested => {
                requested = true;
                handle.stop().await;
            }
            _ = sigterm.recv(), if !requested => {
                requested = true;
                handle.stop().await;
            }
            event = events.recv() => match event {
                Some(SamplerEvent::Tick(tick)) => {
                    let written = stdout
                        .write_all(tick.render().as_bytes())
                        .and_then(|()| stdout.flush());
                    if let Err(e) = written {
                        warn!(error = %e, "stdout closed, stopping");
                        handle.stop().await;
                        requested = true;
                    }
                }
                Some(SamplerEvent::ReadError(err)) => {
                    warn!(error = %err, "Counter read failed");
                    last_error = Some(err);
                }
                Some(SamplerEvent::Stopped) | None => break,
            }
        }
    }

    if requested {
        info!("Sampling stopped");
        Ok(())
    } else {
        Err(TelemetryError::CounterRead {
            path: settings.device_dir(),
            reason: last_error.unwrap_or_else(|| "sampler stopped unexpectedly".to_string()),
        }
        .into())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Bwmon::parse();

    let level = TracingLevel::from_verbosity(cli.verbose, false);
    if let Err(e) = init_tracing(&TracingConfig::new().with_level(level)) {
        eprintln!("Warning: {e}");
    }

    let result = match cli.profile.resolve() {
        Ok((layout, settings)) => sample(layout, &settings).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("bwmon: {e}");
            ExitCode::from(exit_status(&e))
        }
    }
}

const fn exit_status(err: &BenchError) -> u8 {
    match err {
        BenchError::Telemetry(_) => 3,
        _ => 1,
    }
}

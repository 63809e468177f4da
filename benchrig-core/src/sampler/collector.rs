//! Bandwidth computation from consecutive counter snapshots and the periodic
//! sampling loop

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::counter::{CounterWidth, wrapping_delta};
use super::layout::{ChannelReading, CounterLayout, CounterSnapshot, RateUnit};
use super::settings::SamplerSettings;
use crate::tracing::span_names;

/// Maximum consecutive read errors before the sampler gives up
const MAX_CONSECUTIVE_ERRORS: u32 = 3;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Bandwidth of one channel over one tick
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelBandwidth {
    /// Channel name
    pub name: String,
    /// Read bandwidth
    pub read_mb: f64,
    /// Write bandwidth
    pub write_mb: f64,
}

/// Bandwidth of one counter group over one tick
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBandwidth {
    /// Group label
    pub label: Option<String>,
    /// Per-channel values
    pub channels: Vec<ChannelBandwidth>,
    /// Read bandwidth summed over channels
    pub read_mb: f64,
    /// Write bandwidth summed over channels
    pub write_mb: f64,
}

/// Result of one sampling tick
#[derive(Debug, Clone, PartialEq)]
pub struct BandwidthTick {
    /// Per-group bandwidth
    pub groups: Vec<GroupBandwidth>,
    /// Unit of every value in this tick
    pub unit: RateUnit,
    /// Time since the previous snapshot
    pub elapsed: Duration,
    /// Wall-clock time of the snapshot
    pub timestamp: DateTime<Utc>,
    /// First tick: no previous snapshot, every value is zero
    pub baseline: bool,
}

impl BandwidthTick {
    /// Renders the tick as sampler log lines
    ///
    /// The unlabelled group yields `Read: 12.34 MB/s   Write: 5.67 MB/s`.
    /// Labelled groups yield their per-channel lists followed by a prefixed
    /// total line, and the block ends with a separator.
    #[must_use]
    pub fn render(&self) -> String {
        let suffix = self.unit.suffix();
        let mut out = String::new();
        let mut labelled = false;

        for group in self.groups.iter().filter(|g| g.label.is_some()) {
            labelled = true;
            let label = group.label.as_deref().unwrap_or_default();
            let list = |pick: fn(&ChannelBandwidth) -> f64| {
                group
                    .channels
                    .iter()
                    .map(|c| format!("{:.1}", pick(c)))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let _ = writeln!(out, "{label} Read [{}] {suffix}", list(|c| c.read_mb));
            let _ = writeln!(out, "{label} Write [{}] {suffix}", list(|c| c.write_mb));
        }
        if labelled {
            out.push('\n');
        }

        for group in &self.groups {
            let prefix = group
                .label
                .as_deref()
                .map(|l| format!("{l} "))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "{prefix}Read: {:.2} {suffix}   Write: {:.2} {suffix}",
                group.read_mb, group.write_mb
            );
        }

        if labelled {
            out.push_str("---------------\n");
        }
        out
    }
}

/// Sampler state between ticks
#[derive(Debug, Clone, Default)]
pub struct SamplerState {
    previous: Option<CounterSnapshot>,
}

fn summed_delta(old: &[u64], new: &[u64], width: CounterWidth) -> u64 {
    old.iter()
        .zip(new)
        .map(|(&o, &n)| wrapping_delta(o, n, width))
        .fold(0u64, u64::saturating_add)
}

impl SamplerState {
    /// State before the first read
    #[must_use]
    pub const fn new() -> Self {
        Self { previous: None }
    }

    /// Returns true once a baseline snapshot has been taken
    #[must_use]
    pub const fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }

    /// Computes the tick ending at `snapshot`
    ///
    /// The first call only records the baseline and returns an all-zero tick
    /// with `baseline` set. Later calls diff every counter file against the
    /// previous snapshot with wrap correction, sum sibling files per
    /// direction, and sum channels into the group totals.
    #[must_use]
    pub fn advance(
        self,
        snapshot: CounterSnapshot,
        width: CounterWidth,
        bytes_per_event: u64,
        unit: RateUnit,
    ) -> (BandwidthTick, Self) {
        let previous = self.previous.as_ref();
        let elapsed = previous.map_or(Duration::ZERO, |p| {
            snapshot.taken_at.saturating_duration_since(p.taken_at)
        });
        let secs = elapsed.as_secs_f64();

        let scale = |events: u64| -> f64 {
            let mb = events as f64 * bytes_per_event as f64 / BYTES_PER_MB;
            match unit {
                RateUnit::PerInterval => mb,
                RateUnit::PerSecond if secs > 0.0 => mb / secs,
                RateUnit::PerSecond => 0.0,
            }
        };

        let groups = snapshot
            .groups
            .iter()
            .enumerate()
            .map(|(gi, group)| {
                let channels: Vec<ChannelBandwidth> = group
                    .channels
                    .iter()
                    .enumerate()
                    .map(|(ci, channel)| {
                        let old: Option<&ChannelReading> =
                            previous.and_then(|p| p.groups.get(gi)?.channels.get(ci));
                        let (read_mb, write_mb) = old.map_or((0.0, 0.0), |old| {
                            (
                                scale(summed_delta(&old.read, &channel.read, width)),
                                scale(summed_delta(&old.write, &channel.write, width)),
                            )
                        });
                        ChannelBandwidth {
                            name: channel.name.clone(),
                            read_mb,
                            write_mb,
                        }
                    })
                    .collect();
                GroupBandwidth {
                    label: group.label.clone(),
                    read_mb: channels.iter().map(|c| c.read_mb).sum(),
                    write_mb: channels.iter().map(|c| c.write_mb).sum(),
                    channels,
                }
            })
            .collect();

        let tick = BandwidthTick {
            groups,
            unit,
            elapsed,
            timestamp: snapshot.wall_time,
            baseline: previous.is_none(),
        };
        (
            tick,
            Self {
                previous: Some(snapshot),
            },
        )
    }
}

/// Events emitted by the sampling loop
#[derive(Debug, Clone)]
pub enum SamplerEvent {
    /// A non-baseline tick
    Tick(BandwidthTick),
    /// Counters could not be read (non-fatal, will retry)
    ReadError(String),
    /// Sampler stopped
    Stopped,
}

/// Handle to control a running sampler
#[derive(Debug)]
pub struct SamplerHandle {
    stop_tx: mpsc::Sender<()>,
}

impl SamplerHandle {
    /// Signals the sampler to stop; a `Stopped` event follows
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(()).await;
    }
}

/// Starts a sampling loop over `layout`
///
/// The first tick fires immediately and only takes the baseline. Returns a
/// handle to stop the loop and a receiver for its events.
pub fn start_sampler(
    layout: CounterLayout,
    settings: &SamplerSettings,
) -> (SamplerHandle, mpsc::Receiver<SamplerEvent>) {
    let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
    let (event_tx, event_rx) = mpsc::channel::<SamplerEvent>(16);

    let interval = settings.effective_interval();
    let width = settings.counter_width;
    let bytes_per_event = settings.bytes_per_event;

    tokio::spawn(async move {
        let mut state = SamplerState::new();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut consecutive_errors: u32 = 0;

        loop {
            tokio::select! {
                _ = stop_rx.recv() => {
                    let _ = event_tx.send(SamplerEvent::Stopped).await;
                    break;
                }
                _ = ticker.tick() => {
                    let read = {
                        let _span = tracing::trace_span!(span_names::SAMPLER_TICK).entered();
                        layout.read_snapshot()
                    };
                    match read {
                        Ok(snapshot) => {
                            consecutive_errors = 0;
                            let (tick, next) = state.advance(snapshot, width, bytes_per_event, layout.unit);
                            state = next;
                            if tick.baseline {
                                continue;
                            }
                            if event_tx.send(SamplerEvent::Tick(tick)).await.is_err() {
                                break; // receiver dropped
                            }
                        }
                        Err(err) => {
                            consecutive_errors += 1;
                            tracing::debug!(
                                error = %err,
                                attempt = consecutive_errors,
                                "Counter read failed"
                            );
                            if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                                tracing::warn!(
                                    errors = consecutive_errors,
                                    last_error = %err,
                                    "Sampler stopped after \
                                     {MAX_CONSECUTIVE_ERRORS} consecutive \
                                     read errors"
                                );
                                let _ = event_tx.send(SamplerEvent::Stopped).await;
                                break;
                            }
                            let _ = event_tx.send(SamplerEvent::ReadError(err.to_string())).await;
                        }
                    }
                }
            }
        }
    });

    (SamplerHandle { stop_tx }, event_rx)
}

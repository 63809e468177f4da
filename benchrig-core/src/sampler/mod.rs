//! Hardware counter sampling
//!
//! Free-running event counters are read periodically; consecutive reads are
//! diffed (with wraparound correction) and converted to MB or MB/s. The
//! explicit [`SamplerState`] is advanced by a pure function so the arithmetic
//! is testable without hardware; [`start_sampler`] drives it from a tokio
//! interval.

mod collector;
mod counter;
mod layout;
mod settings;

pub use collector::{
    BandwidthTick, ChannelBandwidth, GroupBandwidth, SamplerEvent, SamplerHandle, SamplerState,
    start_sampler,
};
pub use counter::{CounterWidth, parse_hex_counter, read_hex_counter, wrapping_delta};
pub use layout::{
    ChannelCounters, ChannelReading, CounterGroup, CounterLayout, CounterSnapshot,
    DEFAULT_DEVICE, DEFAULT_HWMON_ROOT, DEFAULT_LLC_CHANNELS, GroupReading, RateUnit,
};
pub use settings::{MAX_INTERVAL_MS, MIN_INTERVAL_MS, SamplerSettings};

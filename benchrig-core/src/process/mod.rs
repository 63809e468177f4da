//! Process lifecycle: spawn, bounded wait, teardown
//!
//! Every benchmark role is a [`ProcessHandle`]. Background handles stream both
//! output streams into a log file; captured handles collect them in memory and
//! persist them on completion or timeout. [`shutdown`] adds the escalating
//! stop protocol for binaries running on other nodes.

mod handle;
mod lifecycle;
pub mod shutdown;

pub use handle::{KILLED_EXIT_CODE, ProcessHandle, ProcessMode, ProcessState, RunResult};
pub use lifecycle::{
    DRAIN_TIMEOUT, STOP_GRACE, run_and_capture, start_background, start_captured, stop, wait,
};
pub use shutdown::{
    RemoteSignal, SIGNAL_TIMEOUT, cleanup_fleet, force_cleanup_binaries, graceful_stop_remote,
    signal_binary,
};

//! Configuration management for benchrig
//!
//! The fleet, timing, estimator, sampler and experiment settings live in one
//! TOML file. Every field has a default, so a missing or empty file is valid.

mod manager;
pub mod settings;

pub use manager::{CONFIG_FILE, ConfigManager};
pub use settings::{BenchConfig, NodeSettings, SshSettings, TimingSettings};

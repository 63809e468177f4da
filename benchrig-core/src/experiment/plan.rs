//! Planned roles and runs
//!
//! Planning is pure: a [`RunPlan`] records everything one configuration
//! needs (commands, nodes, log paths, delays) without touching the fleet, so
//! the same value drives both a dry run and the real execution.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command::{self, CommandLine};
use crate::metrics::MetricSpec;
use crate::target::Target;

/// How a role is started and torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    /// Output streamed to its log; stopped by escalation during teardown
    Background,
    /// Background counter sampler whose log is summarized after the run
    Sampler,
    /// Output captured; waited on with the run timeout and holds the metric
    Key,
}

impl fmt::Display for Launch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Background => "background",
            Self::Sampler => "sampler",
            Self::Key => "key",
        })
    }
}

/// One process of a configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RolePlan {
    /// Role name (`server`, `relay`, `client`, `memory`)
    pub role: &'static str,
    /// Node name from `[nodes]`
    pub node: &'static str,
    /// Where the role runs
    pub target: Target,
    /// Benchmark argv, run from the workdir
    pub argv: Vec<String>,
    /// Log file of this role
    pub log_path: PathBuf,
    /// Start and stop behaviour
    pub launch: Launch,
    /// Name matched by `pkill -f` when stopping this role
    pub binary: String,
    /// Pause after starting this role
    pub settle: Duration,
}

impl RolePlan {
    /// Command that starts this role
    #[must_use]
    pub fn command(&self, workdir: &Path) -> CommandLine {
        command::build(&self.target, workdir, &self.argv)
    }

    /// Role name with its first letter capitalized, as used in error messages
    #[must_use]
    pub fn title(&self) -> String {
        let mut chars = self.role.chars();
        chars.next().map_or_else(String::new, |first| {
            first.to_uppercase().chain(chars).collect()
        })
    }
}

/// One configuration of an experiment
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Unique prefix of every log of this run
    pub run_tag: String,
    /// Position in the sweep
    pub index: usize,
    /// Port shared by all roles of this run
    pub port: u16,
    /// Roles in start order
    pub roles: Vec<RolePlan>,
    /// Bound on the key role
    pub timeout: Duration,
    /// Where the key role reports its result
    pub metric: MetricSpec,
    /// Nodes swept after the run
    pub cleanup_targets: Vec<Target>,
    /// Binaries terminated on every cleanup target
    pub cleanup_binaries: Vec<String>,
}

impl RunPlan {
    /// Index of the key role
    #[must_use]
    pub fn key_index(&self) -> Option<usize> {
        self.roles.iter().position(|r| r.launch == Launch::Key)
    }

    /// The role whose log is summarized, if memory sampling is on
    #[must_use]
    pub fn sampler(&self) -> Option<&RolePlan> {
        self.roles.iter().find(|r| r.launch == Launch::Sampler)
    }

    /// Log path of the named role
    #[must_use]
    pub fn log_of(&self, role: &str) -> Option<&Path> {
        self.roles
            .iter()
            .find(|r| r.role == role)
            .map(|r| r.log_path.as_path())
    }
}

/// `<log_dir>/<run_tag>_<node>_<role>.log`
#[must_use]
pub fn role_log_path(log_dir: &Path, run_tag: &str, node: &str, role: &str) -> PathBuf {
    log_dir.join(format!("{run_tag}_{node}_{role}.log"))
}

/// Port of the run at `index`, or `None` past the end of the port range
#[must_use]
pub fn run_port(port_base: u16, index: usize) -> Option<u16> {
    u16::try_from(index)
        .ok()
        .and_then(|offset| port_base.checked_add(offset))
}

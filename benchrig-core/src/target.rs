//! Execution targets
//!
//! A [`Target`] names one host of the fleet and carries everything needed to
//! run a command there: SSH user, identity file, port and whether the command
//! runs through non-interactive `sudo`.

use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Host names that always resolve to local execution
pub const LOCAL_HOST_ALIASES: &[&str] = &["", "local", "localhost", "127.0.0.1", "::1"];

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Hostname of this machine, looked up once
static THIS_HOST: OnceLock<Option<String>> = OnceLock::new();

fn this_host() -> Option<&'static str> {
    THIS_HOST
        .get_or_init(|| {
            hostname::get()
                .ok()
                .and_then(|name| name.into_string().ok())
                .filter(|name| !name.is_empty())
        })
        .as_deref()
}

/// Returns true if `host` designates the machine running the orchestrator
#[must_use]
pub fn is_local_host(host: &str) -> bool {
    let host = host.trim();
    LOCAL_HOST_ALIASES.contains(&host) || this_host().is_some_and(|me| me.eq_ignore_ascii_case(host))
}

/// One execution endpoint of the fleet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Host name or address; empty or a local alias means local execution
    #[serde(default)]
    pub host: String,
    /// SSH user (empty means the SSH client default)
    #[serde(default)]
    pub user: String,
    /// SSH identity file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<PathBuf>,
    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Run the command through `sudo -n`
    #[serde(default)]
    pub elevate: bool,
}

const fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl Target {
    /// Creates a target for the local machine
    #[must_use]
    pub fn local() -> Self {
        Self {
            host: String::new(),
            user: String::new(),
            identity_file: None,
            port: DEFAULT_SSH_PORT,
            elevate: false,
        }
    }

    /// Creates a target for `host` with default SSH options
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::local()
        }
    }

    /// Sets the SSH user
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Sets the SSH identity file
    #[must_use]
    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    /// Sets the SSH port
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enables or disables `sudo -n` elevation
    #[must_use]
    pub const fn with_elevate(mut self, elevate: bool) -> Self {
        self.elevate = elevate;
        self
    }

    /// Returns true if commands for this target run on the local machine
    #[must_use]
    pub fn is_local(&self) -> bool {
        is_local_host(&self.host)
    }

    /// SSH destination: `user@host`, or bare `host` when no user is set
    #[must_use]
    pub fn destination(&self) -> String {
        if self.user.is_empty() {
            self.host.clone()
        } else {
            format!("{}@{}", self.user, self.host)
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::local()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_local() {
            write!(f, "local")
        } else if self.port == DEFAULT_SSH_PORT {
            write!(f, "{}", self.destination())
        } else {
            write!(f, "{}:{}", self.destination(), self.port)
        }
    }
}

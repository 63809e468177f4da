//! Command construction for local and remote targets
//!
//! Every benchmark role is started as `cd <workdir> && exec <argv>` so the
//! shell replaces itself with the benchmark and no wrapper shell survives it.
//! Local targets run that fragment through `bash -lc`; remote targets pass it
//! as the command argument of a batch-mode `ssh` invocation.

mod quote;

use std::fmt;
use std::path::Path;

pub use quote::{join as shell_join, quote as shell_quote};

use crate::target::Target;

/// Shell used for local execution
pub const LOCAL_SHELL: &str = "bash";

/// SSH client binary
pub const SSH_PROGRAM: &str = "ssh";

/// Prefix that runs a command as root and fails instead of prompting
pub const ELEVATE_PREFIX: &[&str] = &["sudo", "-n"];

/// A fully built command line (program followed by its arguments)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    argv: Vec<String>,
}

impl CommandLine {
    /// Program to execute (empty for an empty command line)
    #[must_use]
    pub fn program(&self) -> &str {
        self.argv.first().map_or("", String::as_str)
    }

    /// Arguments after the program
    #[must_use]
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    /// All tokens, program first
    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Creates a [`tokio::process::Command`] for this command line
    #[must_use]
    pub fn to_tokio_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(self.program());
        cmd.args(self.args());
        cmd
    }
}

impl From<Vec<String>> for CommandLine {
    fn from(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_join(&self.argv))
    }
}

/// Builds the `cd <workdir> && exec <argv>` fragment, applying elevation
#[must_use]
pub fn shell_fragment(target: &Target, workdir: &Path, argv: &[String]) -> String {
    let mut full: Vec<&str> = Vec::with_capacity(argv.len() + ELEVATE_PREFIX.len());
    if target.elevate {
        full.extend_from_slice(ELEVATE_PREFIX);
    }
    full.extend(argv.iter().map(String::as_str));

    format!(
        "cd {} && exec {}",
        shell_quote(&workdir.to_string_lossy()),
        shell_join(full)
    )
}

/// Builds the command that runs `argv` in `workdir` on `target`
///
/// Pure: nothing is executed and no error is raised. Bad paths or hosts
/// surface later as non-zero exit codes or SSH failures.
#[must_use]
pub fn build(target: &Target, workdir: &Path, argv: &[String]) -> CommandLine {
    let fragment = shell_fragment(target, workdir, argv);

    if target.is_local() {
        return CommandLine {
            argv: vec![LOCAL_SHELL.to_string(), "-lc".to_string(), fragment],
        };
    }

    let mut ssh = vec![
        SSH_PROGRAM.to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=accept-new".to_string(),
        "-p".to_string(),
        target.port.to_string(),
    ];
    if let Some(ref key) = target.identity_file {
        ssh.push("-i".to_string());
        ssh.push(expand_home(key));
    }
    ssh.push(target.destination());
    ssh.push(fragment);

    CommandLine { argv: ssh }
}

/// Expands a leading `~` in an identity file path
fn expand_home(path: &Path) -> String {
    let raw = path.to_string_lossy();
    shellexpand::tilde(&raw).into_owned()
}

/// Converts a slice of string-like values into an owned argv
#[must_use]
pub fn argv<I, S>(tokens: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    tokens.into_iter().map(Into::into).collect()
}

//! Helpers shared by the integration tests

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

static MARKER_SEQ: AtomicUsize = AtomicUsize::new(0);

/// A name unique to this test process and call, safe to match with `pkill -f`
pub fn marker(prefix: &str) -> String {
    format!(
        "benchrig_{prefix}_{}_{}",
        std::process::id(),
        MARKER_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

/// Writes an executable bash script `name` into `dir`
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/bash\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Owned argv from string slices
pub fn argv(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| (*t).to_string()).collect()
}

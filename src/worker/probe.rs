// src/worker/probe.rs

//! Startup checks for the worker binary.

use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use crate::errors::{RelayError, Result};
use crate::fs::FileSystem;

/// Oldest supported ffmpeg major version.
pub const MIN_MAJOR_VERSION: u64 = 4;

static VERSION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\S*ffmpeg version (\S+)").expect("static version regex is valid")
});

/// Fail unless `program` is an executable file.
pub fn ensure_executable(fs: &dyn FileSystem, program: &Path) -> Result<()> {
    if fs.is_executable(program) {
        Ok(())
    } else {
        Err(RelayError::WorkerUnavailable(format!(
            "{} cannot be executed",
            program.display()
        )))
    }
}

/// Run `<program> -version` and extract the version string.
///
/// Returns an empty string when the program cannot be run or prints no
/// recognisable banner.
pub async fn probe_version(program: &Path) -> String {
    let output = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await;

    match output {
        Ok(output) => parse_version(&String::from_utf8_lossy(&output.stdout)).unwrap_or_default(),
        Err(e) => {
            debug!(program = %program.display(), error = %e, "version probe failed");
            String::new()
        }
    }
}

/// Extract the version token from an `ffmpeg -version` banner.
///
/// A leading `n` (as in `n6.1.1` tags) is stripped.
pub fn parse_version(banner: &str) -> Option<String> {
    let raw = VERSION_LINE.captures(banner)?.get(1)?.as_str();
    let version = match raw.strip_prefix('n') {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => raw,
    };
    Some(version.to_string())
}

/// Check a probed version against [`MIN_MAJOR_VERSION`].
///
/// - Empty version: the probe failed, reject.
/// - Numeric major below the minimum: reject.
/// - Non-numeric version (snapshot builds such as `N-112345-g…`): accept.
pub fn check_version(version: &str) -> Result<()> {
    if version.is_empty() {
        return Err(RelayError::UnsupportedWorkerVersion(
            "could not determine ffmpeg version".to_string(),
        ));
    }

    let major = version.split(['.', '-']).next().unwrap_or_default();
    match major.parse::<u64>() {
        Ok(major) if major < MIN_MAJOR_VERSION => {
            Err(RelayError::UnsupportedWorkerVersion(format!(
                "ffmpeg {version} found, {MIN_MAJOR_VERSION}.0.0 or newer required"
            )))
        }
        _ => Ok(()),
    }
}

/// Full startup validation: executable check, then version probe.
///
/// Returns the detected version.
pub async fn validate_worker(fs: &dyn FileSystem, program: &Path) -> Result<String> {
    ensure_executable(fs, program)?;
    let version = probe_version(program).await;
    check_version(&version)?;
    Ok(version)
}

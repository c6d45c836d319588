//! Error types for the convergence engine.
//!
//! Guard probes returning false and the top-level platform skip are not
//! errors; everything else bubbles up to the driver synchronously and
//! halts the run.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single resource action.
///
/// Each variant carries the proximate cause; the driver wraps it with
/// the resource's name and kind before surfacing it.
#[derive(Debug, Error)]
pub enum ActionError {
    /// Downloaded file did not match the declared checksum
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// The package manager collaborator reported a failure
    #[error("package manager error: {message}")]
    PackageManager { message: String },

    /// The remote fetch collaborator reported a failure
    #[error("fetch of {url} failed: {message}")]
    Fetch { url: String, message: String },

    /// A shell command could not be launched
    #[error("failed to launch shell")]
    SubprocessLaunch {
        #[source]
        source: std::io::Error,
    },

    /// A shell command exited non-zero (None when killed by a signal)
    #[error("command exited with status {}", code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    SubprocessExit { code: Option<i32> },

    /// Filesystem operation failed
    #[error("filesystem error at {path}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Template rendering failed
    #[error("template error: {message}")]
    Template { message: String },

    /// The service manager collaborator reported a failure
    #[error("service {service}: {message}")]
    Service { service: String, message: String },

    /// User account management failed
    #[error("user management error: {message}")]
    User { message: String },

    /// An action verb that the resource kind does not support
    #[error("unsupported action '{action}' for {kind} resource")]
    UnsupportedAction {
        action: String,
        kind: &'static str,
    },
}

/// Top-level run failure, fail-fast: wraps the first error encountered.
#[derive(Debug, Error)]
pub enum ConvergenceError {
    /// A platform-conditional value had no applicable entry
    #[error("no platform value for family '{family}' version '{version}'")]
    UnresolvedConditional { family: String, version: String },

    /// A guard probe could not be launched (distinct from the probe
    /// returning false, which is a clean skip)
    #[error("guard probe for '{resource}' could not be launched")]
    GuardExecutionFailure {
        resource: String,
        #[source]
        source: std::io::Error,
    },

    /// A resource action failed
    #[error("{kind} resource '{resource}' failed")]
    ResourceFailed {
        resource: String,
        kind: &'static str,
        #[source]
        source: ActionError,
    },

    /// Run list includes form a cycle (configuration error, load time)
    #[error("run list include cycle involving '{name}'")]
    IncludeCycle { name: String },
}

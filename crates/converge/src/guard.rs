//! Guard predicates - the not_if / only_if idempotence idiom.
//!
//! A guard gates whether a resource's action runs at all. A probe
//! command exiting non-zero, or a path not existing, is a valid `false`
//! result - only a failure to perform the check itself is an error.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// A boolean check evaluated at run time, immediately before the gated
/// action. Only two predicate shapes exist; no closures are needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GuardPredicate {
    /// True iff the shell script exits 0
    ProbeCommand { command: String },
    /// True iff the path exists (any file type, symlinks included)
    FileExists { file_exists: PathBuf },
}

impl GuardPredicate {
    /// Evaluate the predicate.
    ///
    /// Read-only with respect to system state. Errors only when the
    /// check itself cannot be performed (shell missing, permission
    /// denied on a parent directory) - never for a non-zero exit or a
    /// missing path.
    pub fn evaluate(&self) -> std::io::Result<bool> {
        match self {
            Self::ProbeCommand { command } => {
                let status = Command::new("sh")
                    .arg("-c")
                    .arg(command)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()?;
                Ok(status.success())
            }
            Self::FileExists { file_exists } => match std::fs::symlink_metadata(file_exists) {
                Ok(_) => Ok(true),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            },
        }
    }
}

/// The pair of optional guards carried by every resource.
#[derive(Debug, Clone, Copy)]
pub struct Guards<'a> {
    pub only_if: Option<&'a GuardPredicate>,
    pub not_if: Option<&'a GuardPredicate>,
}

impl Guards<'_> {
    /// Evaluate both guards and return why the action is blocked, or
    /// `None` if it may proceed.
    ///
    /// The action proceeds only if `only_if` (when present) is true AND
    /// `not_if` (when present) is false. Each predicate is evaluated at
    /// most once; a false `only_if` short-circuits `not_if` entirely.
    pub fn blocked_reason(&self) -> std::io::Result<Option<&'static str>> {
        if let Some(guard) = self.only_if
            && !guard.evaluate()?
        {
            return Ok(Some("only_if guard returned false"));
        }

        if let Some(guard) = self.not_if
            && guard.evaluate()?
        {
            return Ok(Some("not_if guard returned true"));
        }

        Ok(None)
    }
}

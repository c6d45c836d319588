//! The resource model - the unit of declared desired state.
//!
//! A resource is one of a fixed set of kinds (package, remote file,
//! directory, file, user, service, command), each carrying its
//! kind-specific attributes plus the common guard pair and an ordered
//! action list. Resources are constructed declaratively and never
//! mutated during a run.

use crate::conditional::Conditional;
use crate::error::ConvergenceError;
use crate::facts::PlatformFacts;
use crate::guard::{GuardPredicate, Guards};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// An action to apply to a resource, in declared order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionVerb {
    Install,
    Remove,
    Create,
    Run,
    Enable,
    Disable,
    Start,
    Stop,
    Restart,
    Status,
}

impl ActionVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Remove => "remove",
            Self::Create => "create",
            Self::Run => "run",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Status => "status",
        }
    }

    /// Whether this verb is meaningful for a service resource.
    pub fn is_service_verb(self) -> bool {
        matches!(
            self,
            Self::Enable | Self::Disable | Self::Start | Self::Stop | Self::Restart | Self::Status
        )
    }
}

impl std::fmt::Display for ActionVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_install() -> Vec<ActionVerb> {
    vec![ActionVerb::Install]
}

fn default_create() -> Vec<ActionVerb> {
    vec![ActionVerb::Create]
}

fn default_run() -> Vec<ActionVerb> {
    vec![ActionVerb::Run]
}

/// Parse a mode string like "0770" or "644" as octal.
pub fn parse_mode(s: &str) -> Result<u32, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    u32::from_str_radix(digits, 8).map_err(|e| format!("invalid octal mode '{s}': {e}"))
}

fn deserialize_mode<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    value
        .map(|s| parse_mode(&s).map_err(serde::de::Error::custom))
        .transpose()
}

/// A platform precondition for a single resource, checked by the driver
/// before conditional resolution. Version comparison is numeric.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformConstraint {
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub version_at_least: Option<f64>,
    #[serde(default)]
    pub version_below: Option<f64>,
}

impl PlatformConstraint {
    /// True when the facts satisfy every declared clause.
    pub fn matches(&self, facts: &PlatformFacts) -> bool {
        if let Some(family) = &self.family
            && *family != facts.family
        {
            return false;
        }

        if self.version_at_least.is_some() || self.version_below.is_some() {
            let Some(version) = facts.version_number() else {
                return false;
            };
            if let Some(min) = self.version_at_least
                && version < min
            {
                return false;
            }
            if let Some(max) = self.version_below
                && version >= max
            {
                return false;
            }
        }

        true
    }
}

/// Ensure named packages are present (or absent) via the platform's
/// package manager. Package names may be platform-conditional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageResource {
    pub name: String,
    /// Packages to manage; defaults to `name` when empty
    #[serde(default)]
    pub packages: Vec<Conditional<String>>,
    #[serde(default = "default_install")]
    pub actions: Vec<ActionVerb>,
    #[serde(default)]
    pub only_if: Option<GuardPredicate>,
    #[serde(default)]
    pub not_if: Option<GuardPredicate>,
    #[serde(default, rename = "when")]
    pub constraint: Option<PlatformConstraint>,
}

impl PackageResource {
    /// Package names after conditional resolution, or `None` if any
    /// name is still platform-conditional (meaning [`Resource::resolve`]
    /// was skipped).
    pub fn resolved_names(&self) -> Option<Vec<String>> {
        if self.packages.is_empty() {
            return Some(vec![self.name.clone()]);
        }
        self.packages
            .iter()
            .map(|p| p.literal().cloned())
            .collect()
    }
}

/// Download a file and verify its SHA-256 checksum. The destination is
/// only ever fully written or absent, never partial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFileResource {
    pub name: String,
    /// Source URL
    pub source: String,
    /// Destination path on the local filesystem
    pub path: PathBuf,
    /// Expected SHA-256 checksum, lowercase hex
    pub checksum: String,
    #[serde(default = "default_create")]
    pub actions: Vec<ActionVerb>,
    #[serde(default)]
    pub only_if: Option<GuardPredicate>,
    #[serde(default)]
    pub not_if: Option<GuardPredicate>,
    #[serde(default, rename = "when")]
    pub constraint: Option<PlatformConstraint>,
}

/// Ensure a directory exists with the given owner, group and mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryResource {
    pub path: PathBuf,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default, deserialize_with = "deserialize_mode")]
    pub mode: Option<u32>,
    #[serde(default = "default_create")]
    pub actions: Vec<ActionVerb>,
    #[serde(default)]
    pub only_if: Option<GuardPredicate>,
    #[serde(default)]
    pub not_if: Option<GuardPredicate>,
    #[serde(default, rename = "when")]
    pub constraint: Option<PlatformConstraint>,
}

/// Ensure a file exists with rendered (or literal) content and the
/// given owner, group and mode. Writes are atomic; a write that changes
/// nothing is observable as "unchanged".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileResource {
    pub path: PathBuf,
    /// Template reference rendered by the templating collaborator
    #[serde(default)]
    pub source: Option<String>,
    /// Literal content, an alternative to `source`
    #[serde(default)]
    pub content: Option<String>,
    /// Variables passed to the template
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default, deserialize_with = "deserialize_mode")]
    pub mode: Option<u32>,
    #[serde(default = "default_create")]
    pub actions: Vec<ActionVerb>,
    #[serde(default)]
    pub only_if: Option<GuardPredicate>,
    #[serde(default)]
    pub not_if: Option<GuardPredicate>,
    #[serde(default, rename = "when")]
    pub constraint: Option<PlatformConstraint>,
}

/// Ensure a system account exists. Home directories are not created
/// unless `manage_home` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResource {
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub home: Option<PathBuf>,
    /// Create as a system account
    #[serde(default)]
    pub system: bool,
    /// Create the home directory on account creation
    #[serde(default)]
    pub manage_home: bool,
    #[serde(default = "default_create")]
    pub actions: Vec<ActionVerb>,
    #[serde(default)]
    pub only_if: Option<GuardPredicate>,
    #[serde(default)]
    pub not_if: Option<GuardPredicate>,
    #[serde(default, rename = "when")]
    pub constraint: Option<PlatformConstraint>,
}

/// Apply service verbs in declared order (e.g. enable then start).
/// Each verb is itself idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResource {
    pub name: String,
    /// Verbs the underlying service script supports beyond the basics
    #[serde(default)]
    pub supports: Vec<ActionVerb>,
    pub actions: Vec<ActionVerb>,
    #[serde(default)]
    pub only_if: Option<GuardPredicate>,
    #[serde(default)]
    pub not_if: Option<GuardPredicate>,
    #[serde(default, rename = "when")]
    pub constraint: Option<PlatformConstraint>,
}

/// Run an opaque shell script. Non-zero exit aborts the run unless the
/// resource declares itself best-effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResource {
    pub name: String,
    /// Shell script payload, executed with `sh -c`
    pub script: String,
    /// Working directory for the script
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Log and continue on non-zero exit instead of failing the run
    #[serde(default)]
    pub best_effort: bool,
    #[serde(default = "default_run")]
    pub actions: Vec<ActionVerb>,
    #[serde(default)]
    pub only_if: Option<GuardPredicate>,
    #[serde(default)]
    pub not_if: Option<GuardPredicate>,
    #[serde(default, rename = "when")]
    pub constraint: Option<PlatformConstraint>,
}

/// The unit of desired state, a tagged union over resource kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Resource {
    Package(PackageResource),
    RemoteFile(RemoteFileResource),
    Directory(DirectoryResource),
    File(FileResource),
    User(UserResource),
    Service(ServiceResource),
    Command(CommandResource),
}

impl Resource {
    /// Identifier for display and error reporting.
    pub fn id(&self) -> String {
        match self {
            Self::Package(r) => r.name.clone(),
            Self::RemoteFile(r) => r.name.clone(),
            Self::Directory(r) => r.path.display().to_string(),
            Self::File(r) => r.path.display().to_string(),
            Self::User(r) => r.name.clone(),
            Self::Service(r) => r.name.clone(),
            Self::Command(r) => r.name.clone(),
        }
    }

    /// Resource kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Package(_) => "package",
            Self::RemoteFile(_) => "remote_file",
            Self::Directory(_) => "directory",
            Self::File(_) => "file",
            Self::User(_) => "user",
            Self::Service(_) => "service",
            Self::Command(_) => "command",
        }
    }

    /// The declared action list.
    pub fn actions(&self) -> &[ActionVerb] {
        match self {
            Self::Package(r) => &r.actions,
            Self::RemoteFile(r) => &r.actions,
            Self::Directory(r) => &r.actions,
            Self::File(r) => &r.actions,
            Self::User(r) => &r.actions,
            Self::Service(r) => &r.actions,
            Self::Command(r) => &r.actions,
        }
    }

    /// The guard pair, evaluated by the driver immediately before the
    /// action.
    pub fn guards(&self) -> Guards<'_> {
        let (only_if, not_if) = match self {
            Self::Package(r) => (&r.only_if, &r.not_if),
            Self::RemoteFile(r) => (&r.only_if, &r.not_if),
            Self::Directory(r) => (&r.only_if, &r.not_if),
            Self::File(r) => (&r.only_if, &r.not_if),
            Self::User(r) => (&r.only_if, &r.not_if),
            Self::Service(r) => (&r.only_if, &r.not_if),
            Self::Command(r) => (&r.only_if, &r.not_if),
        };
        Guards {
            only_if: only_if.as_ref(),
            not_if: not_if.as_ref(),
        }
    }

    /// The optional platform precondition.
    pub fn constraint(&self) -> Option<&PlatformConstraint> {
        match self {
            Self::Package(r) => r.constraint.as_ref(),
            Self::RemoteFile(r) => r.constraint.as_ref(),
            Self::Directory(r) => r.constraint.as_ref(),
            Self::File(r) => r.constraint.as_ref(),
            Self::User(r) => r.constraint.as_ref(),
            Self::Service(r) => r.constraint.as_ref(),
            Self::Command(r) => r.constraint.as_ref(),
        }
    }

    /// Collapse every platform-conditional attribute to a literal.
    ///
    /// Returns a copy of the resource with conditionals replaced by the
    /// value selected for `facts`; resources without conditional
    /// attributes come back unchanged.
    pub fn resolve(&self, facts: &PlatformFacts) -> Result<Self, ConvergenceError> {
        match self {
            Self::Package(r) => {
                let packages = r
                    .packages
                    .iter()
                    .map(|p| p.resolved(facts))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Package(PackageResource {
                    packages,
                    ..r.clone()
                }))
            }
            _ => Ok(self.clone()),
        }
    }
}

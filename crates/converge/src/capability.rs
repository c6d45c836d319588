//! Capability traits for the engine's external collaborators.
//!
//! The engine performs its own filesystem and subprocess work, but
//! templating, package management, remote fetching and service
//! management are injected behind these traits so the core stays
//! testable without touching the real system.

use crate::error::ActionError;
use crate::resource::ActionVerb;
use std::collections::BTreeMap;
use std::path::Path;

/// Renders configuration file content from a template reference and
/// variables. Used only by file resources with a `source`.
pub trait TemplateEngine {
    fn render(&self, source: &str, vars: &BTreeMap<String, String>) -> Result<Vec<u8>, ActionError>;
}

/// Platform-specific package manager.
pub trait PackageManager {
    /// Whether the named package is currently installed.
    fn is_installed(&self, name: &str) -> Result<bool, ActionError>;

    /// Install the named packages. Called only with packages known to
    /// be missing.
    fn install(&self, names: &[String]) -> Result<(), ActionError>;

    /// Remove the named packages. Called only with packages known to
    /// be present.
    fn remove(&self, names: &[String]) -> Result<(), ActionError>;
}

/// Downloads a URL to a local path. Expected to retry transient network
/// failures internally; the engine treats a fetch as atomic pass/fail
/// and performs its own checksum verification.
pub trait RemoteSource {
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), ActionError>;
}

/// Whether applying a service verb changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceChange {
    /// The verb performed real work (service started, unit enabled, ...)
    Changed,
    /// The verb was already satisfied (starting a running service)
    AlreadySatisfied,
}

/// The OS service manager (init system).
pub trait ServiceManager {
    /// Apply one verb to a service, idempotently.
    fn apply(&self, service: &str, verb: ActionVerb) -> Result<ServiceChange, ActionError>;
}

/// The full collaborator bundle handed to the executor.
#[derive(Clone, Copy)]
pub struct Capabilities<'a> {
    pub templates: &'a dyn TemplateEngine,
    pub packages: &'a dyn PackageManager,
    pub remote: &'a dyn RemoteSource,
    pub services: &'a dyn ServiceManager,
}

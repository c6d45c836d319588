//! Real-system implementations of the engine's capability traits.

pub mod fetch;
pub mod pkg;
pub mod service;
pub mod template;

use anyhow::Result;
use converge::{Capabilities, PlatformFacts};
use std::path::Path;

/// The collaborator set used for a real run, bundled so their
/// lifetimes line up with a single `Capabilities` borrow.
pub struct SystemWorld {
    templates: template::FileTemplateEngine,
    packages: pkg::SystemPackageManager,
    remote: fetch::HttpSource,
    services: service::SystemctlManager,
}

impl SystemWorld {
    /// Build collaborators for these facts. Template sources resolve
    /// relative to the manifest's directory.
    pub fn new(facts: &PlatformFacts, manifest_dir: &Path) -> Result<Self> {
        Ok(Self {
            templates: template::FileTemplateEngine::new(manifest_dir),
            packages: pkg::SystemPackageManager::for_family(&facts.family)?,
            remote: fetch::HttpSource::new(),
            services: service::SystemctlManager::new(),
        })
    }

    pub fn capabilities(&self) -> Capabilities<'_> {
        Capabilities {
            templates: &self.templates,
            packages: &self.packages,
            remote: &self.remote,
            services: &self.services,
        }
    }
}

//! Platform facts - the immutable description of the target machine.
//!
//! Facts are created once at process start and threaded as a parameter
//! into the resolver and driver; nothing reads ambient global state.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// What the engine knows about the machine it is converging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFacts {
    /// Platform family (os-release `ID`: "ubuntu", "debian", "fedora", ...)
    pub family: String,
    /// Platform version (os-release `VERSION_ID`: "12.04", "24.04", ...)
    pub version: String,
    /// Machine architecture ("x86_64", "aarch64", ...)
    pub arch: String,
}

impl PlatformFacts {
    pub fn new(
        family: impl Into<String>,
        version: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        Self {
            family: family.into(),
            version: version.into(),
            arch: arch.into(),
        }
    }

    /// Detect facts for the current machine.
    ///
    /// On Linux this parses `/etc/os-release`; elsewhere the OS name
    /// stands in for the family and the version is empty.
    pub fn detect() -> std::io::Result<Self> {
        let arch = std::env::consts::ARCH;

        if Path::new("/etc/os-release").exists() {
            let content = std::fs::read_to_string("/etc/os-release")?;
            return Ok(Self::from_os_release(&content, arch));
        }

        Ok(Self::new(std::env::consts::OS, "", arch))
    }

    /// Build facts from os-release file content.
    pub fn from_os_release(content: &str, arch: &str) -> Self {
        let mut family = String::new();
        let mut version = String::new();

        for line in content.lines() {
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().trim_matches('"');
                match key.trim() {
                    "ID" => family = value.to_string(),
                    "VERSION_ID" => version = value.to_string(),
                    _ => {}
                }
            }
        }

        Self::new(family, version, arch)
    }

    /// Numeric interpretation of the version for threshold comparisons
    /// ("12.04" -> 12.04, "24.04.1" -> 24.04). Exact-match lookups use
    /// the string form; only caller-side range branches use this.
    pub fn version_number(&self) -> Option<f64> {
        let numeric: String = self
            .version
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();

        let two_components: Vec<&str> = numeric.split('.').take(2).collect();
        two_components.join(".").parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UBUNTU_OS_RELEASE: &str = r#"
NAME="Ubuntu"
VERSION="12.04.5 LTS, Precise Pangolin"
ID=ubuntu
ID_LIKE=debian
VERSION_ID="12.04"
"#;

    #[test]
    fn parses_os_release() {
        let facts = PlatformFacts::from_os_release(UBUNTU_OS_RELEASE, "x86_64");
        assert_eq!(facts.family, "ubuntu");
        assert_eq!(facts.version, "12.04");
        assert_eq!(facts.arch, "x86_64");
    }

    #[test]
    fn version_number_truncates_to_two_components() {
        let facts = PlatformFacts::new("ubuntu", "24.04.1", "x86_64");
        assert_eq!(facts.version_number(), Some(24.04));
    }

    #[test]
    fn version_number_handles_suffixes() {
        let facts = PlatformFacts::new("debian", "9.04-beta", "x86_64");
        assert_eq!(facts.version_number(), Some(9.04));
    }

    #[test]
    fn version_number_empty_version_is_none() {
        let facts = PlatformFacts::new("macos", "", "aarch64");
        assert_eq!(facts.version_number(), None);
    }
}

//! System package manager selection and invocation.
//!
//! The platform family picks the tool; every tool is driven through
//! the same probe/install/remove shape with non-interactive flags.

use anyhow::{Result, bail};
use converge::{ActionError, PackageManager};
use std::process::{Command, Stdio};

/// Which package tool this platform uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PackageTool {
    Apt,
    Dnf,
    Pacman,
    Apk,
    Brew,
}

/// Drives the platform's native package tool.
pub struct SystemPackageManager {
    tool: PackageTool,
}

impl SystemPackageManager {
    /// Pick the tool for a platform family.
    pub fn for_family(family: &str) -> Result<Self> {
        let tool = match family {
            "debian" | "ubuntu" => PackageTool::Apt,
            "rhel" | "centos" | "fedora" => PackageTool::Dnf,
            "arch" => PackageTool::Pacman,
            "alpine" => PackageTool::Apk,
            "macos" => PackageTool::Brew,
            other => bail!("no package manager known for platform family '{other}'"),
        };
        Ok(Self { tool })
    }

    fn probe_args(&self, name: &str) -> (&'static str, Vec<String>) {
        match self.tool {
            PackageTool::Apt => (
                "dpkg-query",
                vec![
                    "-W".to_string(),
                    "-f=${Status}".to_string(),
                    name.to_string(),
                ],
            ),
            PackageTool::Dnf => ("rpm", vec!["-q".to_string(), name.to_string()]),
            PackageTool::Pacman => ("pacman", vec!["-Qi".to_string(), name.to_string()]),
            PackageTool::Apk => (
                "apk",
                vec!["info".to_string(), "-e".to_string(), name.to_string()],
            ),
            PackageTool::Brew => (
                "brew",
                vec![
                    "list".to_string(),
                    "--versions".to_string(),
                    name.to_string(),
                ],
            ),
        }
    }

    fn mutate_args(&self, install: bool, names: &[String]) -> (&'static str, Vec<String>) {
        let mut args: Vec<String> = match (self.tool, install) {
            (PackageTool::Apt, true) => vec!["install".into(), "-y".into()],
            (PackageTool::Apt, false) => vec!["remove".into(), "-y".into()],
            (PackageTool::Dnf, true) => vec!["install".into(), "-y".into()],
            (PackageTool::Dnf, false) => vec!["remove".into(), "-y".into()],
            (PackageTool::Pacman, true) => vec!["-S".into(), "--noconfirm".into()],
            (PackageTool::Pacman, false) => vec!["-R".into(), "--noconfirm".into()],
            (PackageTool::Apk, true) => vec!["add".into()],
            (PackageTool::Apk, false) => vec!["del".into()],
            (PackageTool::Brew, true) => vec!["install".into()],
            (PackageTool::Brew, false) => vec!["uninstall".into()],
        };
        args.extend(names.iter().cloned());

        let program = match self.tool {
            PackageTool::Apt => "apt-get",
            PackageTool::Dnf => "dnf",
            PackageTool::Pacman => "pacman",
            PackageTool::Apk => "apk",
            PackageTool::Brew => "brew",
        };
        (program, args)
    }

    fn run(&self, program: &str, args: &[String]) -> Result<(), ActionError> {
        log::debug!("running {program} {}", args.join(" "));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ActionError::PackageManager {
                message: format!("failed to run {program}: {e}"),
            })?;

        if !output.status.success() {
            return Err(ActionError::PackageManager {
                message: format!(
                    "{program} exited with {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

impl PackageManager for SystemPackageManager {
    fn is_installed(&self, name: &str) -> Result<bool, ActionError> {
        let (program, args) = self.probe_args(name);
        let output = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ActionError::PackageManager {
                message: format!("failed to run {program}: {e}"),
            })?;

        if !output.status.success() {
            return Ok(false);
        }

        // dpkg-query reports removed-but-known packages with a zero
        // exit; the status text disambiguates.
        if self.tool == PackageTool::Apt {
            let status = String::from_utf8_lossy(&output.stdout);
            return Ok(status.contains("install ok installed"));
        }
        Ok(true)
    }

    fn install(&self, names: &[String]) -> Result<(), ActionError> {
        let (program, args) = self.mutate_args(true, names);
        self.run(program, &args)
    }

    fn remove(&self, names: &[String]) -> Result<(), ActionError> {
        let (program, args) = self.mutate_args(false, names);
        self.run(program, &args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_maps_to_expected_tool() {
        assert_eq!(
            SystemPackageManager::for_family("ubuntu").unwrap().tool,
            PackageTool::Apt
        );
        assert_eq!(
            SystemPackageManager::for_family("fedora").unwrap().tool,
            PackageTool::Dnf
        );
        assert_eq!(
            SystemPackageManager::for_family("alpine").unwrap().tool,
            PackageTool::Apk
        );
        assert!(SystemPackageManager::for_family("beos").is_err());
    }

    #[test]
    fn apt_install_is_noninteractive() {
        let pkg = SystemPackageManager::for_family("debian").unwrap();
        let (program, args) = pkg.mutate_args(true, &["erlang".to_string()]);
        assert_eq!(program, "apt-get");
        assert_eq!(args, vec!["install", "-y", "erlang"]);
    }

    #[test]
    fn pacman_remove_is_noninteractive() {
        let pkg = SystemPackageManager::for_family("arch").unwrap();
        let (program, args) = pkg.mutate_args(false, &["erlang".to_string()]);
        assert_eq!(program, "pacman");
        assert_eq!(args, vec!["-R", "--noconfirm", "erlang"]);
    }
}

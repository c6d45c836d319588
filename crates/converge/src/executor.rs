//! Action executor - where all real-world mutation happens.
//!
//! Dispatches on resource kind, probes current state first, and only
//! performs the work that is actually missing; an already-satisfied
//! resource reports [`ApplyResult::Unchanged`]. No retries happen at
//! this layer.

use crate::capability::{Capabilities, ServiceChange};
use crate::error::ActionError;
use crate::resource::{
    ActionVerb, CommandResource, DirectoryResource, FileResource, PackageResource,
    RemoteFileResource, Resource, ServiceResource, UserResource,
};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Result of applying a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    /// Real work was performed
    Applied,
    /// The desired state was already satisfied
    Unchanged,
}

/// Applies resources through the capability collaborators.
pub struct Executor<'a> {
    capabilities: Capabilities<'a>,
}

impl<'a> Executor<'a> {
    pub fn new(capabilities: Capabilities<'a>) -> Self {
        Self { capabilities }
    }

    /// Apply one resource, idempotently.
    pub fn apply(&self, resource: &Resource) -> Result<ApplyResult, ActionError> {
        match resource {
            Resource::Package(r) => self.apply_package(r),
            Resource::RemoteFile(r) => self.apply_remote_file(r),
            Resource::Directory(r) => self.apply_directory(r),
            Resource::File(r) => self.apply_file(r),
            Resource::User(r) => self.apply_user(r),
            Resource::Service(r) => self.apply_service(r),
            Resource::Command(r) => self.apply_command(r),
        }
    }

    fn apply_package(&self, pkg: &PackageResource) -> Result<ApplyResult, ActionError> {
        let names = pkg
            .resolved_names()
            .ok_or_else(|| ActionError::PackageManager {
                message: format!(
                    "package names for '{}' were not resolved before execution",
                    pkg.name
                ),
            })?;

        let mut changed = false;
        for verb in &pkg.actions {
            match verb {
                ActionVerb::Install => {
                    let missing = self.partition_packages(&names, false)?;
                    if !missing.is_empty() {
                        log::info!("installing packages: {}", missing.join(", "));
                        self.capabilities.packages.install(&missing)?;
                        changed = true;
                    }
                }
                ActionVerb::Remove => {
                    let present = self.partition_packages(&names, true)?;
                    if !present.is_empty() {
                        log::info!("removing packages: {}", present.join(", "));
                        self.capabilities.packages.remove(&present)?;
                        changed = true;
                    }
                }
                other => {
                    return Err(ActionError::UnsupportedAction {
                        action: other.to_string(),
                        kind: "package",
                    });
                }
            }
        }

        Ok(if changed {
            ApplyResult::Applied
        } else {
            ApplyResult::Unchanged
        })
    }

    /// Names whose installed state matches `installed`.
    fn partition_packages(
        &self,
        names: &[String],
        installed: bool,
    ) -> Result<Vec<String>, ActionError> {
        let mut matching = Vec::new();
        for name in names {
            if self.capabilities.packages.is_installed(name)? == installed {
                matching.push(name.clone());
            }
        }
        Ok(matching)
    }

    fn apply_remote_file(&self, rf: &RemoteFileResource) -> Result<ApplyResult, ActionError> {
        let expected = rf.checksum.to_ascii_lowercase();

        if rf.path.exists() && checksum_file(&rf.path)? == expected {
            return Ok(ApplyResult::Unchanged);
        }

        // Fetch to a staging path; the final path only ever sees a
        // rename of fully-verified content.
        let staging = staging_path(&rf.path);
        self.capabilities.remote.fetch(&rf.source, &staging)?;

        let actual = checksum_file(&staging)?;
        if actual != expected {
            let _ = fs::remove_file(&staging);
            return Err(ActionError::ChecksumMismatch {
                path: rf.path.clone(),
                expected,
                actual,
            });
        }

        fs::rename(&staging, &rf.path).map_err(|source| ActionError::Filesystem {
            path: rf.path.clone(),
            source,
        })?;

        Ok(ApplyResult::Applied)
    }

    fn apply_directory(&self, dir: &DirectoryResource) -> Result<ApplyResult, ActionError> {
        let mut changed = false;

        if !dir.path.is_dir() {
            fs::create_dir_all(&dir.path).map_err(|source| ActionError::Filesystem {
                path: dir.path.clone(),
                source,
            })?;
            changed = true;
        }

        changed |= attrs::converge(
            &dir.path,
            dir.owner.as_deref(),
            dir.group.as_deref(),
            dir.mode,
        )?;

        Ok(if changed {
            ApplyResult::Applied
        } else {
            ApplyResult::Unchanged
        })
    }

    fn apply_file(&self, file: &FileResource) -> Result<ApplyResult, ActionError> {
        let desired = self.render_content(file)?;

        let current = match fs::read(&file.path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(ActionError::Filesystem {
                    path: file.path.clone(),
                    source,
                });
            }
        };

        let mut changed = false;
        if current.as_deref() != Some(desired.as_slice()) {
            atomic_write(&file.path, &desired)?;
            changed = true;
        }

        changed |= attrs::converge(
            &file.path,
            file.owner.as_deref(),
            file.group.as_deref(),
            file.mode,
        )?;

        Ok(if changed {
            ApplyResult::Applied
        } else {
            ApplyResult::Unchanged
        })
    }

    fn render_content(&self, file: &FileResource) -> Result<Vec<u8>, ActionError> {
        match (&file.source, &file.content) {
            (Some(source), None) => self.capabilities.templates.render(source, &file.vars),
            (None, Some(content)) => Ok(content.clone().into_bytes()),
            _ => Err(ActionError::Template {
                message: format!(
                    "file resource '{}' needs exactly one of 'source' or 'content'",
                    file.path.display()
                ),
            }),
        }
    }

    fn apply_user(&self, user: &UserResource) -> Result<ApplyResult, ActionError> {
        let mut changed = false;

        for verb in &user.actions {
            match verb {
                ActionVerb::Create => {
                    if !user_exists(&user.name)? {
                        create_user(user)?;
                        changed = true;
                    }
                }
                ActionVerb::Remove => {
                    if user_exists(&user.name)? {
                        remove_user(&user.name)?;
                        changed = true;
                    }
                }
                other => {
                    return Err(ActionError::UnsupportedAction {
                        action: other.to_string(),
                        kind: "user",
                    });
                }
            }
        }

        Ok(if changed {
            ApplyResult::Applied
        } else {
            ApplyResult::Unchanged
        })
    }

    fn apply_service(&self, svc: &ServiceResource) -> Result<ApplyResult, ActionError> {
        let mut changed = false;

        for verb in &svc.actions {
            if !verb.is_service_verb() {
                return Err(ActionError::UnsupportedAction {
                    action: verb.to_string(),
                    kind: "service",
                });
            }
            match self.capabilities.services.apply(&svc.name, *verb)? {
                ServiceChange::Changed => changed = true,
                ServiceChange::AlreadySatisfied => {}
            }
        }

        Ok(if changed {
            ApplyResult::Applied
        } else {
            ApplyResult::Unchanged
        })
    }

    fn apply_command(&self, cmd: &CommandResource) -> Result<ApplyResult, ActionError> {
        let mut command = Command::new("sh");
        command.arg("-c").arg(&cmd.script).stdin(Stdio::null());
        if let Some(cwd) = &cmd.cwd {
            command.current_dir(cwd);
        }

        let output = command
            .output()
            .map_err(|source| ActionError::SubprocessLaunch { source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output.status.code();

            if cmd.best_effort {
                log::warn!(
                    "best-effort command '{}' exited with {:?}: {}",
                    cmd.name,
                    code,
                    stderr.trim()
                );
                return Ok(ApplyResult::Applied);
            }

            log::error!("command '{}' failed: {}", cmd.name, stderr.trim());
            return Err(ActionError::SubprocessExit { code });
        }

        Ok(ApplyResult::Applied)
    }
}

/// SHA-256 of a file's content, lowercase hex.
pub fn checksum_file(path: &Path) -> Result<String, ActionError> {
    let bytes = fs::read(path).map_err(|source| ActionError::Filesystem {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

fn staging_path(dest: &Path) -> PathBuf {
    sibling_path(dest, ".partial")
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Write via a temporary sibling plus rename, so the destination is
/// only ever the old content or the complete new content.
fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), ActionError> {
    let fs_err = |source| ActionError::Filesystem {
        path: path.to_path_buf(),
        source,
    };

    let tmp = sibling_path(path, ".tmp");

    fs::write(&tmp, bytes).map_err(fs_err)?;
    fs::rename(&tmp, path).map_err(fs_err)
}

fn user_exists(name: &str) -> Result<bool, ActionError> {
    let status = Command::new("id")
        .arg("-u")
        .arg(name)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| ActionError::User {
            message: format!("failed to run id: {e}"),
        })?;
    Ok(status.success())
}

fn create_user(user: &UserResource) -> Result<(), ActionError> {
    let mut command = Command::new("useradd");
    if user.system {
        command.arg("--system");
    }
    command.arg(if user.manage_home { "-m" } else { "-M" });
    if let Some(comment) = &user.comment {
        command.args(["-c", comment]);
    }
    if let Some(home) = &user.home {
        command.arg("-d").arg(home);
    }
    command.arg(&user.name);

    let output = command.output().map_err(|e| ActionError::User {
        message: format!("failed to run useradd: {e}"),
    })?;

    if !output.status.success() {
        return Err(ActionError::User {
            message: format!(
                "useradd {} failed: {}",
                user.name,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(())
}

fn remove_user(name: &str) -> Result<(), ActionError> {
    let output = Command::new("userdel")
        .arg(name)
        .output()
        .map_err(|e| ActionError::User {
            message: format!("failed to run userdel: {e}"),
        })?;

    if !output.status.success() {
        return Err(ActionError::User {
            message: format!(
                "userdel {name} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(())
}

/// Owner/group/mode convergence for paths that already exist.
#[cfg(unix)]
mod attrs {
    use crate::error::ActionError;
    use std::fs;
    use std::path::Path;
    use std::process::Command;

    pub fn converge(
        path: &Path,
        owner: Option<&str>,
        group: Option<&str>,
        mode: Option<u32>,
    ) -> Result<bool, ActionError> {
        use std::os::unix::fs::{MetadataExt, PermissionsExt};

        let fs_err = |source| ActionError::Filesystem {
            path: path.to_path_buf(),
            source,
        };

        let metadata = fs::metadata(path).map_err(fs_err)?;
        let mut changed = false;

        if let Some(mode) = mode
            && metadata.permissions().mode() & 0o7777 != mode
        {
            fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(fs_err)?;
            changed = true;
        }

        let uid = owner.map(lookup_uid).transpose()?;
        let gid = group.map(lookup_gid).transpose()?;
        let ownership_differs = uid.is_some_and(|u| metadata.uid() != u)
            || gid.is_some_and(|g| metadata.gid() != g);

        if ownership_differs {
            std::os::unix::fs::chown(path, uid, gid).map_err(fs_err)?;
            changed = true;
        }

        Ok(changed)
    }

    fn lookup_uid(name: &str) -> Result<u32, ActionError> {
        let output = Command::new("id")
            .args(["-u", name])
            .output()
            .map_err(|e| ActionError::User {
                message: format!("failed to run id: {e}"),
            })?;

        if !output.status.success() {
            return Err(ActionError::User {
                message: format!("unknown user '{name}'"),
            });
        }

        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse()
            .map_err(|e| ActionError::User {
                message: format!("unparseable uid for '{name}': {e}"),
            })
    }

    fn lookup_gid(name: &str) -> Result<u32, ActionError> {
        let output = Command::new("getent")
            .args(["group", name])
            .output()
            .map_err(|e| ActionError::User {
                message: format!("failed to run getent: {e}"),
            })?;

        if !output.status.success() {
            return Err(ActionError::User {
                message: format!("unknown group '{name}'"),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .trim()
            .split(':')
            .nth(2)
            .and_then(|gid| gid.parse().ok())
            .ok_or_else(|| ActionError::User {
                message: format!("unparseable getent output for group '{name}'"),
            })
    }
}

#[cfg(not(unix))]
mod attrs {
    use crate::error::ActionError;
    use std::path::Path;

    pub fn converge(
        _path: &Path,
        _owner: Option<&str>,
        _group: Option<&str>,
        _mode: Option<u32>,
    ) -> Result<bool, ActionError> {
        Ok(false)
    }
}

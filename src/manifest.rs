//! Manifest loading - TOML files on disk to an in-memory run list.
//!
//! A manifest may include other manifest files; includes are resolved
//! relative to the including file, loaded before the file's own
//! resources, and checked for cycles across the whole include chain.

use anyhow::{Context, Result, bail};
use converge::{ConvergenceError, PlatformGate, Resource, RunList};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// On-disk shape of one manifest file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    name: Option<String>,
    #[serde(default)]
    skip_when: Vec<PlatformGate>,
    #[serde(default)]
    includes: Vec<String>,
    #[serde(default)]
    resources: Vec<Resource>,
}

/// Default manifest location under the user config directory.
pub fn default_path() -> Result<PathBuf> {
    let config = dirs::config_dir().context("could not determine the user config directory")?;
    Ok(config.join("sous").join("manifest.toml"))
}

/// The manifest to use: the user's path (tilde-expanded) or the default.
pub fn resolve_path(arg: Option<PathBuf>) -> Result<PathBuf> {
    match arg {
        Some(path) => {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            Ok(PathBuf::from(expanded))
        }
        None => default_path(),
    }
}

/// Load a manifest and its whole include tree into a run list.
pub fn load(path: &Path) -> Result<RunList> {
    let mut chain = Vec::new();
    load_inner(path, &mut chain)
}

fn load_inner(path: &Path, chain: &mut Vec<PathBuf>) -> Result<RunList> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("manifest not found: {}", path.display()))?;

    if chain.contains(&canonical) {
        let name = display_name(path);
        return Err(ConvergenceError::IncludeCycle { name })
            .with_context(|| format!("while loading {}", path.display()));
    }
    chain.push(canonical.clone());

    let text = std::fs::read_to_string(&canonical)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file: ManifestFile =
        toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))?;

    let mut list = RunList::new(file.name.unwrap_or_else(|| display_name(path)));
    list.skip_when = file.skip_when;

    let base = canonical
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    // Includes run before the file's own resources, in declaration
    // order, matching how they are written at the top of a manifest.
    for include in &file.includes {
        let expanded = shellexpand::tilde(include);
        let target = base.join(expanded.as_ref());
        let nested = load_inner(&target, chain)
            .with_context(|| format!("included from {}", path.display()))?;
        list.include(nested);
    }

    for resource in file.resources {
        list.push(resource);
    }

    chain.pop();
    log::debug!(
        "loaded manifest '{}' ({} resources)",
        list.name,
        list.len()
    );
    Ok(list)
}

fn display_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Structural checks that do not need platform facts.
pub fn validate(list: &RunList) -> Result<()> {
    for resource in list.all_resources() {
        if resource.actions().is_empty() {
            bail!(
                "{} '{}' declares no actions",
                resource.kind(),
                resource.id()
            );
        }
        if let Resource::File(file) = resource
            && file.source.is_some() == file.content.is_some()
        {
            bail!(
                "file '{}' needs exactly one of 'source' or 'content'",
                file.path.display()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge::PlatformFacts;
    use std::fs;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_resources_in_declaration_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "main.toml",
            r#"
name = "couchdb"

[[resources]]
type = "package"
name = "erlang"

[[resources]]
type = "command"
name = "configure"
script = "./configure"
"#,
        );

        let list = load(&path).unwrap();
        assert_eq!(list.name, "couchdb");
        let ids: Vec<String> = list.all_resources().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["erlang", "configure"]);
    }

    #[test]
    fn includes_run_before_own_resources() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "erlang.toml",
            r#"
[[resources]]
type = "package"
name = "erlang"
"#,
        );
        let path = write(
            dir.path(),
            "main.toml",
            r#"
includes = ["erlang.toml"]

[[resources]]
type = "package"
name = "couchdb"
"#,
        );

        let list = load(&path).unwrap();
        let facts = PlatformFacts::new("debian", "11", "x86_64");
        let ids: Vec<String> = list.flatten(&facts).iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["erlang", "couchdb"]);
    }

    #[test]
    fn include_cycles_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.toml", r#"includes = ["b.toml"]"#);
        write(dir.path(), "b.toml", r#"includes = ["a.toml"]"#);

        let err = load(&dir.path().join("a.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("include cycle"));
    }

    #[test]
    fn skip_when_gates_survive_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "main.toml",
            r#"
[[skip_when]]
family = "ubuntu"
version = "8.04"
reason = "development libraries are too old"
"#,
        );

        let list = load(&path).unwrap();
        let gated = PlatformFacts::new("ubuntu", "8.04", "x86_64");
        assert!(list.gate(&gated).is_some());
        let ok = PlatformFacts::new("ubuntu", "12.04", "x86_64");
        assert!(list.gate(&ok).is_none());
    }

    #[test]
    fn conditional_package_names_parse_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "main.toml",
            r#"
[[resources]]
type = "package"
name = "couchdb-deps"

[[resources.packages]]
[resources.packages.by_platform.ubuntu]
default = "libmozjs185-dev"
"10.04" = "libmozjs-dev"
[resources.packages.by_platform.debian]
default = "libmozjs185-dev"
"#,
        );

        let list = load(&path).unwrap();
        let facts = PlatformFacts::new("ubuntu", "12.04", "x86_64");
        let resolved = list.all_resources()[0].resolve(&facts).unwrap();
        match resolved {
            Resource::Package(pkg) => {
                assert_eq!(
                    pkg.resolved_names(),
                    Some(vec!["libmozjs185-dev".to_string()])
                );
            }
            other => panic!("unexpected resource: {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_file_with_both_source_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "main.toml",
            r#"
[[resources]]
type = "file"
path = "/etc/couchdb/local.ini"
source = "local.ini.tmpl"
content = "inline"
"#,
        );

        let list = load(&path).unwrap();
        assert!(validate(&list).is_err());
    }

    #[test]
    fn validate_rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "main.toml", "unknown_key = true\n");
        assert!(load(&path).is_err());
    }
}

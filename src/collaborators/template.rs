//! File-backed template rendering.
//!
//! Templates are plain text files next to the manifest with
//! `{{key}}` placeholders. Every placeholder must be bound; an
//! unbound one fails the resource rather than leaking into the
//! rendered file.

use converge::{ActionError, TemplateEngine};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub struct FileTemplateEngine {
    base_dir: PathBuf,
}

impl FileTemplateEngine {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
        }
    }
}

impl TemplateEngine for FileTemplateEngine {
    fn render(&self, source: &str, vars: &BTreeMap<String, String>) -> Result<Vec<u8>, ActionError> {
        let path = self.base_dir.join(source);
        let body = std::fs::read_to_string(&path).map_err(|e| ActionError::Template {
            message: format!("cannot read template {}: {e}", path.display()),
        })?;
        Ok(substitute(&body, vars, source)?.into_bytes())
    }
}

fn substitute(
    body: &str,
    vars: &BTreeMap<String, String>,
    source: &str,
) -> Result<String, ActionError> {
    let mut rendered = body.to_string();
    for (key, value) in vars {
        rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
    }

    if let Some(start) = rendered.find("{{") {
        let tail = &rendered[start..];
        let placeholder = tail
            .find("}}")
            .map_or(tail, |end| &tail[..end + 2]);
        return Err(ActionError::Template {
            message: format!("unbound placeholder {placeholder} in template '{source}'"),
        });
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_all_placeholders() {
        let out = substitute(
            "bind = {{addr}}:{{port}}\n",
            &vars(&[("addr", "127.0.0.1"), ("port", "5984")]),
            "local.ini",
        )
        .unwrap();
        assert_eq!(out, "bind = 127.0.0.1:5984\n");
    }

    #[test]
    fn unbound_placeholder_is_an_error() {
        let err = substitute("addr = {{addr}}\n", &vars(&[]), "local.ini").unwrap_err();
        assert!(err.to_string().contains("{{addr}}"));
    }

    #[test]
    fn renders_from_base_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("motd.tmpl"), "hello {{name}}").unwrap();

        let engine = FileTemplateEngine::new(dir.path());
        let out = engine.render("motd.tmpl", &vars(&[("name", "sous")])).unwrap();
        assert_eq!(out, b"hello sous");
    }

    #[test]
    fn missing_template_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FileTemplateEngine::new(dir.path());
        assert!(engine.render("absent.tmpl", &vars(&[])).is_err());
    }
}

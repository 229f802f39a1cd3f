//! Template Renderer (§4.B): walks a template directory tree, substitutes
//! TemplateData into every `.tmpl` file, copies everything else verbatim.

use crate::{CoreError, Result};
use handlebars::Handlebars;
use proxydc_config::TemplateData;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const TMPL_SUFFIX: &str = ".tmpl";

/// The name a template's compose file must carry; its presence in a
/// template's `.devcontainer/` directory is what marks the directory as a
/// template at all.
pub const COMPOSE_TEMPLATE_NAME: &str = "docker-compose.yml.tmpl";

pub struct TemplateRenderer {
    /// Root directory containing one subdirectory per named template.
    template_dir: PathBuf,
}

impl TemplateRenderer {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
        }
    }

    /// Render `<template_dir>/<name>/.devcontainer` into
    /// `<project_path>/.devcontainer`.
    pub fn render(&self, name: &str, data: &TemplateData) -> Result<()> {
        data.validate()
            .map_err(|e| CoreError::InvalidTemplateData(e.to_string()))?;

        let src_root = self.template_dir.join(name).join(".devcontainer");
        if !src_root.join(COMPOSE_TEMPLATE_NAME).is_file() {
            return Err(CoreError::TemplateNotFound(name.to_string()));
        }

        let dest_root = data.project_path().join(".devcontainer");
        fs::create_dir_all(&dest_root)?;

        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);

        for entry in WalkDir::new(&src_root) {
            let entry = entry.map_err(|e| CoreError::Io(e.into()))?;
            let rel = entry
                .path()
                .strip_prefix(&src_root)
                .expect("walked entry is under src_root");
            if rel.as_os_str().is_empty() {
                continue;
            }
            let dest_path = dest_root.join(rel);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest_path)?;
                set_mode(&dest_path, 0o755);
                continue;
            }

            if !entry.file_type().is_file() {
                continue;
            }

            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }

            let file_name = entry.file_name().to_string_lossy();
            if let Some(stem) = file_name.strip_suffix(TMPL_SUFFIX) {
                let source = fs::read_to_string(entry.path())?;
                let rendered = handlebars
                    .render_template(&source, data)
                    .map_err(|e| CoreError::InvalidTemplateData(e.to_string()))?;
                let out_path = dest_path.with_file_name(stem);
                fs::write(&out_path, rendered)?;
                set_mode(&out_path, 0o644);
            } else {
                fs::copy(entry.path(), &dest_path)?;
                set_mode(&dest_path, 0o644);
            }
        }

        Ok(())
    }

    /// True if `<template_dir>/<name>/.devcontainer/docker-compose.yml.tmpl` exists.
    pub fn template_exists(&self, name: &str) -> bool {
        self.template_dir
            .join(name)
            .join(".devcontainer")
            .join(COMPOSE_TEMPLATE_NAME)
            .is_file()
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = fs::metadata(path) {
        let mut perms = meta.permissions();
        perms.set_mode(mode);
        let _ = fs::set_permissions(path, perms);
    }
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_data(project_path: &Path) -> TemplateData {
        TemplateData::new(
            project_path,
            "basic",
            "p-1",
            "proxy:latest",
            8080,
            "vscode",
            "/var/log/proxy/requests.jsonl",
            None,
            None,
        )
    }

    fn write_template(root: &Path) {
        let devc = root.join("basic").join(".devcontainer");
        fs::create_dir_all(devc.join("containers/proxy")).unwrap();
        fs::write(
            devc.join("docker-compose.yml.tmpl"),
            "name: {{container_name}}\nmem_limit: 4g\n",
        )
        .unwrap();
        fs::write(
            devc.join("devcontainer.json.tmpl"),
            "{\"name\": \"{{project_name}}\", \"image\": \"{{proxy_image}}\"}",
        )
        .unwrap();
        fs::write(devc.join("containers/proxy/entrypoint.sh"), "#!/bin/sh\necho hi\n").unwrap();
    }

    #[test]
    fn renders_tmpl_files_and_copies_others_verbatim() {
        let templates = tempdir().unwrap();
        write_template(templates.path());
        let project = tempdir().unwrap();

        let renderer = TemplateRenderer::new(templates.path());
        let data = sample_data(project.path());
        renderer.render("basic", &data).unwrap();

        let compose = fs::read_to_string(
            project.path().join(".devcontainer/docker-compose.yml"),
        )
        .unwrap();
        assert!(compose.contains("name: p-1"));
        assert!(compose.contains("mem_limit: 4g"));

        let devcontainer_json = fs::read_to_string(
            project.path().join(".devcontainer/devcontainer.json"),
        )
        .unwrap();
        assert!(devcontainer_json.contains(&data.project_name));

        let entrypoint = fs::read_to_string(
            project
                .path()
                .join(".devcontainer/containers/proxy/entrypoint.sh"),
        )
        .unwrap();
        assert_eq!(entrypoint, "#!/bin/sh\necho hi\n");
    }

    #[test]
    fn substituted_values_are_not_html_escaped() {
        let templates = tempdir().unwrap();
        write_template(templates.path());
        let project = tempdir().unwrap();

        let renderer = TemplateRenderer::new(templates.path());
        let mut data = sample_data(project.path());
        data.proxy_image = "a & b <c>".to_string();
        renderer.render("basic", &data).unwrap();

        let devcontainer_json = fs::read_to_string(
            project.path().join(".devcontainer/devcontainer.json"),
        )
        .unwrap();
        assert!(devcontainer_json.contains("a & b <c>"));
    }

    #[test]
    fn missing_template_fails_with_template_not_found() {
        let templates = tempdir().unwrap();
        let project = tempdir().unwrap();
        let renderer = TemplateRenderer::new(templates.path());
        let data = sample_data(project.path());
        let err = renderer.render("ghost", &data).unwrap_err();
        assert!(matches!(err, CoreError::TemplateNotFound(_)));
    }

    #[test]
    fn invalid_template_data_rejected_before_any_write() {
        let templates = tempdir().unwrap();
        write_template(templates.path());
        let project = tempdir().unwrap();
        let renderer = TemplateRenderer::new(templates.path());
        let mut data = sample_data(project.path());
        data.container_name = "a:b".to_string();

        let err = renderer.render("basic", &data).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTemplateData(_)));
        assert!(!project.path().join(".devcontainer").exists());
    }
}

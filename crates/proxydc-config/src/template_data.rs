//! The substitution environment for the template renderer (§3 TemplateData).

use crate::ConfigError;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Characters that are structurally significant in the compose/devcontainer
/// YAML we render and must never appear in a name we substitute in.
const FORBIDDEN_NAME_CHARS: &[char] = &[
    ':', '{', '}', '[', ']', '|', '>', '&', '*', '!', '%', '#', '@',
];

/// The platform null device, used as the sentinel "no token" host path so a
/// bind-mount spec never causes the runtime to auto-create an empty
/// directory on the host.
#[cfg(unix)]
pub const NULL_DEVICE: &str = "/dev/null";
#[cfg(windows)]
pub const NULL_DEVICE: &str = "NUL";

/// Substitution environment handed to the template renderer for one project.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateData {
    /// Absolute project path on the host.
    pub project_path: PathBuf,
    /// Last path segment of `project_path`.
    pub project_name: String,
    /// Workspace mount point inside the container, `/workspaces/<project_name>`.
    pub workspace_folder: String,
    /// Resolved host path of the agent token file, or [`NULL_DEVICE`].
    pub agent_token_host_path: String,
    /// Resolved host path of the forge token file, or [`NULL_DEVICE`].
    pub forge_token_host_path: String,
    /// Name of the template this bundle was rendered from.
    pub template_name: String,
    /// Chosen container logical name.
    pub container_name: String,
    /// Proxy sidecar image reference.
    pub proxy_image: String,
    /// Port the proxy listens on inside its own container.
    pub proxy_listen_port: u16,
    /// User the adapter execs as inside the app container.
    pub remote_user: String,
    /// Container-internal path of the proxy's JSONL request log.
    pub proxy_log_container_path: String,
}

impl TemplateData {
    /// Build TemplateData for a fresh project, deriving `project_name` and
    /// `workspace_folder` from `project_path`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project_path: impl Into<PathBuf>,
        template_name: impl Into<String>,
        container_name: impl Into<String>,
        proxy_image: impl Into<String>,
        proxy_listen_port: u16,
        remote_user: impl Into<String>,
        proxy_log_container_path: impl Into<String>,
        agent_token_host_path: Option<String>,
        forge_token_host_path: Option<String>,
    ) -> Self {
        let project_path = project_path.into();
        let project_name = project_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());
        let workspace_folder = format!("/workspaces/{project_name}");

        Self {
            project_path,
            project_name,
            workspace_folder,
            agent_token_host_path: agent_token_host_path.unwrap_or_else(|| NULL_DEVICE.to_string()),
            forge_token_host_path: forge_token_host_path.unwrap_or_else(|| NULL_DEVICE.to_string()),
            template_name: template_name.into(),
            container_name: container_name.into(),
            proxy_image: proxy_image.into(),
            proxy_listen_port,
            remote_user: remote_user.into(),
            proxy_log_container_path: proxy_log_container_path.into(),
        }
    }

    /// Validate that the container and project names contain none of the
    /// YAML-structurally-significant characters. Must be called before
    /// `TemplateRenderer::render` writes anything to disk.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("container_name", &self.container_name),
            ("project_name", &self.project_name),
        ] {
            if let Some(c) = value.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
                return Err(ConfigError::Invalid(format!(
                    "{field} {value:?} contains forbidden character {c:?}"
                )));
            }
        }
        Ok(())
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TemplateData {
        TemplateData::new(
            "/home/u/p",
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

    #[test]
    fn derives_project_name_and_workspace_folder() {
        let data = sample();
        assert_eq!(data.project_name, "p");
        assert_eq!(data.workspace_folder, "/workspaces/p");
    }

    #[test]
    fn missing_tokens_fall_back_to_null_device() {
        let data = sample();
        assert_eq!(data.agent_token_host_path, NULL_DEVICE);
        assert_eq!(data.forge_token_host_path, NULL_DEVICE);
    }

    #[test]
    fn rejects_forbidden_characters_in_container_name() {
        let mut data = sample();
        data.container_name = "a:b".to_string();
        assert!(data.validate().is_err());
    }

    #[test]
    fn accepts_plain_names() {
        assert!(sample().validate().is_ok());
    }
}

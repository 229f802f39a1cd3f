//! Credential Provisioner (§4.D): resolves the per-agent auth token and the
//! forge token from configured host paths, expanding `~` and falling back
//! to the null-device sentinel when absent.

use proxydc_config::NULL_DEVICE;
use std::path::Path;
use tracing::warn;

/// Invoked when the agent token file is absent; shells out to an
/// agent-specific CLI in the reference environment. Failures are non-fatal.
pub type AutoProvisionHook = Box<dyn Fn() -> Result<(), String> + Send + Sync>;

/// Resolved host path plus whatever token text (if any) was read, trimmed.
pub struct ResolvedToken {
    pub host_path: String,
    pub value: Option<String>,
    /// Set when resolution fell back to the null device for a non-fatal
    /// reason; the caller delivers this to the Manager's log sink in
    /// addition to the `tracing::warn!` already emitted here.
    pub warning: Option<String>,
}

fn expand(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}

/// Resolve the agent token. If `configured_path` is `None`, the token is
/// skipped entirely. If the expanded path doesn't exist and `auto_provision`
/// is set, the hook runs; its failure is logged and swallowed.
pub fn resolve_agent_token(
    configured_path: Option<&str>,
    auto_provision: Option<&AutoProvisionHook>,
) -> ResolvedToken {
    let Some(configured_path) = configured_path else {
        return ResolvedToken {
            host_path: NULL_DEVICE.to_string(),
            value: None,
            warning: None,
        };
    };

    let expanded = expand(configured_path);
    let path = Path::new(&expanded);

    let mut warning = None;
    if !path.exists() {
        if let Some(hook) = auto_provision {
            if let Err(e) = hook() {
                let message = format!("agent token auto-provision failed, continuing without token: {e}");
                warn!(error = %e, "agent token auto-provision failed, continuing without token");
                warning = Some(message);
            }
        }
    }

    read_trimmed(path)
        .map(|value| ResolvedToken {
            host_path: expanded.clone(),
            value: Some(value),
            warning: warning.clone(),
        })
        .unwrap_or(ResolvedToken {
            host_path: NULL_DEVICE.to_string(),
            value: None,
            warning,
        })
}

/// Resolve the forge token. Read-only; never auto-provisioned. Missing is
/// logged at WARN and treated as "no token".
pub fn resolve_forge_token(configured_path: Option<&str>) -> ResolvedToken {
    let Some(configured_path) = configured_path else {
        return ResolvedToken {
            host_path: NULL_DEVICE.to_string(),
            value: None,
            warning: None,
        };
    };

    let expanded = expand(configured_path);
    let path = Path::new(&expanded);

    match read_trimmed(path) {
        Some(value) => ResolvedToken {
            host_path: expanded,
            value: Some(value),
            warning: None,
        },
        None => {
            warn!(path = %expanded, "forge token file not found, continuing without token");
            ResolvedToken {
                host_path: NULL_DEVICE.to_string(),
                value: None,
                warning: Some(format!("forge token file not found at {expanded}, continuing without token")),
            }
        }
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim_end().to_string())
}

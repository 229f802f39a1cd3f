//! Proxy Artifact Store (§4.C): per-project host directories for proxy
//! configuration and the mitmproxy-generated CA certificate, plus allowlist
//! extraction from a generated filter script.

use crate::Result;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

const CA_CERT_FILENAME: &str = "mitmproxy-ca-cert.pem";
const ALLOWLIST_MARKER: &str = "ALLOWED_DOMAINS = [";

/// 12-hex-character prefix of the SHA-256 of `project_path`'s absolute form.
pub fn project_hash(project_path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(project_path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    hex_prefix(&digest, 6)
}

fn hex_prefix(bytes: &[u8], n: usize) -> String {
    bytes.iter().take(n).map(|b| format!("{b:02x}")).collect()
}

pub struct ProxyArtifactStore {
    data_dir: PathBuf,
}

impl ProxyArtifactStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn cert_dir(&self, project_path: &Path) -> PathBuf {
        self.data_dir.join("proxy").join(project_hash(project_path))
    }

    /// Returns (and lazily creates) the host directory where the mitmproxy
    /// sidecar's CA certificate is expected to appear on first run.
    pub fn get_proxy_cert_dir(&self, project_path: &Path) -> Result<PathBuf> {
        let dir = self.cert_dir(project_path);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Stats the expected CA certificate path; does not create anything.
    pub fn proxy_cert_exists(&self, project_path: &Path) -> bool {
        self.cert_dir(project_path).join(CA_CERT_FILENAME).is_file()
    }

    /// Parses the allowlist embedded in `filter_script_path`. Returns an
    /// empty list if the marker is absent or the file does not exist — not
    /// an error.
    pub fn read_allowlist_from_filter_script(&self, filter_script_path: &Path) -> Result<Vec<String>> {
        let contents = match std::fs::read_to_string(filter_script_path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(parse_allowlist(&contents))
    }

    /// Removes the per-project cert directory. Idempotent: missing is not an error.
    pub fn cleanup_proxy_configs(&self, project_path: &Path) -> Result<()> {
        let dir = self.cert_dir(project_path);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn parse_allowlist(contents: &str) -> Vec<String> {
    let Some(marker_at) = contents.find(ALLOWLIST_MARKER) else {
        return Vec::new();
    };
    let after_marker = &contents[marker_at + ALLOWLIST_MARKER.len()..];
    let Some(close_at) = after_marker.find(']') else {
        return Vec::new();
    };
    let body = &after_marker[..close_at];

    let mut domains = Vec::new();
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' || c == '\'' {
            let quote = c;
            let mut domain = String::new();
            for next in chars.by_ref() {
                if next == quote {
                    break;
                }
                domain.push(next);
            }
            domains.push(domain);
        }
    }
    domains
}

/// Render a filter script's allowlist block from a domain list, used by
/// tests to check the round-trip against [`parse_allowlist`].
#[cfg(test)]
fn render_allowlist(domains: &[String]) -> String {
    let mut out = String::from("ALLOWED_DOMAINS = [\n");
    for d in domains {
        out.push_str(&format!("    \"{d}\",\n"));
    }
    out.push_str("]\n");
    out
}

//! Common types for the Runtime Adapter

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque runtime-assigned container or sidecar ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 12-hex-character prefix, the length the runtime's default `ps`
    /// formatting truncates IDs to.
    pub fn short(&self) -> &str {
        if self.0.len() > 12 {
            &self.0[..12]
        } else {
            &self.0
        }
    }

    pub fn is_prefix_of(&self, other: &ContainerId) -> bool {
        other.0.starts_with(&self.0) || self.0.starts_with(&other.0)
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ContainerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which binary/compose dialect the adapter drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Docker,
    Podman,
}

impl RuntimeKind {
    pub fn binary(self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

impl std::fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.binary())
    }
}

impl std::str::FromStr for RuntimeKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "podman" => Ok(Self::Podman),
            other => Err(format!("unknown runtime {other:?}")),
        }
    }
}

/// The internal three-state model §3 mandates: no "paused"/"restarting"
/// distinctions survive reconciliation, those all fold into `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeState {
    Created,
    Running,
    Stopped,
}

impl From<&str> for RuntimeState {
    fn from(raw: &str) -> Self {
        match raw {
            "running" => Self::Running,
            "created" => Self::Created,
            // exited | paused | dead | removing | anything unrecognized
            _ => Self::Stopped,
        }
    }
}

/// One raw record returned by `ListContainers`, before the Manager
/// partitions it into a Container or a Sidecar based on its labels.
#[derive(Debug, Clone)]
pub struct ListedRecord {
    pub id: ContainerId,
    pub name: String,
    pub state: RuntimeState,
    pub labels: HashMap<String, String>,
}

/// Diagnostic detail parsed from `inspect`, backing `IsolationInfo`.
#[derive(Debug, Clone, Default)]
pub struct InspectInfo {
    pub cap_add: Vec<String>,
    pub cap_drop: Vec<String>,
    pub memory_bytes: u64,
    pub nano_cpus: i64,
    pub pids_limit: Option<i64>,
    pub env: Vec<String>,
    pub networks: HashMap<String, NetworkEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkEntry {
    pub network_id: String,
    pub ip_address: Option<String>,
    pub gateway: Option<String>,
}

/// One service row from `compose ps`.
#[derive(Debug, Clone)]
pub struct ComposeServiceRecord {
    pub service_name: String,
    pub container_id: ContainerId,
}

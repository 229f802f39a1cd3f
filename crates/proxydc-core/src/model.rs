//! Domain entities (§3): Container, Sidecar, Session, ProxyRequest,
//! LogEntry, IsolationInfo.

use chrono::{DateTime, Utc};
use proxydc_runtime::ContainerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// The three-state DAG §3 mandates: `(none) -> created -> running <-> stopped -> (none)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Stopped,
}

impl From<proxydc_runtime::RuntimeState> for ContainerState {
    fn from(state: proxydc_runtime::RuntimeState) -> Self {
        match state {
            proxydc_runtime::RuntimeState::Created => Self::Created,
            proxydc_runtime::RuntimeState::Running => Self::Running,
            proxydc_runtime::RuntimeState::Stopped => Self::Stopped,
        }
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// A managed application instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub id: ContainerId,
    pub name: String,
    pub project_path: PathBuf,
    pub template: String,
    pub state: ContainerState,
    pub created_at: DateTime<Utc>,
    pub labels: HashMap<String, String>,
    pub remote_user: String,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

/// A secondary container started alongside a Container. Correlated to its
/// Container via a shared compose-project label rather than by the
/// parent's container ID (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sidecar {
    pub id: ContainerId,
    pub name: String,
    pub sidecar_type: String,
    /// The shared compose-project label value linking this Sidecar to its Container.
    pub parent_ref: String,
    pub state: ContainerState,
    pub network_name: Option<String>,
}

/// A multiplexer session inside a Container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    pub container_id: ContainerId,
    pub windows: u32,
    pub attached: bool,
}

/// One parsed JSONL line from the proxy's request log. Deliberately
/// excludes bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyRequest {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub duration_ms: f64,
    #[serde(default)]
    pub req_headers: HashMap<String, String>,
    #[serde(default)]
    pub res_headers: HashMap<String, String>,
}

/// Raw wire shape of one JSONL proxy log record (§6): a floating-point
/// Unix timestamp in seconds, converted preserving nanosecond precision.
#[derive(Debug, Deserialize)]
pub(crate) struct RawProxyRequest {
    pub ts: f64,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub duration_ms: f64,
    #[serde(default)]
    pub req_headers: HashMap<String, String>,
    #[serde(default)]
    pub res_headers: HashMap<String, String>,
}

impl From<RawProxyRequest> for ProxyRequest {
    fn from(raw: RawProxyRequest) -> Self {
        let secs = raw.ts.trunc() as i64;
        let nanos = ((raw.ts.fract()) * 1_000_000_000.0).round() as u32;
        let timestamp = DateTime::from_timestamp(secs, nanos).unwrap_or_else(Utc::now);
        Self {
            timestamp,
            method: raw.method,
            url: raw.url,
            status: raw.status,
            duration_ms: raw.duration_ms,
            req_headers: raw.req_headers,
            res_headers: raw.res_headers,
        }
    }
}

/// Parse one JSONL line into a ProxyRequest. Malformed lines are the
/// caller's concern to skip (§4.E).
pub fn parse_proxy_request(line: &str) -> serde_json::Result<ProxyRequest> {
    let raw: RawProxyRequest = serde_json::from_str(line)?;
    Ok(raw.into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Reserved key under which a ProxyRequest-derived LogEntry carries the
/// full request so a UI can render details.
pub const PROXY_REQUEST_FIELD: &str = "proxy_request";

/// Consumed by the UI layer; the Manager emits these via the injected sink
/// and does not store them itself (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub scope: String,
    pub message: String,
    #[serde(default)]
    pub fields: HashMap<String, serde_json::Value>,
}

impl LogEntry {
    pub fn new(severity: Severity, scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            scope: scope.into(),
            message: message.into(),
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// Derive the LogEntry for one ProxyRequest tailed from `container_name`'s
/// proxy sidecar (§4.E).
pub fn proxy_request_to_log_entry(request: &ProxyRequest, container_name: &str) -> LogEntry {
    let severity = match request.status {
        0..=399 => Severity::Info,
        400..=499 => Severity::Warn,
        _ => Severity::Error,
    };
    let message = format!(
        "{} {} {} {}ms",
        request.status, request.method, request.url, request.duration_ms
    );
    let fields = serde_json::to_value(request)
        .ok()
        .map(|v| {
            let mut m = HashMap::new();
            m.insert(PROXY_REQUEST_FIELD.to_string(), v);
            m
        })
        .unwrap_or_default();

    LogEntry {
        timestamp: request.timestamp,
        severity,
        scope: format!("proxy.{container_name}"),
        message,
        fields,
    }
}

/// Diagnostic snapshot read from the runtime (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IsolationInfo {
    pub cap_drop: Vec<String>,
    pub cap_add: Vec<String>,
    pub memory_limit: String,
    pub cpu_limit: String,
    pub pids_limit: Option<i64>,
    pub non_default_network: bool,
    pub network_name: Option<String>,
    pub container_ip: Option<String>,
    pub gateway_ip: Option<String>,
    pub proxy_address: Option<String>,
}

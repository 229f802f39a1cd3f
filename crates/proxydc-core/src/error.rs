//! Error types for the Manager (§7)

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(#[from] proxydc_config::ConfigError),

    #[error(transparent)]
    Provider(#[from] proxydc_runtime::ProviderError),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("invalid template data: {0}")]
    InvalidTemplateData(String),

    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("container creation failed: {0}")]
    CreationFailed(String),

    #[error("proxy log reader unavailable: {0}")]
    ProxyLogUnavailable(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

//! Core orchestration logic: template rendering, proxy artifact storage,
//! credential provisioning, proxy log tailing, process supervision, and the
//! Manager that ties the components together (§4).

pub mod credentials;
mod error;
mod log_reader;
pub mod manager;
pub mod model;
mod proxy_store;
mod supervisor;
mod template;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::{CoreError, Result};
pub use log_reader::ProxyLogReader;
pub use manager::{CreateOptions, Manager};
pub use proxy_store::{project_hash, ProxyArtifactStore};
pub use supervisor::{ProcessSupervisor, RestartPolicy, SupervisorConfig};
pub use template::{TemplateRenderer, COMPOSE_TEMPLATE_NAME};

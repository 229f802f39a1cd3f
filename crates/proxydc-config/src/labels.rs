//! Label constants carried by every managed Container and Sidecar.
//!
//! `MANAGED` is the sole discriminator the Runtime Adapter filters `ps -a`
//! on; `SIDECAR_TYPE` is what separates a Sidecar record from a Container
//! record during reconciliation (see `proxydc-core::manager::reconcile`).

pub const NAMESPACE: &str = "io.proxydc";

pub const MANAGED: &str = "io.proxydc.managed";
pub const PROJECT_PATH: &str = "io.proxydc.project_path";
pub const TEMPLATE: &str = "io.proxydc.template";
pub const REMOTE_USER: &str = "io.proxydc.remote_user";
pub const SIDECAR_TYPE: &str = "io.proxydc.sidecar_type";

/// Cross-linking label provided by the compose layer itself, not by us.
pub const COMPOSE_PROJECT: &str = "com.docker.compose.project";

pub const SIDECAR_TYPE_PROXY: &str = "proxy";

//! proxydc - devcontainer provisioning with a transparent proxy sidecar

use clap::Parser;
use proxydc_cli::{Cli, Result};
use proxydc_config::GlobalConfig;
use proxydc_core::{Manager, ProxyArtifactStore, TemplateRenderer};
use proxydc_runtime::{CliRuntimeAdapter, RuntimeKind};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut config = GlobalConfig::load().unwrap_or_default();
    if let Some(runtime) = &cli.runtime {
        config.defaults.runtime = runtime.clone();
    }
    if let Some(dir) = &cli.template_dir {
        config.defaults.template_dir = Some(dir.clone());
    }

    let kind: RuntimeKind = config.defaults.runtime.parse().unwrap_or(RuntimeKind::Docker);
    let adapter = Box::new(CliRuntimeAdapter::new(kind));

    let template_dir = config
        .defaults
        .template_dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default().join("templates"));
    let renderer = TemplateRenderer::new(template_dir);

    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => GlobalConfig::data_dir()?,
    };
    let proxy_store = ProxyArtifactStore::new(data_dir);

    let manager = Manager::new(adapter, renderer, proxy_store, config);

    let cancel = CancellationToken::new();
    proxydc_cli::dispatch(&manager, cli.command, &cancel).await
}

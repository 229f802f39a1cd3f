//! Command dispatch: each subcommand calls exactly one Manager operation.
//! Grounded in teacher's `devc-cli::commands` module (`find_container` by
//! name-or-prefix, one function per subcommand).

use crate::cli::{CreateArgs, SessionCommand};
use crate::{CliError, Result};
use proxydc_core::model::Container;
use proxydc_core::{CreateOptions, Manager};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Resolve a container by exact ID, ID prefix, or name, the way teacher's
/// `find_container` tries ID first and falls back to name matching.
async fn find_container(manager: &Manager, name_or_id: &str) -> Result<Container> {
    let containers = manager.list().await;

    if let Some(c) = containers.iter().find(|c| c.id.0 == name_or_id) {
        return Ok(c.clone());
    }
    if let Some(c) = containers.iter().find(|c| c.name == name_or_id) {
        return Ok(c.clone());
    }

    let matches: Vec<_> = containers
        .iter()
        .filter(|c| c.id.0.starts_with(name_or_id) || c.name.starts_with(name_or_id))
        .collect();

    match matches.len() {
        0 => Err(CliError::Usage(format!("container '{name_or_id}' not found"))),
        1 => Ok(matches[0].clone()),
        _ => Err(CliError::Usage(format!(
            "ambiguous container reference '{name_or_id}', matches: {}",
            matches.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
        ))),
    }
}

pub async fn create(manager: &Manager, args: CreateArgs, cancel: &CancellationToken) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(64);
    tokio::spawn(async move { while rx.recv().await.is_some() {} });

    let container = manager
        .create(
            CreateOptions {
                project_path: args.project_path,
                template: args.template,
                name: args.name,
            },
            tx,
            cancel,
        )
        .await?;
    println!("created {} ({})", container.name, container.id.0);
    Ok(())
}

pub async fn start(manager: &Manager, name_or_id: &str, cancel: &CancellationToken) -> Result<()> {
    let container = find_container(manager, name_or_id).await?;
    manager.start(&container.id, cancel).await?;
    println!("started {}", container.name);
    Ok(())
}

pub async fn stop(manager: &Manager, name_or_id: &str, cancel: &CancellationToken) -> Result<()> {
    let container = find_container(manager, name_or_id).await?;
    manager.stop(&container.id, cancel).await?;
    println!("stopped {}", container.name);
    Ok(())
}

pub async fn destroy(manager: &Manager, name_or_id: &str, cancel: &CancellationToken) -> Result<()> {
    let container = find_container(manager, name_or_id).await?;
    manager.destroy(&container.id, cancel).await?;
    println!("destroyed {}", container.name);
    Ok(())
}

pub async fn list(manager: &Manager) -> Result<()> {
    let containers = manager.list().await;
    if containers.is_empty() {
        println!("no containers");
        return Ok(());
    }
    for c in containers {
        println!("{}\t{}\t{}\t{}", c.id.0, c.name, c.state, c.template);
    }
    Ok(())
}

pub async fn ps(manager: &Manager, name_or_id: &str, cancel: &CancellationToken) -> Result<()> {
    let container = find_container(manager, name_or_id).await?;
    let info = manager.get_container_isolation_info(&container.id, cancel).await?;
    println!("caps dropped:  {:?}", info.cap_drop);
    println!("caps added:    {:?}", info.cap_add);
    println!("memory limit:  {}", info.memory_limit);
    println!("cpu limit:     {}", info.cpu_limit);
    println!("pids limit:    {:?}", info.pids_limit);
    println!("custom network: {}", info.non_default_network);
    if let Some(name) = &info.network_name {
        println!("network:       {name}");
    }
    if let Some(ip) = &info.container_ip {
        println!("container ip:  {ip}");
    }
    if let Some(gw) = &info.gateway_ip {
        println!("gateway ip:    {gw}");
    }
    if let Some(addr) = &info.proxy_address {
        println!("proxy address: {addr}");
    }
    Ok(())
}

pub async fn sessions(manager: &Manager, cmd: SessionCommand, cancel: &CancellationToken) -> Result<()> {
    match cmd {
        SessionCommand::List { container } => {
            let container = find_container(manager, &container).await?;
            let sessions = manager.list_sessions(&container.id, cancel).await?;
            if sessions.is_empty() {
                println!("no sessions");
            }
            for s in sessions {
                println!("{}\t{} windows{}", s.name, s.windows, if s.attached { "\t(attached)" } else { "" });
            }
            Ok(())
        }
        SessionCommand::New { container, name } => {
            let container = find_container(manager, &container).await?;
            manager.create_session(&container.id, &name, cancel).await?;
            println!("started session {name}");
            Ok(())
        }
        SessionCommand::Kill { container, name } => {
            let container = find_container(manager, &container).await?;
            manager.kill_session(&container.id, &name, cancel).await?;
            println!("killed session {name}");
            Ok(())
        }
    }
}

/// One Manager call per subcommand (§6.1); `main` builds the Manager and
/// a fresh refresh precedes any lookup so the in-memory state reflects
/// the live runtime.
pub async fn dispatch(manager: &Manager, command: crate::cli::Commands, cancel: &CancellationToken) -> Result<()> {
    use crate::cli::Commands::*;

    manager.refresh(cancel).await?;

    match command {
        Create(args) => create(manager, args, cancel).await,
        Start { container } => start(manager, &container, cancel).await,
        Stop { container } => stop(manager, &container, cancel).await,
        Destroy { container } => destroy(manager, &container, cancel).await,
        List => list(manager).await,
        Ps { container } => ps(manager, &container, cancel).await,
        Sessions(cmd) => sessions(manager, cmd, cancel).await,
    }
}

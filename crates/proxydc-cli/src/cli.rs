//! `clap`-derive argument shape, grounded in teacher's `devc-cli::main::Cli`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "proxydc", version, about = "Devcontainer provisioning with a transparent proxy sidecar")]
pub struct Cli {
    /// Raise the default log level to debug.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Container runtime to drive ("docker" or "podman"); overrides config.
    #[arg(long, global = true)]
    pub runtime: Option<String>,

    /// Root directory containing named templates; overrides config.
    #[arg(long, global = true)]
    pub template_dir: Option<PathBuf>,

    /// Data directory for per-project proxy artifacts; overrides the platform default.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a template, provision credentials, and bring a project up.
    Create(CreateArgs),
    /// Start a stopped container.
    Start { container: String },
    /// Stop a running container.
    Stop { container: String },
    /// Tear a container and its proxy artifacts down.
    Destroy { container: String },
    /// List known containers.
    List,
    /// Show isolation details (caps, limits, network, proxy address) for one container.
    Ps { container: String },
    #[command(subcommand)]
    Sessions(SessionCommand),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Path to the project on the host.
    pub project_path: PathBuf,
    /// Name of the template under the template directory.
    pub template: String,
    /// Logical name for the new container.
    pub name: String,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// List multiplexer sessions inside a container.
    List { container: String },
    /// Start a new multiplexer session.
    New { container: String, name: String },
    /// Kill a multiplexer session.
    Kill { container: String, name: String },
}

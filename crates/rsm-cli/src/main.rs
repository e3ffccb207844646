//! rsm CLI
//!
//! Remote session multiplexer: every TCP connection to a port started with
//! `rsm start` gets its own tmux window with an interactive terminal.
//!
//! - `start`, `list`, `kill` are the user-facing commands
//! - `serve`, `window`, `interact` are run by tmux on rsm's behalf

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rsm::commands;
use rsm_core::config::resolve_config;
use rsm_protocol::SessionName;

#[derive(Parser)]
#[command(name = "rsm")]
#[command(author, version, about = "Remote session multiplexer")]
#[command(propagate_version = true)]
struct Cli {
    /// Work directory for sockets, metadata and the tmux server
    #[arg(short = 'd', long, global = true, env = "RSM_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start listening on a port inside tmux and attach to it
    /// Alias: tmux
    #[command(alias = "tmux")]
    Start {
        /// TCP port to listen on
        port: u16,
        /// Drive the controlling terminal in raw mode in session windows
        #[arg(short = 't', long = "tty")]
        raw_terminal: bool,
        /// Do not attach to the tmux session
        #[arg(short = 'D', long)]
        detach: bool,
    },

    /// List open ports and their connections
    List,

    /// Kill the session for a port, or every session
    Kill {
        /// Port to kill (all ports if omitted)
        port: Option<u16>,
    },

    /// Accept connections on a port (run by `start`)
    #[command(hide = true)]
    Serve {
        /// TCP port to listen on
        port: u16,
        /// tmux session to open connection windows in
        #[arg(value_parser = parse_session_name)]
        session: SessionName,
        /// Drive the controlling terminal in raw mode in session windows
        #[arg(short = 't', long = "tty")]
        raw_terminal: bool,
    },

    /// Run one connection's window (run by tmux)
    #[command(hide = true)]
    Window {
        /// Rendezvous channel socket of the connection
        socket: PathBuf,
        /// Line recorded in the connection's metadata file
        #[arg(long)]
        info: String,
        /// Drive the controlling terminal in raw mode
        #[arg(short = 't', long = "tty")]
        raw_terminal: bool,
    },

    /// Attach this terminal to a rendezvous channel
    #[command(hide = true)]
    Interact {
        /// Rendezvous channel socket
        socket: PathBuf,
        /// Drive the controlling terminal in raw mode
        #[arg(short = 't', long = "tty")]
        raw_terminal: bool,
    },
}

fn parse_session_name(value: &str) -> Result<SessionName, String> {
    SessionName::parse(value)
        .filter(|name| name.to_string() == value)
        .ok_or_else(|| format!("expected rsm/<port>, got {:?}", value))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The acceptor's window is its log
    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => default_level,
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = resolve_config(cli.config.as_deref(), cli.work_dir.as_deref())
        .context("Failed to load configuration")?;
    config.ensure_work_dir()?;
    tracing::debug!("Work directory {:?}", config.work_dir);

    match cli.command {
        Commands::Start {
            port,
            raw_terminal,
            detach,
        } => {
            commands::start_command(&config, cli.config.as_deref(), port, raw_terminal, detach)
                .await?;
        }

        Commands::List => {
            commands::list_command(&config).await?;
        }

        Commands::Kill { port } => {
            commands::kill_command(&config, port).await?;
        }

        Commands::Serve {
            port,
            session,
            raw_terminal,
        } => {
            commands::serve_command(config, port, session, raw_terminal).await?;
        }

        Commands::Window {
            socket,
            info,
            raw_terminal,
        } => {
            commands::window_command(&config, &socket, &info, raw_terminal).await?;
        }

        Commands::Interact {
            socket,
            raw_terminal,
        } => {
            commands::interact_command(&config, &socket, raw_terminal).await?;
        }
    }

    Ok(())
}

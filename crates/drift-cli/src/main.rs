//! Drift CLI - Command-line interface for Drift.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Drift - P2P repository for managing and sharing code
#[derive(Parser, Debug)]
#[command(name = "drift")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize a new Drift repository in the current directory
    Init,

    /// Add a file or folder to the index
    Add {
        /// File or folder to add
        path: String,
    },

    /// Show the status of the working tree
    Status,

    /// Commit the staged changes
    Commit {
        /// Commit message
        message: String,
    },

    /// Get or set configuration options
    Config {
        /// Configuration key (user.name, user.email, peer.id, peer.address)
        key: String,
        /// New value; omit to print the current one
        value: Option<String>,
    },

    /// List, add, or remove known peers
    Connect {
        #[command(subcommand)]
        command: Option<ConnectCommands>,
    },

    /// Publish and serve this repository
    Host {
        #[command(subcommand)]
        command: HostCommands,
    },

    /// Send every local object to a peer
    Sync {
        /// Peer address (host:port)
        address: String,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
enum ConnectCommands {
    /// Dial a peer and remember it
    Add {
        /// Peer address (host:port)
        address: String,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Forget a known peer
    Remove {
        /// Peer address (host:port)
        address: String,
    },
}

#[derive(Subcommand, Debug)]
enum HostCommands {
    /// Set the address this repository is published under
    Init {
        /// Repository address (dft@<repo-name>.drift)
        address: String,
    },

    /// Accept objects from peers until interrupted
    Serve {
        /// Listen address
        #[arg(short, long, default_value_t = default_listen())]
        listen: String,
    },
}

fn default_listen() -> String {
    format!("0.0.0.0:{}", drift_p2p::DEFAULT_PORT)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("drift={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli.command).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("failed to get current directory")?;

    match command {
        Commands::Init => commands::init(&cwd).await?,
        Commands::Add { path } => commands::add(&cwd, &path)?,
        Commands::Status => commands::status(&cwd)?,
        Commands::Commit { message } => commands::commit(&cwd, &message)?,
        Commands::Config { key, value } => commands::config(&cwd, &key, value.as_deref())?,
        Commands::Connect { command } => match command {
            None => commands::connect_list(&cwd)?,
            Some(ConnectCommands::Add { address, timeout }) => {
                commands::connect_add(&cwd, &address, timeout.map(Duration::from_secs)).await?;
            }
            Some(ConnectCommands::Remove { address }) => {
                commands::connect_remove(&cwd, &address)?;
            }
        },
        Commands::Host { command } => match command {
            HostCommands::Init { address } => commands::host_init(&cwd, &address)?,
            HostCommands::Serve { listen } => commands::host_serve(&cwd, &listen).await?,
        },
        Commands::Sync { address, timeout } => {
            commands::sync(&cwd, &address, timeout.map(Duration::from_secs)).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_connect_without_subcommand_lists() {
        let cli = Cli::try_parse_from(["drift", "connect"]).unwrap();
        assert!(matches!(cli.command, Commands::Connect { command: None }));
    }

    #[test]
    fn test_host_serve_default_listen() {
        let cli = Cli::try_parse_from(["drift", "host", "serve"]).unwrap();
        match cli.command {
            Commands::Host {
                command: HostCommands::Serve { listen },
            } => assert_eq!(listen, "0.0.0.0:9418"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_verbosity_is_global() {
        let cli = Cli::try_parse_from(["drift", "status", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_commit_requires_message() {
        assert!(Cli::try_parse_from(["drift", "commit"]).is_err());
    }
}

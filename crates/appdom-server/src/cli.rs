//! The `appdomd` command line.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ServerConfig;
use crate::controller::DomainController;

/// AppDom domain controller CLI.
#[derive(Parser)]
#[command(name = "appdomd")]
#[command(about = "AppDom domain controller", long_about = None)]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = "/etc/appdom/domain.toml", env = "APPDOM_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Run the domain controller.
    Serve,
    /// Manage domain model snapshots.
    Snapshot {
        #[command(subcommand)]
        cmd: SnapshotCmd,
    },
    /// Manage the deployment content repository.
    Content {
        #[command(subcommand)]
        cmd: ContentCmd,
    },
}

/// Snapshot subcommands.
#[derive(Subcommand, Clone)]
pub enum SnapshotCmd {
    /// List snapshot names.
    List,
    /// Take a snapshot of the current model.
    Take,
    /// Delete one snapshot by name.
    Delete {
        /// Snapshot file name.
        name: String,
    },
}

/// Content repository subcommands.
#[derive(Subcommand, Clone)]
pub enum ContentCmd {
    /// Add a file to the repository and print its hash.
    Add {
        /// Path of the file to store.
        path: PathBuf,
    },
    /// Check whether a hash is stored.
    Exists {
        /// SHA-1 hex hash.
        hash: String,
    },
}

impl Cli {
    fn load_config(&self) -> ServerConfig {
        if self.config.exists() {
            match ServerConfig::from_file(&self.config) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to parse config, using defaults");
                    ServerConfig::default()
                }
            }
        } else {
            tracing::warn!(
                "config file not found, using defaults: {}",
                self.config.display()
            );
            ServerConfig::default()
        }
    }

    /// Runs the selected command.
    pub async fn run(self) -> Result<()> {
        let config = self.load_config();
        match &self.command {
            Command::Serve => serve(config).await,
            Command::Snapshot { cmd } => snapshot(config, cmd),
            Command::Content { cmd } => content(config, cmd),
        }
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    tracing::info!(
        host = config.host_name.as_str(),
        primary = config.primary,
        bind = %config.bind_addr,
        "domain controller starting"
    );
    let controller = DomainController::new(config)?;
    tracing::info!(
        groups = controller.topology().group_names().len(),
        "domain controller ready"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    Ok(())
}

fn snapshot(config: ServerConfig, cmd: &SnapshotCmd) -> Result<()> {
    let controller = DomainController::new(config)?;
    match cmd {
        SnapshotCmd::List => {
            for name in controller.list_snapshots()? {
                println!("{name}");
            }
        }
        SnapshotCmd::Take => {
            let name = controller.take_snapshot()?;
            println!("{name}");
        }
        SnapshotCmd::Delete { name } => {
            if !controller.delete_snapshot(name)? {
                anyhow::bail!("snapshot {} not found", name);
            }
        }
    }
    Ok(())
}

fn content(config: ServerConfig, cmd: &ContentCmd) -> Result<()> {
    let controller = DomainController::new(config)?;
    match cmd {
        ContentCmd::Add { path } => {
            let bytes = std::fs::read(path)?;
            let hash = controller.content().add(&bytes)?;
            println!("{hash}");
        }
        ContentCmd::Exists { hash } => {
            if controller.content().exists(hash) {
                println!("present");
            } else {
                anyhow::bail!("content {} not found", hash);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_snapshot_subcommand() {
        let cli = Cli::try_parse_from(["appdomd", "snapshot", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Snapshot {
                cmd: SnapshotCmd::List
            }
        ));
    }

    #[test]
    fn parses_content_add_with_path() {
        let cli = Cli::try_parse_from(["appdomd", "content", "add", "/tmp/app.war"]).unwrap();
        match cli.command {
            Command::Content {
                cmd: ContentCmd::Add { path },
            } => assert_eq!(path, PathBuf::from("/tmp/app.war")),
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn config_flag_overrides_default() {
        let cli = Cli::try_parse_from(["appdomd", "--config", "/tmp/c.toml", "serve"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/tmp/c.toml"));
    }
}

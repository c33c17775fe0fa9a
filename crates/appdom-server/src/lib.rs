#![warn(missing_docs)]

//! AppDom domain controller daemon: controller facade, content repository, snapshots, CLI

pub mod cli;
pub mod config;
pub mod content;
pub mod controller;
pub mod snapshot;

pub use cli::Cli;
pub use config::ServerConfig;
pub use content::ContentRepository;
pub use controller::{ControllerError, DomainController};
pub use snapshot::SnapshotManager;

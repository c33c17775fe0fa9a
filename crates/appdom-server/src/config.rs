use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Domain controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Name of the host this process manages.
    pub host_name: String,
    /// True for the domain controller (primary) host.
    pub primary: bool,
    /// Management bind address.
    pub bind_addr: SocketAddr,
    /// Domain directory: audit log, content repository, snapshots.
    pub domain_dir: PathBuf,
    /// Whether the domain audit logger starts enabled.
    pub audit_enabled: bool,
    /// Optional syslog destination for audit records.
    pub audit_syslog_addr: Option<SocketAddr>,
    /// Domain resource types this host leaves out of its local model.
    pub ignored_resource_types: Vec<String>,
    /// Whether unused domain configuration is left out as well.
    pub ignore_unused_configuration: bool,
    /// Dispatch timeout for multi-process operations, in seconds.
    pub dispatch_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host_name: String::from("primary"),
            primary: true,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9990)),
            domain_dir: PathBuf::from("/var/lib/appdom/domain"),
            audit_enabled: false,
            audit_syslog_addr: None,
            ignored_resource_types: Vec::new(),
            ignore_unused_configuration: false,
            dispatch_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Loads the configuration from a TOML or JSON file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => {
                let config: ServerConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            "json" => {
                let config: ServerConfig = serde_json::from_str(&contents)?;
                Ok(config)
            }
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }

    /// Path of the domain audit log.
    pub fn audit_log_path(&self) -> PathBuf {
        self.domain_dir.join("data").join("audit-log.log")
    }

    /// Path of one server's audit log.
    pub fn server_audit_log_path(&self, host: &str, server: &str) -> PathBuf {
        self.domain_dir
            .join("servers")
            .join(host)
            .join(server)
            .join("data")
            .join("audit-log.log")
    }

    /// Root of the deployment content repository.
    pub fn content_dir(&self) -> PathBuf {
        self.domain_dir.join("content")
    }

    /// Directory holding model snapshots.
    pub fn snapshot_dir(&self) -> PathBuf {
        self.domain_dir.join("snapshot")
    }

    /// Path the committed domain model persists to.
    pub fn model_path(&self) -> PathBuf {
        self.domain_dir.join("domain-model.json")
    }
}

//! Shared test harness: an in-process primary + secondary domain.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use appdom_audit::{AuditLogger, FileHandler};
use appdom_exec::{Operation, Response};
use appdom_model::{DescriptionRegistry, PathAddress};
use appdom_router::{LocalProcess, ProcessClient, RouterError, ServerStatus};
use appdom_server::{DomainController, ServerConfig};
use appdom_sync::IgnoredResourcePolicy;

/// A process client that fails every operation, simulating a broken server.
pub struct FailingProcess;

#[async_trait]
impl ProcessClient for FailingProcess {
    async fn execute(&self, _op: Operation) -> Result<Response, RouterError> {
        Ok(Response::failed_msg("simulated server failure"))
    }
}

/// One running test domain: a primary controller, a secondary host, and a
/// server group `main` with servers on both hosts.
pub struct TestDomain {
    pub dir: tempfile::TempDir,
    pub controller: DomainController,
    pub primary_server: LocalProcess,
    pub secondary_server: LocalProcess,
}

impl TestDomain {
    /// Starts a controller with audit enabled and no hosts or servers.
    pub fn bare() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            domain_dir: dir.path().to_path_buf(),
            audit_enabled: true,
            ..Default::default()
        };
        let controller = DomainController::new(config).unwrap();
        let descriptions = Arc::new(DescriptionRegistry::with_core_types());
        Self {
            dir,
            controller,
            primary_server: LocalProcess::new(descriptions.clone()),
            secondary_server: LocalProcess::new(descriptions),
        }
    }

    /// Starts the full topology: secondary host, group `main`, running
    /// servers `primary/web-1` and `secondary/web-2`, and stopped server
    /// `secondary/web-stopped`. Every process gets a file audit logger.
    pub async fn start() -> Self {
        Self::start_with_policy(IgnoredResourcePolicy::new()).await
    }

    /// Like [`TestDomain::start`], with a visibility policy on the
    /// secondary host.
    pub async fn start_with_policy(policy: IgnoredResourcePolicy) -> Self {
        let domain = Self::bare();
        let descriptions = Arc::new(DescriptionRegistry::with_core_types());

        let secondary_host = LocalProcess::new(descriptions.clone());
        seed_host(&secondary_host, "secondary");
        domain
            .controller
            .register_host("secondary", Arc::new(secondary_host), policy)
            .await;

        domain.controller.register_group("main", "full");

        seed_server(&domain.primary_server, "primary", "web-1");
        domain
            .controller
            .register_server(
                "primary",
                "web-1",
                "main",
                ServerStatus::Started,
                Arc::new(domain.primary_server.clone()),
                Some(domain.server_logger("primary", "web-1")),
            )
            .await;

        seed_server(&domain.secondary_server, "secondary", "web-2");
        domain
            .controller
            .register_server(
                "secondary",
                "web-2",
                "main",
                ServerStatus::Started,
                Arc::new(domain.secondary_server.clone()),
                Some(domain.server_logger("secondary", "web-2")),
            )
            .await;

        let stopped = LocalProcess::new(descriptions);
        seed_server(&stopped, "secondary", "web-stopped");
        domain
            .controller
            .register_server(
                "secondary",
                "web-stopped",
                "main",
                ServerStatus::Stopped,
                Arc::new(stopped),
                None,
            )
            .await;

        domain
    }

    fn server_logger(&self, host: &str, server: &str) -> Arc<AuditLogger> {
        Arc::new(AuditLogger::enabled_with(vec![Arc::new(FileHandler::new(
            self.server_audit_path(host, server),
        ))]))
    }

    /// Path of the domain audit log.
    pub fn domain_audit_path(&self) -> PathBuf {
        self.dir.path().join("data").join("audit-log.log")
    }

    /// Path of one server's audit log.
    pub fn server_audit_path(&self, host: &str, server: &str) -> PathBuf {
        self.dir
            .path()
            .join("servers")
            .join(host)
            .join(server)
            .join("data")
            .join("audit-log.log")
    }
}

/// Seeds a host controller process with its own host resource.
pub fn seed_host(process: &LocalProcess, host: &str) {
    process.with_state_mut(|state| {
        state
            .tree
            .create(&host_addr(host), BTreeMap::new())
            .unwrap();
    });
}

/// Seeds a server process with its host and server resources.
pub fn seed_server(process: &LocalProcess, host: &str, server: &str) {
    process.with_state_mut(|state| {
        state
            .tree
            .create(&host_addr(host), BTreeMap::new())
            .unwrap();
        state
            .tree
            .create(&host_addr(host).child("server", server), BTreeMap::new())
            .unwrap();
    });
}

fn host_addr(host: &str) -> PathAddress {
    PathAddress::root().child("host", host)
}

/// Shorthand address parser.
pub fn addr(s: &str) -> PathAddress {
    PathAddress::parse(s).unwrap()
}

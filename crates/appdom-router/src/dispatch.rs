//! Concurrent dispatch of operations to domain processes.
//!
//! Targets are dispatched in parallel and joined before the aggregate
//! response is built. An expired wait surfaces as a local
//! [`RouterError::TimedOut`], never as a remote `failed` response.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use appdom_exec::standard::READ_RESOURCE_DESCRIPTION;
use appdom_exec::{Operation, Response};
use appdom_model::{DescriptionRegistry, PathAddress};

use crate::client::ProcessClient;
use crate::error::{Result, RouterError};
use crate::topology::{DomainTopology, ServerStatus};

/// Default dispatch timeout when the caller supplies none.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One dispatch destination.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RouteTarget {
    /// Server group context, when the dispatch belongs to a rollout.
    pub group: Option<String>,
    /// Host name.
    pub host: String,
    /// Server name; `None` addresses the host controller itself.
    pub server: Option<String>,
}

impl RouteTarget {
    /// Targets a host controller.
    pub fn host(host: &str) -> Self {
        Self {
            group: None,
            host: host.to_string(),
            server: None,
        }
    }

    /// Targets a managed server.
    pub fn server(host: &str, server: &str) -> Self {
        Self {
            group: None,
            host: host.to_string(),
            server: Some(server.to_string()),
        }
    }

    /// Attaches the server-group context.
    pub fn in_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    fn key(&self) -> String {
        match &self.server {
            Some(server) => format!("server:{}/{}", self.host, server),
            None => format!("host:{}", self.host),
        }
    }
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.server {
            Some(server) => write!(f, "{}/{}", self.host, server),
            None => write!(f, "{}", self.host),
        }
    }
}

/// Result of dispatching to one target.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// The destination.
    pub target: RouteTarget,
    /// The response, or the local routing failure.
    pub result: Result<Response>,
}

impl DispatchOutcome {
    /// Returns true when the target answered with a success outcome.
    pub fn is_success(&self) -> bool {
        matches!(&self.result, Ok(response) if response.is_success())
    }
}

/// Routes operations to registered process clients.
pub struct Router {
    topology: Arc<DomainTopology>,
    descriptions: Arc<DescriptionRegistry>,
    clients: RwLock<HashMap<String, Arc<dyn ProcessClient>>>,
    default_timeout: Duration,
}

impl Router {
    /// Creates a router over a topology.
    pub fn new(topology: Arc<DomainTopology>, descriptions: Arc<DescriptionRegistry>) -> Self {
        Self {
            topology,
            descriptions,
            clients: RwLock::new(HashMap::new()),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the default dispatch timeout.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Registers the client for a target.
    pub async fn register(&self, target: &RouteTarget, client: Arc<dyn ProcessClient>) {
        self.clients.write().await.insert(target.key(), client);
    }

    /// Removes the client for a target. Returns true if one was registered.
    pub async fn deregister(&self, target: &RouteTarget) -> bool {
        self.clients.write().await.remove(&target.key()).is_some()
    }

    /// Extracts the dispatch target from an operation address of the form
    /// `/host=X[/server=Y]/...`. Returns `None` for domain-level addresses,
    /// which the domain controller executes locally.
    pub fn route(op: &Operation) -> Option<RouteTarget> {
        let elements = op.address().elements();
        let first = elements.first()?;
        if first.key() != "host" || first.is_wildcard() {
            return None;
        }
        let host = first.value().to_string();
        match elements.get(1) {
            Some(second) if second.key() == "server" && !second.is_wildcard() => {
                Some(RouteTarget::server(&host, second.value()))
            }
            _ => Some(RouteTarget::host(&host)),
        }
    }

    fn timeout_for(&self, op: &Operation) -> Duration {
        op.headers()
            .blocking_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout)
    }

    /// Dispatches one operation to one target, respecting the caller
    /// timeout and the target's lifecycle state.
    pub async fn dispatch_one(&self, target: &RouteTarget, op: Operation) -> DispatchOutcome {
        let timeout = self.timeout_for(&op);
        let result = self.dispatch_inner(target, op, timeout).await;
        DispatchOutcome {
            target: target.clone(),
            result,
        }
    }

    async fn dispatch_inner(
        &self,
        target: &RouteTarget,
        op: Operation,
        timeout: Duration,
    ) -> Result<Response> {
        if let Some(server) = &target.server {
            let info = self
                .topology
                .server(&target.host, server)
                .ok_or_else(|| RouterError::TargetNotFound(target.to_string()))?;
            if info.status == ServerStatus::Stopped {
                // A stopped server still answers structural queries from
                // the static description registry.
                if op.name() == READ_RESOURCE_DESCRIPTION {
                    let description = self
                        .descriptions
                        .describe(op.address())
                        .map_err(|e| RouterError::Remote(e.to_string()))?;
                    return Ok(Response::success(description.to_value()));
                }
                return Err(RouterError::ServerStopped {
                    host: target.host.clone(),
                    server: server.clone(),
                });
            }
        }

        let client = {
            let clients = self.clients.read().await;
            clients
                .get(&target.key())
                .cloned()
                .ok_or_else(|| RouterError::TargetNotFound(target.to_string()))?
        };

        match tokio::time::timeout(timeout, client.execute(op)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(target = %target, timeout_ms = timeout.as_millis() as u64, "dispatch timed out");
                Err(RouterError::TimedOut {
                    target: target.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Dispatches one operation to many targets concurrently and joins all
    /// results, in target order.
    pub async fn dispatch(&self, targets: &[RouteTarget], op: &Operation) -> Vec<DispatchOutcome> {
        let pairs: Vec<(RouteTarget, Operation)> =
            targets.iter().map(|t| (t.clone(), op.clone())).collect();
        self.dispatch_pairs(&pairs).await
    }

    /// Dispatches one (target, operation) pair per destination concurrently
    /// and joins all results, in input order. Used when every target gets
    /// its own rebased operation.
    pub async fn dispatch_pairs(&self, pairs: &[(RouteTarget, Operation)]) -> Vec<DispatchOutcome> {
        let mut handles = Vec::with_capacity(pairs.len());
        {
            let clients = self.clients.read().await;
            for (target, op) in pairs {
                let target = target.clone();
                let op = op.clone();
                let timeout = self.timeout_for(&op);

                if let Some(server) = &target.server {
                    match self.topology.server(&target.host, server) {
                        None => {
                            let t = target.clone();
                            handles.push(tokio::spawn(async move {
                                DispatchOutcome {
                                    result: Err(RouterError::TargetNotFound(t.to_string())),
                                    target: t,
                                }
                            }));
                            continue;
                        }
                        Some(info) if info.status == ServerStatus::Stopped => {
                            let t = target.clone();
                            let result = if op.name() == READ_RESOURCE_DESCRIPTION {
                                self.descriptions
                                    .describe(op.address())
                                    .map(|d| Response::success(d.to_value()))
                                    .map_err(|e| RouterError::Remote(e.to_string()))
                            } else {
                                Err(RouterError::ServerStopped {
                                    host: t.host.clone(),
                                    server: server.clone(),
                                })
                            };
                            handles.push(tokio::spawn(async move {
                                DispatchOutcome { target: t, result }
                            }));
                            continue;
                        }
                        Some(_) => {}
                    }
                }

                match clients.get(&target.key()).cloned() {
                    Some(client) => {
                        handles.push(tokio::spawn(async move {
                            let result = match tokio::time::timeout(timeout, client.execute(op)).await
                            {
                                Ok(result) => result,
                                Err(_) => Err(RouterError::TimedOut {
                                    target: target.to_string(),
                                    timeout_ms: timeout.as_millis() as u64,
                                }),
                            };
                            DispatchOutcome { target, result }
                        }));
                    }
                    None => {
                        handles.push(tokio::spawn(async move {
                            DispatchOutcome {
                                result: Err(RouterError::TargetNotFound(target.to_string())),
                                target,
                            }
                        }));
                    }
                }
            }
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(outcome) = handle.await {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Builds the propagation targets and rebased operations for a
    /// domain-wide write: every host controller, plus every running server
    /// of the given groups, each with the address rewritten into its local
    /// context and the originating headers (domain UUID included) kept.
    pub fn propagation_plan(&self, op: &Operation, groups: &[String]) -> Vec<(RouteTarget, Operation)> {
        let mut plan = Vec::new();
        for host in self.topology.host_names() {
            let prefix = PathAddress::root().child("host", &host);
            plan.push((RouteTarget::host(&host), op.rebased(&prefix)));
        }
        for group in groups {
            for server in self.topology.running_servers_in_group(group) {
                let prefix = PathAddress::root()
                    .child("host", &server.host)
                    .child("server", &server.name);
                plan.push((
                    RouteTarget::server(&server.host, &server.name).in_group(group),
                    op.rebased(&prefix),
                ));
            }
        }
        plan
    }
}

//! The domain controller facade.
//!
//! `DomainController` owns the domain model process, the topology, the
//! router, the rollout coordinator, and the audit/notification sinks, and
//! exposes `execute` as the single client entry point: it stamps the domain
//! correlation UUID, routes host-addressed operations, applies domain-level
//! operations locally, rolls them out across server groups, and records the
//! outcome.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

use appdom_audit::{
    AccessMechanism, AuditError, AuditLogger, AuditRecord, FileHandler, Notification,
    NotificationRegistry, SyslogUdpHandler,
};
use appdom_exec::standard::{
    operation_is_read_only, ADD, READ_ATTRIBUTE, READ_RESOURCE, REMOVE, UNDEFINE_ATTRIBUTE,
    WRITE_ATTRIBUTE,
};
use appdom_exec::{
    ActiveOperationRegistry, CancelFlag, CancelOutcome, Operation, OperationId, Response,
};
use appdom_model::{DescriptionRegistry, ModelValue, PathAddress, ResourceTree};
use appdom_rollout::{PlanOutcome, RolloutCoordinator, RolloutPlan, ServerOutcome};
use appdom_router::{
    aggregate_group_responses, DispatchOutcome, DomainTopology, HostInfo, LocalProcess,
    ProcessClient, RouteTarget, Router, ServerGroupInfo, ServerInfo, ServerStatus,
};
use appdom_sync::{HostView, IgnoredResourcePolicy, SyncError};

use crate::config::ServerConfig;
use crate::content::{ContentError, ContentRepository};
use crate::snapshot::{SnapshotError, SnapshotManager};

/// Errors raised by controller management calls.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("unknown host {0}")]
    UnknownHost(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The domain controller: one per primary host.
pub struct DomainController {
    config: ServerConfig,
    descriptions: Arc<DescriptionRegistry>,
    domain: LocalProcess,
    topology: Arc<DomainTopology>,
    router: Router,
    active: ActiveOperationRegistry,
    audit: Arc<AuditLogger>,
    server_audit: Mutex<HashMap<(String, String), Arc<AuditLogger>>>,
    notifications: NotificationRegistry,
    views: Mutex<HashMap<String, HostView>>,
    content: ContentRepository,
    snapshots: SnapshotManager,
}

impl DomainController {
    /// Creates a controller from configuration. The domain audit logger is
    /// wired to the configured file (and syslog) handlers.
    pub fn new(config: ServerConfig) -> Result<Self, ControllerError> {
        let descriptions = Arc::new(DescriptionRegistry::with_core_types());
        let topology = Arc::new(DomainTopology::new());
        topology.upsert_host(HostInfo {
            name: config.host_name.clone(),
            primary: config.primary,
        });

        let audit = AuditLogger::new();
        audit.attach(Arc::new(FileHandler::new(config.audit_log_path())));
        if let Some(addr) = config.audit_syslog_addr {
            audit.attach(Arc::new(SyslogUdpHandler::new(addr, &config.host_name, "appdom")?));
        }
        audit.set_enabled(config.audit_enabled);

        let router = Router::new(topology.clone(), descriptions.clone())
            .with_default_timeout(std::time::Duration::from_secs(config.dispatch_timeout_secs));

        Ok(Self {
            descriptions: descriptions.clone(),
            domain: LocalProcess::new(descriptions),
            topology,
            router,
            active: ActiveOperationRegistry::new(),
            audit: Arc::new(audit),
            server_audit: Mutex::new(HashMap::new()),
            notifications: NotificationRegistry::new(),
            views: Mutex::new(HashMap::new()),
            content: ContentRepository::new(config.content_dir()),
            snapshots: SnapshotManager::new(config.snapshot_dir()),
            config,
        })
    }

    /// Returns the domain audit logger.
    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    /// Returns the notification registry.
    pub fn notifications(&self) -> &NotificationRegistry {
        &self.notifications
    }

    /// Returns the content repository.
    pub fn content(&self) -> &ContentRepository {
        &self.content
    }

    /// Returns the domain topology.
    pub fn topology(&self) -> &Arc<DomainTopology> {
        &self.topology
    }

    /// Renders the current domain model.
    pub fn domain_model(&self) -> ModelValue {
        self.domain.model_value()
    }

    fn domain_tree(&self) -> ResourceTree {
        self.domain.with_state_mut(|s| s.tree.clone())
    }

    /// Registers a secondary host controller and its visibility policy.
    pub async fn register_host(
        &self,
        name: &str,
        client: Arc<dyn ProcessClient>,
        policy: IgnoredResourcePolicy,
    ) {
        self.topology.upsert_host(HostInfo {
            name: name.to_string(),
            primary: false,
        });
        self.router.register(&RouteTarget::host(name), client).await;
        let tree = self.domain_tree();
        let groups = self.topology.groups_on_host(name);
        let view = HostView::new(name, policy, &tree, &groups);
        self.views.lock().unwrap().insert(name.to_string(), view);
        tracing::info!(host = name, "registered secondary host");
    }

    /// Registers a server group.
    pub fn register_group(&self, name: &str, profile: &str) {
        self.topology.upsert_group(ServerGroupInfo {
            name: name.to_string(),
            profile: profile.to_string(),
        });
    }

    /// Registers a managed server and, optionally, its audit logger.
    pub async fn register_server(
        &self,
        host: &str,
        server: &str,
        group: &str,
        status: ServerStatus,
        client: Arc<dyn ProcessClient>,
        audit: Option<Arc<AuditLogger>>,
    ) {
        self.topology.upsert_server(ServerInfo {
            name: server.to_string(),
            host: host.to_string(),
            group: group.to_string(),
            status,
        });
        self.router
            .register(&RouteTarget::server(host, server), client)
            .await;
        if let Some(logger) = audit {
            self.server_audit
                .lock()
                .unwrap()
                .insert((host.to_string(), server.to_string()), logger);
        }
        tracing::info!(host, server, group, "registered server");
    }

    /// Updates a server's lifecycle state.
    pub fn set_server_status(&self, host: &str, server: &str, status: ServerStatus) -> bool {
        self.topology.set_server_status(host, server, status)
    }

    /// Executes one client operation end to end.
    pub async fn execute(&self, op: Operation) -> Response {
        let op = if op.headers().domain_uuid.is_some() {
            op
        } else {
            op.with_domain_uuid(&Uuid::new_v4().to_string())
        };
        let (id, flag) = self.active.register(&op);
        let response = self.execute_routed(&op, &flag).await;
        self.active.complete(id);
        response
    }

    /// Reads back the original request of an in-flight operation.
    pub fn read_active_operation(&self, id: OperationId) -> Option<Operation> {
        self.active.get(id)
    }

    /// Cancels an in-flight operation. `AlreadyCompleted` is a valid
    /// outcome of a cancel race.
    pub fn cancel_operation(&self, id: OperationId) -> CancelOutcome {
        self.active.cancel(id)
    }

    async fn execute_routed(&self, op: &Operation, flag: &CancelFlag) -> Response {
        if let Some(target) = Router::route(op) {
            let outcome = self.router.dispatch_one(&target, op.clone()).await;
            return match outcome.result {
                Ok(response) => response,
                Err(err) => Response::failed_msg(err.to_string()),
            };
        }
        self.execute_domain(op, flag).await
    }

    async fn execute_domain(&self, op: &Operation, flag: &CancelFlag) -> Response {
        if operation_is_read_only(op) {
            return self.domain.execute_sync_cancellable(op, flag);
        }

        let pre_image = self.pre_image(op);
        let mut response = self.domain.execute_sync_cancellable(op, flag);
        if !response.is_success() {
            return response;
        }

        let groups = self.affected_groups(op);
        if op.is_composite() || groups.is_empty() {
            // Nothing to roll out; commit locally.
            if let Err(err) = self.post_commit(op, pre_image.as_ref()) {
                tracing::error!(error = %err, "post-commit failure on coordinator");
                return Response::failed_msg(format!("post-commit failure: {err}"));
            }
            return response;
        }

        let plan = match op.headers().rollout_plan.as_ref() {
            Some(value) => match RolloutPlan::from_value(value) {
                Ok(plan) => plan,
                Err(err) => {
                    self.undo_local(op, pre_image.as_ref());
                    return Response::failed_msg(err.to_string());
                }
            },
            None => RolloutPlan::implicit(&groups),
        };

        let rollout = self.roll_out(op, &plan).await;
        let aggregate = aggregate_group_responses(&rollout.dispatches);

        if rollout.outcome.success {
            self.push_to_hosts(op).await;
            if let Err(err) = self.post_commit(op, pre_image.as_ref()) {
                // A post-commit failure on the coordinating process reports
                // a bare failure without the aggregated structure.
                tracing::error!(error = %err, "post-commit failure on coordinator");
                return Response::failed_msg(format!("post-commit failure: {err}"));
            }
            response.result = aggregate;
            response
        } else {
            self.roll_back_groups(op, &rollout).await;
            self.undo_local(op, pre_image.as_ref());
            let mut failed = Response::failed(failure_description(&rollout.outcome));
            failed.result = aggregate;
            failed.response_headers.rolled_back = true;
            failed
        }
    }

    fn affected_groups(&self, op: &Operation) -> Vec<String> {
        match op.address().elements().first() {
            Some(e) if e.key() == "server-group" && !e.is_wildcard() => vec![e.value().to_string()],
            _ => self.topology.group_names(),
        }
    }

    async fn roll_out(&self, op: &Operation, plan: &RolloutPlan) -> RolloutRun {
        let mut results: BTreeMap<String, Vec<ServerOutcome>> = BTreeMap::new();
        let mut run = RolloutRun::default();
        let domain_uuid = op.headers().domain_uuid.clone();

        for (set_index, set) in plan.in_series.iter().enumerate() {
            let mut pairs: Vec<(RouteTarget, Operation)> = Vec::new();
            for group in set.groups() {
                results.entry(group.name.clone()).or_default();
                for server in self.topology.running_servers_in_group(&group.name) {
                    let prefix = PathAddress::root()
                        .child("host", &server.host)
                        .child("server", &server.name);
                    pairs.push((
                        RouteTarget::server(&server.host, &server.name).in_group(&group.name),
                        op.rebased(&prefix),
                    ));
                }
            }

            // Capture per-server pre-images so intolerable sets can be
            // compensated.
            if let Some(pre_read) = pre_read_for(op) {
                let reads: Vec<(RouteTarget, Operation)> = pairs
                    .iter()
                    .map(|(target, rebased)| {
                        (
                            target.clone(),
                            pre_read.clone().with_address(rebased.address().clone()),
                        )
                    })
                    .collect();
                for outcome in self.router.dispatch_pairs(&reads).await {
                    if let Ok(response) = outcome.result {
                        if response.is_success() {
                            run.pre_images.insert(outcome.target, response.result);
                        }
                    }
                }
            }

            let outcomes = self.router.dispatch_pairs(&pairs).await;
            for (outcome, (_, rebased)) in outcomes.into_iter().zip(pairs.into_iter()) {
                let group = outcome.target.group.clone().unwrap_or_default();
                let server = outcome.target.server.clone().unwrap_or_default();
                let success = outcome.is_success();
                results
                    .entry(group)
                    .or_default()
                    .push(ServerOutcome::new(&outcome.target.host, &server, success));
                if success {
                    self.audit_server(&outcome.target, &rebased, domain_uuid.as_deref());
                    run.applied.push((outcome.target.clone(), rebased));
                }
                run.dispatches.push(outcome);
            }

            let tolerated = appdom_rollout::judge_set(set, &results);
            if !RolloutCoordinator::continue_after(plan, set_index, tolerated) {
                break;
            }
        }

        run.outcome = RolloutCoordinator::evaluate(plan, &results);
        run
    }

    async fn roll_back_groups(&self, op: &Operation, run: &RolloutRun) {
        let rollback: Vec<String> = run.outcome.rollback_groups();
        for (target, rebased) in run.applied.iter().rev() {
            let in_scope = target
                .group
                .as_ref()
                .map(|g| rollback.contains(g))
                .unwrap_or(false);
            if !in_scope {
                continue;
            }
            match compensation_for(rebased, run.pre_images.get(target)) {
                Some(compensation) => {
                    let outcome = self.router.dispatch_one(target, compensation).await;
                    if !outcome.is_success() {
                        tracing::error!(target = %target, "server rollback failed");
                    }
                }
                None => {
                    tracing::warn!(
                        target = %target,
                        operation = op.name(),
                        "no compensation available, server keeps the change"
                    );
                }
            }
        }
    }

    async fn push_to_hosts(&self, op: &Operation) {
        for (target, rebased) in self.router.propagation_plan(op, &[]) {
            if target.host == self.config.host_name {
                continue;
            }
            let outcome = self.router.dispatch_one(&target, rebased).await;
            if let Err(err) = &outcome.result {
                // Post-commit failures on routed targets never flip the
                // overall outcome.
                tracing::warn!(host = outcome.target.host.as_str(), error = %err, "host push failed after commit");
            }
        }
    }

    fn pre_image(&self, op: &Operation) -> Option<ModelValue> {
        let read = pre_read_for(op)?.with_address(op.address().clone());
        let response = self.domain.execute_sync(&read);
        response.is_success().then_some(response.result)
    }

    fn undo_local(&self, op: &Operation, pre_image: Option<&ModelValue>) {
        match compensation_for(op, pre_image) {
            Some(compensation) => {
                let response = self.domain.execute_sync(&compensation);
                if !response.is_success() {
                    tracing::error!(operation = op.name(), "local rollback failed");
                }
            }
            None => {
                tracing::warn!(operation = op.name(), "no local compensation available");
            }
        }
    }

    fn post_commit(&self, op: &Operation, pre_image: Option<&ModelValue>) -> Result<(), ControllerError> {
        self.persist_model()?;

        let tree = self.domain_tree();
        {
            let mut views = self.views.lock().unwrap();
            for view in views.values_mut() {
                view.apply(&tree);
            }
        }

        // The domain log entry's own operation headers carry no domain
        // UUID; the record field does.
        let mut headers = op.headers().clone();
        let domain_uuid = headers.domain_uuid.take();
        let logged = op.clone().with_headers(headers);
        let mut record = AuditRecord::new(AccessMechanism::Native, true, &[logged]);
        if let Some(uuid) = &domain_uuid {
            record = record.with_domain_uuid(uuid);
        }
        self.audit.record(&record);

        self.publish_notification(op, pre_image);
        Ok(())
    }

    fn persist_model(&self) -> Result<(), ControllerError> {
        let path = self.config.model_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.domain_model().to_json())
            .expect("model JSON always serializes");
        std::fs::write(path, json)?;
        Ok(())
    }

    fn publish_notification(&self, op: &Operation, pre_image: Option<&ModelValue>) {
        let notification = match op.name() {
            ADD => Some(Notification::ResourceAdded {
                address: op.address().clone(),
            }),
            REMOVE => Some(Notification::ResourceRemoved {
                address: op.address().clone(),
            }),
            WRITE_ATTRIBUTE => op.param("name").and_then(ModelValue::as_str).map(|name| {
                Notification::AttributeValueWritten {
                    address: op.address().clone(),
                    name: name.to_string(),
                    old_value: pre_image.cloned().unwrap_or(ModelValue::Undefined),
                    new_value: op.param("value").cloned().unwrap_or(ModelValue::Undefined),
                }
            }),
            _ => None,
        };
        if let Some(notification) = notification {
            self.notifications.publish(&notification);
        }
    }

    fn audit_server(&self, target: &RouteTarget, op: &Operation, domain_uuid: Option<&str>) {
        let Some(server) = &target.server else {
            return;
        };
        let logger = {
            let loggers = self.server_audit.lock().unwrap();
            loggers.get(&(target.host.clone(), server.clone())).cloned()
        };
        if let Some(logger) = logger {
            let mut record = AuditRecord::new(AccessMechanism::Native, true, &[op.clone()]);
            if let Some(uuid) = domain_uuid {
                record = record.with_domain_uuid(uuid);
            }
            logger.record(&record);
        }
    }

    /// Stages ignored resource types on a secondary host. Registering
    /// `host` fails before any state change.
    pub fn set_host_ignored_types(&self, host: &str, types: &[String]) -> Result<(), ControllerError> {
        let mut views = self.views.lock().unwrap();
        let view = views
            .get_mut(host)
            .ok_or_else(|| ControllerError::UnknownHost(host.to_string()))?;
        let mut policy = view.policy().clone();
        for t in types {
            policy.add_ignored(t)?;
        }
        view.update_policy(policy);
        Ok(())
    }

    /// Stages the ignore-unused-configuration switch on a secondary host.
    pub fn set_host_ignore_unused(&self, host: &str, ignore: bool) -> Result<(), ControllerError> {
        let mut views = self.views.lock().unwrap();
        let view = views
            .get_mut(host)
            .ok_or_else(|| ControllerError::UnknownHost(host.to_string()))?;
        let mut policy = view.policy().clone();
        policy.set_ignore_unused(ignore);
        view.update_policy(policy);
        Ok(())
    }

    /// Reloads a secondary host's view, promoting any staged policy.
    pub fn reload_host(&self, host: &str) -> Result<(), ControllerError> {
        let tree = self.domain_tree();
        let groups = self.topology.groups_on_host(host);
        let mut views = self.views.lock().unwrap();
        let view = views
            .get_mut(host)
            .ok_or_else(|| ControllerError::UnknownHost(host.to_string()))?;
        view.reload(&tree, &groups);
        Ok(())
    }

    /// Returns whether a secondary host awaits a reload.
    pub fn host_reload_required(&self, host: &str) -> Result<bool, ControllerError> {
        let views = self.views.lock().unwrap();
        views
            .get(host)
            .map(HostView::reload_required)
            .ok_or_else(|| ControllerError::UnknownHost(host.to_string()))
    }

    /// Lists child names visible through a secondary host's view.
    pub fn host_children_names(
        &self,
        host: &str,
        address: &PathAddress,
        child_type: &str,
    ) -> Result<Vec<String>, ControllerError> {
        let views = self.views.lock().unwrap();
        views
            .get(host)
            .map(|v| v.children_names(address, child_type))
            .ok_or_else(|| ControllerError::UnknownHost(host.to_string()))
    }

    /// Reloads a server group, clearing capability reload-required state
    /// for its scope.
    pub fn reload_server_group(&self, _group: &str) {
        self.domain
            .with_state_mut(|s| s.capabilities.reload(&PathAddress::root()));
    }

    /// Takes a snapshot of the domain model.
    pub fn take_snapshot(&self) -> Result<String, ControllerError> {
        Ok(self.snapshots.take(&self.domain_model())?)
    }

    /// Lists snapshot names.
    pub fn list_snapshots(&self) -> Result<Vec<String>, ControllerError> {
        Ok(self.snapshots.list()?)
    }

    /// Deletes one snapshot.
    pub fn delete_snapshot(&self, name: &str) -> Result<bool, ControllerError> {
        Ok(self.snapshots.delete(name)?)
    }
}

#[derive(Default)]
struct RolloutRun {
    outcome: PlanOutcome,
    dispatches: Vec<DispatchOutcome>,
    applied: Vec<(RouteTarget, Operation)>,
    pre_images: HashMap<RouteTarget, ModelValue>,
}

fn failure_description(outcome: &PlanOutcome) -> ModelValue {
    let mut failures = ModelValue::object();
    for group in &outcome.groups {
        if group.failed_count == 0 {
            continue;
        }
        let mut list = ModelValue::list();
        for server in group.servers.iter().filter(|s| !s.success) {
            list.push(format!("{}/{}", server.host, server.server).into())
                .unwrap();
        }
        failures.set(&group.group, list).unwrap();
    }
    let mut out = ModelValue::object();
    out.set("rolled-back", true.into()).unwrap();
    out.set("server-failures", failures).unwrap();
    out
}

/// The read operation capturing the state a compensation needs, when the
/// operation has one.
fn pre_read_for(op: &Operation) -> Option<Operation> {
    match op.name() {
        REMOVE => Some(Operation::new(READ_RESOURCE, op.address().clone())),
        WRITE_ATTRIBUTE | UNDEFINE_ATTRIBUTE => {
            let name = op.param("name")?.as_str()?;
            Some(
                Operation::new(READ_ATTRIBUTE, op.address().clone())
                    .with_param("name", name.into()),
            )
        }
        _ => None,
    }
}

/// The compensating operation undoing `op`, given the pre-image captured
/// before it ran. `None` for operations the controller cannot invert.
fn compensation_for(op: &Operation, pre_image: Option<&ModelValue>) -> Option<Operation> {
    match op.name() {
        ADD => Some(Operation::new(REMOVE, op.address().clone())),
        REMOVE => {
            let attrs = pre_image?.as_object()?;
            let mut add = Operation::new(ADD, op.address().clone());
            for (name, value) in attrs {
                add = add.with_param(name, value.clone());
            }
            Some(add)
        }
        WRITE_ATTRIBUTE => {
            let name = op.param("name")?.as_str()?;
            match pre_image {
                Some(prior) if prior.is_defined() => Some(
                    Operation::new(WRITE_ATTRIBUTE, op.address().clone())
                        .with_param("name", name.into())
                        .with_param("value", prior.clone()),
                ),
                _ => Some(
                    Operation::new(UNDEFINE_ATTRIBUTE, op.address().clone())
                        .with_param("name", name.into()),
                ),
            }
        }
        UNDEFINE_ATTRIBUTE => {
            let prior = pre_image?;
            prior.is_defined().then(|| {
                Operation::new(WRITE_ATTRIBUTE, op.address().clone())
                    .with_param("name", op.param("name").and_then(ModelValue::as_str).unwrap_or_default().into())
                    .with_param("value", prior.clone())
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appdom_audit::FileHandler;

    fn controller() -> (tempfile::TempDir, DomainController) {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            domain_dir: dir.path().to_path_buf(),
            audit_enabled: true,
            ..Default::default()
        };
        let controller = DomainController::new(config).unwrap();
        (dir, controller)
    }

    fn addr(s: &str) -> PathAddress {
        PathAddress::parse(s).unwrap()
    }

    #[tokio::test]
    async fn domain_add_applies_and_audits() {
        let (dir, controller) = controller();
        let response = controller
            .execute(Operation::new(ADD, addr("/system-property=color")).with_param("value", "blue".into()))
            .await;
        assert!(response.is_success());
        assert!(controller
            .domain_model()
            .get_path(&["system-property", "color"])
            .is_some());

        // The committed model persisted.
        assert!(dir.path().join("domain-model.json").exists());

        // Exactly one domain audit record, its record-level UUID set, its
        // operation headers free of one.
        let records = FileHandler::scan(&dir.path().join("data").join("audit-log.log")).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].domain_uuid.is_some());
        assert!(records[0].operations[0]
            .get_path(&["operation-headers", "domain-uuid"])
            .is_none());
    }

    #[tokio::test]
    async fn read_only_operations_are_not_audited() {
        let (dir, controller) = controller();
        controller
            .execute(Operation::new(ADD, addr("/system-property=a")))
            .await;
        controller
            .execute(Operation::new(READ_RESOURCE, addr("/system-property=a")))
            .await;

        let records = FileHandler::scan(&dir.path().join("data").join("audit-log.log")).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn failed_operations_are_not_audited() {
        let (dir, controller) = controller();
        let response = controller
            .execute(Operation::new(REMOVE, addr("/system-property=missing")))
            .await;
        assert!(!response.is_success());
        assert!(FileHandler::scan(&dir.path().join("data").join("audit-log.log"))
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn notifications_published_on_add_and_write() {
        use appdom_audit::NotificationRegistrar;
        use std::sync::Mutex as StdMutex;

        struct Sink(StdMutex<Vec<String>>);
        impl NotificationRegistrar for Sink {
            fn notify(&self, n: &Notification) {
                self.0.lock().unwrap().push(n.kind().to_string());
            }
        }

        let (_dir, controller) = controller();
        let sink = Arc::new(Sink(StdMutex::new(Vec::new())));
        let id = controller.notifications().register(sink.clone());

        controller
            .execute(Operation::new(ADD, addr("/system-property=a")))
            .await;
        controller
            .execute(
                Operation::new(WRITE_ATTRIBUTE, addr("/system-property=a"))
                    .with_param("name", "value".into())
                    .with_param("value", "v".into()),
            )
            .await;

        assert_eq!(
            *sink.0.lock().unwrap(),
            vec!["resource-added".to_string(), "attribute-value-written".to_string()]
        );

        controller.notifications().unregister(id);
        controller
            .execute(Operation::new(ADD, addr("/system-property=b")))
            .await;
        assert_eq!(sink.0.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn snapshots_round_trip_through_controller() {
        let (_dir, controller) = controller();
        controller
            .execute(Operation::new(ADD, addr("/system-property=a")).with_param("value", "1".into()))
            .await;

        let name = controller.take_snapshot().unwrap();
        assert_eq!(controller.list_snapshots().unwrap(), vec![name.clone()]);
        assert!(controller.delete_snapshot(&name).unwrap());
        assert!(controller.list_snapshots().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_host_management_calls_fail() {
        let (_dir, controller) = controller();
        assert!(matches!(
            controller.set_host_ignored_types("ghost", &["profile".to_string()]),
            Err(ControllerError::UnknownHost(_))
        ));
        assert!(matches!(
            controller.reload_host("ghost"),
            Err(ControllerError::UnknownHost(_))
        ));
    }

    #[tokio::test]
    async fn ignoring_host_type_is_rejected() {
        let (_dir, controller) = controller();
        controller
            .register_host(
                "secondary",
                Arc::new(LocalProcess::new(Arc::new(DescriptionRegistry::with_core_types()))),
                IgnoredResourcePolicy::new(),
            )
            .await;
        let err = controller
            .set_host_ignored_types("secondary", &["host".to_string()])
            .unwrap_err();
        assert!(matches!(err, ControllerError::Sync(SyncError::CannotIgnoreHost)));
        // Nothing was staged.
        assert!(!controller.host_reload_required("secondary").unwrap());
    }

    #[test]
    fn compensation_covers_standard_mutations() {
        let op = Operation::new(ADD, addr("/system-property=a"));
        assert_eq!(compensation_for(&op, None).unwrap().name(), REMOVE);

        let mut pre = ModelValue::object();
        pre.set("value", "old".into()).unwrap();
        let op = Operation::new(REMOVE, addr("/system-property=a"));
        let comp = compensation_for(&op, Some(&pre)).unwrap();
        assert_eq!(comp.name(), ADD);
        assert_eq!(comp.param("value"), Some(&ModelValue::Str("old".into())));

        let op = Operation::new(WRITE_ATTRIBUTE, addr("/system-property=a"))
            .with_param("name", "value".into())
            .with_param("value", "new".into());
        let comp = compensation_for(&op, Some(&ModelValue::Str("old".into()))).unwrap();
        assert_eq!(comp.name(), WRITE_ATTRIBUTE);
        let comp = compensation_for(&op, Some(&ModelValue::Undefined)).unwrap();
        assert_eq!(comp.name(), UNDEFINE_ATTRIBUTE);

        let op = Operation::new("custom-op", addr("/system-property=a"));
        assert!(compensation_for(&op, None).is_none());
    }

    #[test]
    fn pre_read_matches_operation_kind() {
        let op = Operation::new(REMOVE, addr("/system-property=a"));
        assert_eq!(pre_read_for(&op).unwrap().name(), READ_RESOURCE);

        let op = Operation::new(WRITE_ATTRIBUTE, addr("/system-property=a"))
            .with_param("name", "value".into());
        assert_eq!(pre_read_for(&op).unwrap().name(), READ_ATTRIBUTE);

        let op = Operation::new(ADD, addr("/system-property=a"));
        assert!(pre_read_for(&op).is_none());
    }

    #[tokio::test]
    async fn cancel_completed_operation_reports_already_completed() {
        let (_dir, controller) = controller();
        controller
            .execute(Operation::new(ADD, addr("/system-property=a")))
            .await;
        // The operation is already complete; its ID was 1.
        assert_eq!(
            controller.cancel_operation(appdom_exec::OperationId::new(1)),
            CancelOutcome::AlreadyCompleted
        );
        assert!(controller
            .read_active_operation(appdom_exec::OperationId::new(1))
            .is_some());
    }
}

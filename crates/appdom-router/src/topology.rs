//! The domain topology: hosts, server groups, and managed servers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Lifecycle state of a managed server process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    /// Running and accepting operations.
    Started,
    /// Registered but not running. Answers structural queries only.
    Stopped,
}

/// One host controller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HostInfo {
    /// Host name.
    pub name: String,
    /// True for the domain controller host.
    pub primary: bool,
}

/// One server group.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerGroupInfo {
    /// Group name.
    pub name: String,
    /// Profile the group runs.
    pub profile: String,
}

/// One managed server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Host the server runs on.
    pub host: String,
    /// Server group membership.
    pub group: String,
    /// Process state.
    pub status: ServerStatus,
}

/// Registry of the domain's hosts, groups, and servers.
#[derive(Debug, Default)]
pub struct DomainTopology {
    hosts: Mutex<HashMap<String, HostInfo>>,
    groups: Mutex<HashMap<String, ServerGroupInfo>>,
    servers: Mutex<HashMap<(String, String), ServerInfo>>,
}

impl DomainTopology {
    /// Creates an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a host.
    pub fn upsert_host(&self, host: HostInfo) {
        self.hosts.lock().unwrap().insert(host.name.clone(), host);
    }

    /// Registers or replaces a server group.
    pub fn upsert_group(&self, group: ServerGroupInfo) {
        self.groups.lock().unwrap().insert(group.name.clone(), group);
    }

    /// Registers or replaces a server.
    pub fn upsert_server(&self, server: ServerInfo) {
        self.servers
            .lock()
            .unwrap()
            .insert((server.host.clone(), server.name.clone()), server);
    }

    /// Updates a server's status. Returns false when the server is unknown.
    pub fn set_server_status(&self, host: &str, server: &str, status: ServerStatus) -> bool {
        let mut servers = self.servers.lock().unwrap();
        match servers.get_mut(&(host.to_string(), server.to_string())) {
            Some(info) => {
                info.status = status;
                true
            }
            None => false,
        }
    }

    /// Returns one host.
    pub fn host(&self, name: &str) -> Option<HostInfo> {
        self.hosts.lock().unwrap().get(name).cloned()
    }

    /// Returns one server.
    pub fn server(&self, host: &str, server: &str) -> Option<ServerInfo> {
        self.servers
            .lock()
            .unwrap()
            .get(&(host.to_string(), server.to_string()))
            .cloned()
    }

    /// Returns every host name, sorted.
    pub fn host_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.hosts.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns every group name, sorted.
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the servers of one group, sorted by host then name.
    pub fn servers_in_group(&self, group: &str) -> Vec<ServerInfo> {
        let mut servers: Vec<ServerInfo> = self
            .servers
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.group == group)
            .cloned()
            .collect();
        servers.sort_by(|a, b| (a.host.clone(), a.name.clone()).cmp(&(b.host.clone(), b.name.clone())));
        servers
    }

    /// Returns the running servers of one group.
    pub fn running_servers_in_group(&self, group: &str) -> Vec<ServerInfo> {
        self.servers_in_group(group)
            .into_iter()
            .filter(|s| s.status == ServerStatus::Started)
            .collect()
    }

    /// Returns the groups with at least one server on `host`, sorted.
    pub fn groups_on_host(&self, host: &str) -> Vec<String> {
        let servers = self.servers.lock().unwrap();
        let mut groups: Vec<String> = servers
            .values()
            .filter(|s| s.host == host)
            .map(|s| s.group.clone())
            .collect();
        groups.sort();
        groups.dedup();
        groups
    }

    /// Returns the name of the primary host, when registered.
    pub fn primary_host(&self) -> Option<String> {
        self.hosts
            .lock()
            .unwrap()
            .values()
            .find(|h| h.primary)
            .map(|h| h.name.clone())
    }
}

//! Computing which domain resources a host actually references.
//!
//! A resource is "used" by a host when one of the server groups assigned to
//! the host's servers reaches it: the group itself, its profile (following
//! profile `includes` transitively), its socket binding group, and the
//! deployments assigned to the group.

use std::collections::BTreeSet;

use appdom_model::{ModelValue, PathAddress, ResourceTree};

/// The domain resources reachable from a set of server groups.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferencedSet {
    /// Referenced server group names.
    pub server_groups: BTreeSet<String>,
    /// Referenced profile names, including transitive includes.
    pub profiles: BTreeSet<String>,
    /// Referenced socket binding group names.
    pub socket_binding_groups: BTreeSet<String>,
    /// Referenced deployment names.
    pub deployments: BTreeSet<String>,
}

impl ReferencedSet {
    /// Returns true when a resource of `resource_type` named `name` is
    /// referenced. Types outside the tracked set count as referenced.
    pub fn contains(&self, resource_type: &str, name: &str) -> bool {
        match resource_type {
            "server-group" => self.server_groups.contains(name),
            "profile" => self.profiles.contains(name),
            "socket-binding-group" => self.socket_binding_groups.contains(name),
            "deployment" => self.deployments.contains(name),
            _ => true,
        }
    }
}

/// Resolves the referenced set from the domain model.
pub struct UnusedConfigResolver;

impl UnusedConfigResolver {
    /// Computes the resources reachable from `groups` in `domain`.
    pub fn referenced(domain: &ResourceTree, groups: &[String]) -> ReferencedSet {
        let mut set = ReferencedSet::default();
        for group in groups {
            let group_addr = PathAddress::root().child("server-group", group);
            let Ok(resource) = domain.read(&group_addr) else {
                continue;
            };
            set.server_groups.insert(group.clone());

            if let Some(profile) = resource.attribute("profile").as_str() {
                Self::collect_profile(domain, profile, &mut set.profiles);
            }
            if let Some(sbg) = resource.attribute("socket-binding-group").as_str() {
                set.socket_binding_groups.insert(sbg.to_string());
            }
            for deployment in resource.child_names("deployment") {
                set.deployments.insert(deployment);
            }
        }
        set
    }

    /// Walks profile includes depth-first. Cycles terminate because each
    /// profile is visited once.
    fn collect_profile(domain: &ResourceTree, profile: &str, out: &mut BTreeSet<String>) {
        if !out.insert(profile.to_string()) {
            return;
        }
        let addr = PathAddress::root().child("profile", profile);
        let Ok(resource) = domain.read(&addr) else {
            return;
        };
        if let Some(includes) = resource.attribute("includes").as_list() {
            for included in includes.iter().filter_map(ModelValue::as_str) {
                Self::collect_profile(domain, included, out);
            }
        }
    }
}

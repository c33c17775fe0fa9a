//! The synchronized model slice a secondary host operates on.
//!
//! The primary pushes domain changes; the view filters them through the
//! host's visibility policy. Policy changes, and changes to which resources
//! are unused, are staged: the view keeps serving its previous slice and
//! reports `reload_required` until [`HostView::reload`] runs.

use appdom_model::{PathAddress, Resource, ResourceTree};

use crate::ignore::IgnoredResourcePolicy;
use crate::unused::{ReferencedSet, UnusedConfigResolver};

/// One secondary host's filtered view of the domain model.
#[derive(Clone, Debug)]
pub struct HostView {
    host: String,
    effective: IgnoredResourcePolicy,
    pending: Option<IgnoredResourcePolicy>,
    assigned_groups: Vec<String>,
    referenced: ReferencedSet,
    slice: ResourceTree,
    reload_required: bool,
}

impl HostView {
    /// Creates a view for `host` and synchronizes it from `domain`.
    /// `assigned_groups` are the server groups of the servers this host
    /// manages.
    pub fn new(
        host: &str,
        policy: IgnoredResourcePolicy,
        domain: &ResourceTree,
        assigned_groups: &[String],
    ) -> Self {
        let referenced = UnusedConfigResolver::referenced(domain, assigned_groups);
        let slice = Self::filter(domain, host, &policy, &referenced);
        Self {
            host: host.to_string(),
            effective: policy,
            pending: None,
            assigned_groups: assigned_groups.to_vec(),
            referenced,
            slice,
            reload_required: false,
        }
    }

    /// Returns the host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the synchronized model slice.
    pub fn model(&self) -> &ResourceTree {
        &self.slice
    }

    /// Returns true while a policy or usage change awaits a reload.
    pub fn reload_required(&self) -> bool {
        self.reload_required
    }

    /// Returns the effective policy.
    pub fn policy(&self) -> &IgnoredResourcePolicy {
        &self.effective
    }

    /// Stages a new policy. The change only takes effect at reload; until
    /// then the view keeps serving its previous slice.
    pub fn update_policy(&mut self, policy: IgnoredResourcePolicy) {
        if policy == self.effective && self.pending.is_none() {
            return;
        }
        tracing::info!(host = self.host.as_str(), "visibility policy staged, reload required");
        self.pending = Some(policy);
        self.reload_required = true;
    }

    /// Applies a pushed domain change. While reload-required the previous
    /// slice is retained. With ignore-unused-configuration on, a change to
    /// the referenced set also flips the view to reload-required instead of
    /// being applied.
    pub fn apply(&mut self, domain: &ResourceTree) {
        if self.reload_required {
            return;
        }
        if self.effective.ignore_unused() {
            let referenced = UnusedConfigResolver::referenced(domain, &self.assigned_groups);
            if referenced != self.referenced {
                tracing::info!(host = self.host.as_str(), "referenced set changed, reload required");
                self.reload_required = true;
                return;
            }
        }
        self.slice = Self::filter(domain, &self.host, &self.effective, &self.referenced);
    }

    /// Promotes any staged policy, recomputes the slice, and clears the
    /// reload flag.
    pub fn reload(&mut self, domain: &ResourceTree, assigned_groups: &[String]) {
        if let Some(policy) = self.pending.take() {
            self.effective = policy;
        }
        self.assigned_groups = assigned_groups.to_vec();
        self.referenced = UnusedConfigResolver::referenced(domain, &self.assigned_groups);
        self.slice = Self::filter(domain, &self.host, &self.effective, &self.referenced);
        self.reload_required = false;
        tracing::info!(host = self.host.as_str(), "host view reloaded");
    }

    /// Lists child names visible at `address`, empty when the address is
    /// filtered out.
    pub fn children_names(&self, address: &PathAddress, child_type: &str) -> Vec<String> {
        self.slice
            .children_names(address, child_type)
            .unwrap_or_default()
    }

    fn filter(
        domain: &ResourceTree,
        host: &str,
        policy: &IgnoredResourcePolicy,
        referenced: &ReferencedSet,
    ) -> ResourceTree {
        let mut slice = ResourceTree::new();
        let root = match domain.read(&PathAddress::root()) {
            Ok(root) => root,
            Err(_) => return slice,
        };
        for (name, value) in root.attributes() {
            let _ = slice.write_attribute(&PathAddress::root(), name, value.clone());
        }
        for child_type in root.child_types() {
            if policy.is_ignored(&child_type) {
                continue;
            }
            for name in root.child_names(&child_type) {
                if child_type == "host" && name != host {
                    continue;
                }
                if policy.ignore_unused() && !referenced.contains(&child_type, &name) {
                    continue;
                }
                if let Some(child) = root.get_child(&child_type, &name) {
                    let at = PathAddress::root().child(&child_type, &name);
                    Self::copy_subtree(child, &mut slice, &at);
                }
            }
        }
        slice
    }

    fn copy_subtree(resource: &Resource, dst: &mut ResourceTree, at: &PathAddress) {
        let attributes = resource.attributes().clone();
        if dst.create(at, attributes).is_err() {
            return;
        }
        for child_type in resource.child_types() {
            for name in resource.child_names(&child_type) {
                if let Some(child) = resource.get_child(&child_type, &name) {
                    let next = at.child(&child_type, &name);
                    Self::copy_subtree(child, dst, &next);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appdom_model::ModelValue;
    use std::collections::BTreeMap;

    fn addr(s: &str) -> PathAddress {
        PathAddress::parse(s).unwrap()
    }

    fn attrs(pairs: &[(&str, ModelValue)]) -> BTreeMap<String, ModelValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn domain() -> ResourceTree {
        let mut tree = ResourceTree::new();
        tree.create(&addr("/profile=full"), BTreeMap::new()).unwrap();
        tree.create(&addr("/profile=ignored"), BTreeMap::new()).unwrap();
        tree.create(
            &addr("/socket-binding-group=standard"),
            BTreeMap::new(),
        )
        .unwrap();
        tree.create(
            &addr("/server-group=main"),
            attrs(&[
                ("profile", "full".into()),
                ("socket-binding-group", "standard".into()),
            ]),
        )
        .unwrap();
        tree.create(
            &addr("/server-group=unused-group"),
            attrs(&[("profile", "ignored".into())]),
        )
        .unwrap();
        tree.create(&addr("/host=primary"), BTreeMap::new()).unwrap();
        tree.create(&addr("/host=secondary"), BTreeMap::new()).unwrap();
        tree.create(
            &addr("/host=secondary/server=web-1"),
            attrs(&[("group", "main".into())]),
        )
        .unwrap();
        tree
    }

    fn ignore_profile_policy() -> IgnoredResourcePolicy {
        let mut policy = IgnoredResourcePolicy::new();
        policy.add_ignored("profile").unwrap();
        policy
    }

    #[test]
    fn ignored_type_is_invisible() {
        let view = HostView::new("secondary", ignore_profile_policy(), &domain(), &["main".into()]);
        assert!(view.children_names(&PathAddress::root(), "profile").is_empty());
        assert_eq!(
            view.children_names(&PathAddress::root(), "server-group"),
            vec!["main".to_string(), "unused-group".to_string()]
        );
    }

    #[test]
    fn other_hosts_are_invisible() {
        let view = HostView::new("secondary", IgnoredResourcePolicy::new(), &domain(), &[]);
        assert_eq!(
            view.children_names(&PathAddress::root(), "host"),
            vec!["secondary".to_string()]
        );
    }

    #[test]
    fn ignored_profile_stays_invisible_after_primary_adds_beneath_it() {
        let mut tree = domain();
        let mut view =
            HostView::new("secondary", ignore_profile_policy(), &tree, &["main".into()]);

        tree.create(&addr("/profile=ignored/subsystem=web"), BTreeMap::new())
            .unwrap();
        view.apply(&tree);

        assert!(view.children_names(&PathAddress::root(), "profile").is_empty());
        assert!(view
            .children_names(&addr("/profile=ignored"), "subsystem")
            .is_empty());
    }

    #[test]
    fn non_ignored_changes_flow_through_apply() {
        let mut tree = domain();
        let mut view =
            HostView::new("secondary", ignore_profile_policy(), &tree, &["main".into()]);

        tree.create(&addr("/system-property=color"), attrs(&[("value", "blue".into())]))
            .unwrap();
        view.apply(&tree);

        assert_eq!(
            view.children_names(&PathAddress::root(), "system-property"),
            vec!["color".to_string()]
        );
    }

    #[test]
    fn ignore_unused_hides_unreferenced_config() {
        let mut policy = IgnoredResourcePolicy::new();
        policy.set_ignore_unused(true);
        let view = HostView::new("secondary", policy, &domain(), &["main".into()]);

        assert_eq!(
            view.children_names(&PathAddress::root(), "server-group"),
            vec!["main".to_string()]
        );
        assert_eq!(
            view.children_names(&PathAddress::root(), "profile"),
            vec!["full".to_string()]
        );
        assert_eq!(
            view.children_names(&PathAddress::root(), "socket-binding-group"),
            vec!["standard".to_string()]
        );
    }

    #[test]
    fn policy_change_requires_reload() {
        let tree = domain();
        let mut view = HostView::new("secondary", IgnoredResourcePolicy::new(), &tree, &[]);
        assert!(!view.reload_required());

        view.update_policy(ignore_profile_policy());
        assert!(view.reload_required());

        // Until reload the old slice keeps serving.
        assert_eq!(
            view.children_names(&PathAddress::root(), "profile"),
            vec!["full".to_string(), "ignored".to_string()]
        );

        view.reload(&tree, &[]);
        assert!(!view.reload_required());
        assert!(view.children_names(&PathAddress::root(), "profile").is_empty());
    }

    #[test]
    fn usage_change_requires_reload_when_ignoring_unused() {
        let mut tree = domain();
        let mut policy = IgnoredResourcePolicy::new();
        policy.set_ignore_unused(true);
        let mut view = HostView::new("secondary", policy, &tree, &["main".into()]);

        // Repoint the group at a different profile: the referenced set
        // changes, so the view parks itself until reload.
        tree.write_attribute(&addr("/server-group=main"), "profile", "ignored".into())
            .unwrap();
        view.apply(&tree);
        assert!(view.reload_required());
        assert_eq!(
            view.children_names(&PathAddress::root(), "profile"),
            vec!["full".to_string()]
        );

        view.reload(&tree, &["main".to_string()]);
        assert!(!view.reload_required());
        assert_eq!(
            view.children_names(&PathAddress::root(), "profile"),
            vec!["ignored".to_string()]
        );
    }

    #[test]
    fn pushes_while_reload_required_are_deferred() {
        let mut tree = domain();
        let mut view = HostView::new("secondary", IgnoredResourcePolicy::new(), &tree, &[]);
        view.update_policy(ignore_profile_policy());

        tree.create(&addr("/system-property=late"), BTreeMap::new()).unwrap();
        view.apply(&tree);
        assert!(view
            .children_names(&PathAddress::root(), "system-property")
            .is_empty());

        view.reload(&tree, &[]);
        assert_eq!(
            view.children_names(&PathAddress::root(), "system-property"),
            vec!["late".to_string()]
        );
    }
}

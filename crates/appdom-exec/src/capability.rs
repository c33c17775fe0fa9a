//! Capability tracking between resources.
//!
//! A resource may provide named capabilities (`provides` parameter at add
//! time) and require capabilities other resources provide (`requires`).
//! Removing a provider that still has dependents does not fail the remove;
//! it marks the capability reload-required, and every operation touching a
//! dependent keeps reporting `operation-requires-reload` until the affected
//! scope is reloaded.

use std::collections::{BTreeMap, BTreeSet};

use appdom_model::PathAddress;

/// Result of registering a dependent against a capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DependentOutcome {
    /// The capability is present and effective.
    Satisfied,
    /// The capability is present but its provider was cycled; the dependent
    /// only picks it up after a reload.
    RequiresReload,
}

#[derive(Clone, Debug, Default)]
struct CapabilityEntry {
    provider: Option<PathAddress>,
    dependents: BTreeSet<PathAddress>,
    reload_required: bool,
}

/// Per-process capability registry.
#[derive(Clone, Debug, Default)]
pub struct CapabilityRegistry {
    entries: BTreeMap<String, CapabilityEntry>,
}

impl CapabilityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `address` as the provider of `name`. Re-registering a
    /// capability that was removed while dependents existed leaves it
    /// reload-required until [`CapabilityRegistry::reload`].
    pub fn register_provider(&mut self, name: &str, address: &PathAddress) {
        let entry = self.entries.entry(name.to_string()).or_default();
        entry.provider = Some(address.clone());
        if entry.reload_required {
            tracing::debug!(capability = name, "provider re-registered while reload pending");
        }
    }

    /// Removes the provider of `name`. When dependents still reference the
    /// capability it becomes reload-required rather than rejecting the
    /// removal.
    pub fn remove_provider(&mut self, name: &str) {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.provider = None;
            if !entry.dependents.is_empty() {
                entry.reload_required = true;
                tracing::debug!(
                    capability = name,
                    dependents = entry.dependents.len(),
                    "capability removed with live dependents, reload required"
                );
            }
        }
    }

    /// Returns true if `name` currently has a provider.
    pub fn is_provided(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .is_some_and(|e| e.provider.is_some())
    }

    /// Returns true if `name` is in the reload-required state.
    pub fn is_reload_required(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|e| e.reload_required)
    }

    /// Registers `address` as a dependent of `name`. Returns `None` when the
    /// capability has no provider at all.
    pub fn add_dependent(&mut self, name: &str, address: &PathAddress) -> Option<DependentOutcome> {
        let entry = self.entries.get_mut(name)?;
        entry.provider.as_ref()?;
        entry.dependents.insert(address.clone());
        Some(if entry.reload_required {
            DependentOutcome::RequiresReload
        } else {
            DependentOutcome::Satisfied
        })
    }

    /// Drops every dependent registration for `address` (resource removed).
    pub fn remove_dependent(&mut self, address: &PathAddress) {
        for entry in self.entries.values_mut() {
            entry.dependents.remove(address);
        }
    }

    /// Returns the capability names provided by the resource at `address`.
    pub fn provided_at(&self, address: &PathAddress) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, e)| e.provider.as_ref() == Some(address))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Clears the reload-required state for every capability whose provider
    /// lives under `scope`. An empty scope clears everything.
    pub fn reload(&mut self, scope: &PathAddress) {
        for (name, entry) in &mut self.entries {
            if !entry.reload_required {
                continue;
            }
            let in_scope = scope.is_empty()
                || entry
                    .provider
                    .as_ref()
                    .map(|p| p.starts_with(scope))
                    .unwrap_or(true);
            if in_scope {
                entry.reload_required = false;
                tracing::debug!(capability = name.as_str(), "reload cleared capability");
            }
        }
    }

    /// Returns the capability names currently reload-required, sorted.
    pub fn reload_required_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, e)| e.reload_required)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> PathAddress {
        PathAddress::parse(s).unwrap()
    }

    #[test]
    fn register_and_query_provider() {
        let mut reg = CapabilityRegistry::new();
        reg.register_provider("net.interface.public", &addr("/host=primary/interface=public"));
        assert!(reg.is_provided("net.interface.public"));
        assert!(!reg.is_provided("net.interface.private"));
    }

    #[test]
    fn dependent_on_missing_capability_is_none() {
        let mut reg = CapabilityRegistry::new();
        assert!(reg
            .add_dependent("absent", &addr("/socket-binding-group=std"))
            .is_none());
    }

    #[test]
    fn dependent_on_live_capability_is_satisfied() {
        let mut reg = CapabilityRegistry::new();
        reg.register_provider("cap", &addr("/interface=public"));
        assert_eq!(
            reg.add_dependent("cap", &addr("/socket-binding-group=std")),
            Some(DependentOutcome::Satisfied)
        );
    }

    #[test]
    fn remove_without_dependents_is_clean() {
        let mut reg = CapabilityRegistry::new();
        reg.register_provider("cap", &addr("/interface=public"));
        reg.remove_provider("cap");
        assert!(!reg.is_provided("cap"));
        assert!(!reg.is_reload_required("cap"));
    }

    #[test]
    fn remove_with_dependents_marks_reload_required() {
        let mut reg = CapabilityRegistry::new();
        reg.register_provider("cap", &addr("/interface=public"));
        reg.add_dependent("cap", &addr("/socket-binding-group=std")).unwrap();

        reg.remove_provider("cap");
        assert!(reg.is_reload_required("cap"));

        // Re-adding the provider does not clear the pending reload.
        reg.register_provider("cap", &addr("/interface=public"));
        assert!(reg.is_provided("cap"));
        assert!(reg.is_reload_required("cap"));
        assert_eq!(
            reg.add_dependent("cap", &addr("/socket-binding-group=other")),
            Some(DependentOutcome::RequiresReload)
        );
    }

    #[test]
    fn reload_clears_in_scope_only() {
        let mut reg = CapabilityRegistry::new();
        reg.register_provider("cap-a", &addr("/host=primary/interface=public"));
        reg.register_provider("cap-b", &addr("/host=secondary/interface=public"));
        reg.add_dependent("cap-a", &addr("/socket-binding-group=a")).unwrap();
        reg.add_dependent("cap-b", &addr("/socket-binding-group=b")).unwrap();
        reg.remove_provider("cap-a");
        reg.remove_provider("cap-b");
        reg.register_provider("cap-a", &addr("/host=primary/interface=public"));
        reg.register_provider("cap-b", &addr("/host=secondary/interface=public"));

        reg.reload(&addr("/host=primary"));
        assert!(!reg.is_reload_required("cap-a"));
        assert!(reg.is_reload_required("cap-b"));

        reg.reload(&PathAddress::root());
        assert!(!reg.is_reload_required("cap-b"));
    }

    #[test]
    fn provided_at_lists_capabilities() {
        let mut reg = CapabilityRegistry::new();
        reg.register_provider("cap-a", &addr("/interface=public"));
        reg.register_provider("cap-b", &addr("/interface=public"));
        reg.register_provider("cap-c", &addr("/interface=private"));
        assert_eq!(
            reg.provided_at(&addr("/interface=public")),
            vec!["cap-a".to_string(), "cap-b".to_string()]
        );
    }

    #[test]
    fn remove_dependent_unlinks_everywhere() {
        let mut reg = CapabilityRegistry::new();
        reg.register_provider("cap", &addr("/interface=public"));
        reg.add_dependent("cap", &addr("/socket-binding-group=std")).unwrap();
        reg.remove_dependent(&addr("/socket-binding-group=std"));

        reg.remove_provider("cap");
        // No dependents left, so no reload required.
        assert!(!reg.is_reload_required("cap"));
    }
}

//! Management notifications, independent of the audit log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use appdom_model::{ModelValue, PathAddress};

/// Identifier of a registered notification listener.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RegistrarId(u64);

/// A structured management notification.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// A resource was added.
    ResourceAdded {
        /// Address of the new resource.
        address: PathAddress,
    },
    /// An attribute value was written.
    AttributeValueWritten {
        /// Address of the resource.
        address: PathAddress,
        /// Attribute name.
        name: String,
        /// Value before the write.
        old_value: ModelValue,
        /// Value after the write.
        new_value: ModelValue,
    },
    /// A resource was removed.
    ResourceRemoved {
        /// Address of the removed resource.
        address: PathAddress,
    },
}

impl Notification {
    /// Returns the notification type string.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::ResourceAdded { .. } => "resource-added",
            Notification::AttributeValueWritten { .. } => "attribute-value-written",
            Notification::ResourceRemoved { .. } => "resource-removed",
        }
    }

    /// Returns the address the notification concerns.
    pub fn address(&self) -> &PathAddress {
        match self {
            Notification::ResourceAdded { address }
            | Notification::ResourceRemoved { address }
            | Notification::AttributeValueWritten { address, .. } => address,
        }
    }
}

/// A pluggable notification listener.
pub trait NotificationRegistrar: Send + Sync {
    /// Receives one notification.
    fn notify(&self, notification: &Notification);
}

/// Registry fanning notifications out to registered listeners. Delivery to
/// a listener stops as soon as it is unregistered.
pub struct NotificationRegistry {
    registrars: RwLock<HashMap<u64, Arc<dyn NotificationRegistrar>>>,
    next_id: AtomicU64,
}

impl NotificationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            registrars: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a listener and returns its ID.
    pub fn register(&self, registrar: Arc<dyn NotificationRegistrar>) -> RegistrarId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.registrars.write().unwrap().insert(id, registrar);
        RegistrarId(id)
    }

    /// Unregisters a listener. Returns true if it was registered.
    pub fn unregister(&self, id: RegistrarId) -> bool {
        self.registrars.write().unwrap().remove(&id.0).is_some()
    }

    /// Delivers a notification to every registered listener. Returns the
    /// number of listeners reached.
    pub fn publish(&self, notification: &Notification) -> usize {
        let registrars = self.registrars.read().unwrap();
        for registrar in registrars.values() {
            registrar.notify(notification);
        }
        registrars.len()
    }

    /// Returns the number of registered listeners.
    pub fn registrar_count(&self) -> usize {
        self.registrars.read().unwrap().len()
    }
}

impl Default for NotificationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

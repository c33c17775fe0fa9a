#![warn(missing_docs)]

//! AppDom audit subsystem: audit logging (file, UDP syslog) and management notifications

pub mod file;
pub mod logger;
pub mod notification;
pub mod record;
pub mod syslog;

pub use file::{FileHandler, RECORD_PREFIX};
pub use logger::{AuditError, AuditHandler, AuditLogger};
pub use notification::{Notification, NotificationRegistrar, NotificationRegistry, RegistrarId};
pub use record::{AccessMechanism, AuditRecord};
pub use syslog::SyslogUdpHandler;

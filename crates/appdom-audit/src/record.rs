//! The audit record written for every mutating operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use appdom_exec::Operation;
use appdom_model::ModelValue;

/// How the request reached the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMechanism {
    /// Native management protocol.
    Native,
    /// HTTP management endpoint.
    Http,
    /// JMX bridge.
    Jmx,
}

impl AccessMechanism {
    /// Returns the wire string of this mechanism.
    pub fn as_str(self) -> &'static str {
        match self {
            AccessMechanism::Native => "NATIVE",
            AccessMechanism::Http => "HTTP",
            AccessMechanism::Jmx => "JMX",
        }
    }
}

/// One audit record: a unit of work on one process.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Record type; always `core` for management operations.
    pub record_type: String,
    /// True when the unit of work only read.
    pub read_only: bool,
    /// True during process boot.
    pub booting: bool,
    /// Audit format version.
    pub version: String,
    /// Domain-wide correlation UUID shared by every operation the same
    /// client request produced. Absent on the originating domain-log entry.
    pub domain_uuid: Option<String>,
    /// Request transport.
    pub access: AccessMechanism,
    /// Remote peer, when known.
    pub remote_address: Option<String>,
    /// Record timestamp.
    pub timestamp: DateTime<Utc>,
    /// Authenticated user, when known.
    pub user: Option<String>,
    /// Whether the unit of work succeeded.
    pub success: bool,
    /// Wire form of each executed operation, authentication material
    /// stripped.
    pub operations: Vec<ModelValue>,
}

impl AuditRecord {
    /// Creates a record for a unit of work.
    pub fn new(access: AccessMechanism, success: bool, operations: &[Operation]) -> Self {
        Self {
            record_type: "core".to_string(),
            read_only: false,
            booting: false,
            version: "1.0".to_string(),
            domain_uuid: None,
            access,
            remote_address: None,
            timestamp: Utc::now(),
            user: None,
            success,
            operations: operations.iter().map(|op| sanitize(op.to_value())).collect(),
        }
    }

    /// Sets the domain correlation UUID.
    pub fn with_domain_uuid(mut self, uuid: &str) -> Self {
        self.domain_uuid = Some(uuid.to_string());
        self
    }

    /// Sets the authenticated user.
    pub fn with_user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }

    /// Sets the remote peer address.
    pub fn with_remote_address(mut self, addr: &str) -> Self {
        self.remote_address = Some(addr.to_string());
        self
    }

    /// Marks the record read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Renders the JSON block written by every handler.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.record_type,
            "r/o": self.read_only,
            "booting": self.booting,
            "version": self.version,
            "domainUUID": self.domain_uuid,
            "access": self.access.as_str(),
            "remote-address": self.remote_address,
            "user": self.user,
            "success": self.success,
            "ops": self.operations.iter().map(ModelValue::to_json).collect::<Vec<_>>(),
        })
    }

    /// Parses a record back from its JSON block. Timestamps live in the
    /// framing, not the block, so the parsed record carries the parse time.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let access = match value.get("access")?.as_str()? {
            "NATIVE" => AccessMechanism::Native,
            "HTTP" => AccessMechanism::Http,
            "JMX" => AccessMechanism::Jmx,
            _ => return None,
        };
        Some(Self {
            record_type: value.get("type")?.as_str()?.to_string(),
            read_only: value.get("r/o")?.as_bool()?,
            booting: value.get("booting")?.as_bool()?,
            version: value.get("version")?.as_str()?.to_string(),
            domain_uuid: value
                .get("domainUUID")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            access,
            remote_address: value
                .get("remote-address")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            timestamp: Utc::now(),
            user: value.get("user").and_then(|v| v.as_str()).map(str::to_string),
            success: value.get("success")?.as_bool()?,
            operations: value
                .get("ops")?
                .as_array()?
                .iter()
                .map(ModelValue::from_json)
                .collect(),
        })
    }
}

/// Strips authentication material from an operation's wire form before it
/// is recorded.
fn sanitize(mut op: ModelValue) -> ModelValue {
    if let ModelValue::Object(map) = &mut op {
        if let Some(ModelValue::Object(headers)) = map.get_mut("operation-headers") {
            headers.remove("authentication");
            headers.remove("authorization");
            headers.remove("credential");
            if headers.is_empty() {
                map.remove("operation-headers");
            }
        }
    }
    op
}

#[cfg(test)]
mod tests {
    use super::*;
    use appdom_exec::OperationHeaders;
    use appdom_model::PathAddress;

    fn sample_op() -> Operation {
        Operation::new("add", PathAddress::parse("/system-property=talker").unwrap())
            .with_param("value", "chatty".into())
    }

    #[test]
    fn record_json_round_trip() {
        let record = AuditRecord::new(AccessMechanism::Native, true, &[sample_op()])
            .with_domain_uuid("u-123")
            .with_user("admin")
            .with_remote_address("10.0.0.9");
        let json = record.to_json();
        let back = AuditRecord::from_json(&json).unwrap();

        assert_eq!(back.domain_uuid.as_deref(), Some("u-123"));
        assert_eq!(back.user.as_deref(), Some("admin"));
        assert_eq!(back.remote_address.as_deref(), Some("10.0.0.9"));
        assert!(back.success);
        assert_eq!(back.operations.len(), 1);
        assert_eq!(
            back.operations[0].get("operation"),
            Some(&ModelValue::Str("add".into()))
        );
    }

    #[test]
    fn domain_uuid_absent_renders_null() {
        let record = AuditRecord::new(AccessMechanism::Native, true, &[sample_op()]);
        assert!(record.to_json().get("domainUUID").unwrap().is_null());
        let back = AuditRecord::from_json(&record.to_json()).unwrap();
        assert!(back.domain_uuid.is_none());
    }

    #[test]
    fn operation_domain_uuid_survives_sanitize() {
        let op = sample_op().with_domain_uuid("u-77");
        let record = AuditRecord::new(AccessMechanism::Native, true, &[op]);
        assert_eq!(
            record.operations[0].get_path(&["operation-headers", "domain-uuid"]),
            Some(&ModelValue::Str("u-77".into()))
        );
    }

    #[test]
    fn authentication_headers_are_stripped() {
        let mut headers_value = ModelValue::object();
        headers_value.set("authentication", "secret-token".into()).unwrap();
        headers_value.set("domain-uuid", "u-1".into()).unwrap();
        // Assemble a wire form with an authentication header by hand.
        let mut wire = sample_op().to_value();
        wire.set("operation-headers", headers_value).unwrap();
        let sanitized = sanitize(wire);

        assert!(sanitized
            .get_path(&["operation-headers", "authentication"])
            .is_none());
        assert_eq!(
            sanitized.get_path(&["operation-headers", "domain-uuid"]),
            Some(&ModelValue::Str("u-1".into()))
        );
    }

    #[test]
    fn all_auth_material_stripped_leaves_no_headers() {
        let mut headers_value = ModelValue::object();
        headers_value.set("credential", "pw".into()).unwrap();
        let mut wire = sample_op().to_value();
        wire.set("operation-headers", headers_value).unwrap();
        let sanitized = sanitize(wire);
        assert!(sanitized.get("operation-headers").is_none());
    }

    #[test]
    fn read_only_flag() {
        let record = AuditRecord::new(AccessMechanism::Http, true, &[]).read_only();
        assert!(record.read_only);
        assert_eq!(record.to_json().get("r/o").unwrap(), &serde_json::json!(true));
    }

    #[test]
    fn headers_default_omitted_from_ops() {
        let op = Operation::new("add", PathAddress::root()).with_headers(OperationHeaders::default());
        let record = AuditRecord::new(AccessMechanism::Native, true, &[op]);
        assert!(record.operations[0].get("operation-headers").is_none());
    }

    #[test]
    fn access_mechanism_strings() {
        assert_eq!(AccessMechanism::Native.as_str(), "NATIVE");
        assert_eq!(AccessMechanism::Http.as_str(), "HTTP");
        assert_eq!(AccessMechanism::Jmx.as_str(), "JMX");
    }
}

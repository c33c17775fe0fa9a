//! Management operations: the request half of the wire contract.
//!
//! An operation is a name, an address, and named parameters, optionally
//! carrying operation headers (rollout plan, domain correlation UUID,
//! caller timeout). Operations are immutable value objects; propagation
//! rewrites produce new operations via [`Operation::rebased`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use appdom_model::{ModelValue, PathAddress};

use crate::error::{ExecError, Result};

/// Operation name of the composite operation.
pub const COMPOSITE: &str = "composite";
/// Parameter carrying the ordered step list of a composite.
pub const STEPS: &str = "steps";

/// Headers attached to an operation by the caller or the controller.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationHeaders {
    /// Rollout plan in its wire form, when the caller supplied one.
    pub rollout_plan: Option<ModelValue>,
    /// Domain-wide correlation UUID, stamped once per client request.
    pub domain_uuid: Option<String>,
    /// Caller-supplied timeout for multi-process dispatch, in milliseconds.
    pub blocking_timeout_ms: Option<u64>,
    /// Mechanism the request arrived over (`NATIVE`, `HTTP`, `JMX`).
    pub access_mechanism: Option<String>,
}

impl OperationHeaders {
    /// Returns true if no header is set.
    pub fn is_empty(&self) -> bool {
        self.rollout_plan.is_none()
            && self.domain_uuid.is_none()
            && self.blocking_timeout_ms.is_none()
            && self.access_mechanism.is_none()
    }

    /// Renders the headers as a model value.
    pub fn to_value(&self) -> ModelValue {
        let mut obj = ModelValue::object();
        if let Some(plan) = &self.rollout_plan {
            obj.set("rollout-plan", plan.clone()).unwrap();
        }
        if let Some(uuid) = &self.domain_uuid {
            obj.set("domain-uuid", uuid.as_str().into()).unwrap();
        }
        if let Some(ms) = self.blocking_timeout_ms {
            obj.set("blocking-timeout", ModelValue::Int(ms as i64)).unwrap();
        }
        if let Some(mech) = &self.access_mechanism {
            obj.set("access-mechanism", mech.as_str().into()).unwrap();
        }
        obj
    }

    /// Parses headers from their wire form.
    pub fn from_value(value: &ModelValue) -> Self {
        Self {
            rollout_plan: value.get("rollout-plan").cloned(),
            domain_uuid: value
                .get("domain-uuid")
                .and_then(ModelValue::as_str)
                .map(str::to_string),
            blocking_timeout_ms: value
                .get("blocking-timeout")
                .and_then(ModelValue::as_i64)
                .map(|ms| ms as u64),
            access_mechanism: value
                .get("access-mechanism")
                .and_then(ModelValue::as_str)
                .map(str::to_string),
        }
    }
}

/// One management operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    name: String,
    address: PathAddress,
    params: BTreeMap<String, ModelValue>,
    headers: OperationHeaders,
}

impl Operation {
    /// Creates an operation with no parameters.
    pub fn new(name: &str, address: PathAddress) -> Self {
        Self {
            name: name.to_string(),
            address,
            params: BTreeMap::new(),
            headers: OperationHeaders::default(),
        }
    }

    /// Builds a composite operation from ordered steps.
    pub fn composite(steps: Vec<Operation>) -> Self {
        let step_values = steps.iter().map(Operation::to_value).collect();
        Self::new(COMPOSITE, PathAddress::root()).with_param(STEPS, ModelValue::List(step_values))
    }

    /// Adds one named parameter.
    pub fn with_param(mut self, name: &str, value: ModelValue) -> Self {
        self.params.insert(name.to_string(), value);
        self
    }

    /// Replaces the target address.
    pub fn with_address(mut self, address: PathAddress) -> Self {
        self.address = address;
        self
    }

    /// Replaces the headers.
    pub fn with_headers(mut self, headers: OperationHeaders) -> Self {
        self.headers = headers;
        self
    }

    /// Returns a copy of this operation stamped with a domain UUID.
    pub fn with_domain_uuid(mut self, uuid: &str) -> Self {
        self.headers.domain_uuid = Some(uuid.to_string());
        self
    }

    /// Returns a copy of this operation readdressed into a local context,
    /// used when the router propagates a domain-wide write to a host or
    /// server. `prefix` is the local root the address is rewritten under.
    pub fn rebased(&self, prefix: &PathAddress) -> Self {
        let mut rebased = self.clone();
        rebased.address = prefix.append(&self.address);
        rebased
    }

    /// Returns the operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the target address.
    pub fn address(&self) -> &PathAddress {
        &self.address
    }

    /// Returns all named parameters.
    pub fn params(&self) -> &BTreeMap<String, ModelValue> {
        &self.params
    }

    /// Returns one parameter, if present.
    pub fn param(&self, name: &str) -> Option<&ModelValue> {
        self.params.get(name)
    }

    /// Returns one parameter or a missing-parameter error.
    pub fn require_param(&self, name: &str) -> Result<&ModelValue> {
        self.param(name)
            .ok_or_else(|| ExecError::MissingParameter(name.to_string()))
    }

    /// Returns a string parameter or an error.
    pub fn require_str_param(&self, name: &str) -> Result<&str> {
        self.require_param(name)?
            .as_str()
            .ok_or_else(|| ExecError::InvalidParameter {
                name: name.to_string(),
                reason: "expected a string".to_string(),
            })
    }

    /// Returns the operation headers.
    pub fn headers(&self) -> &OperationHeaders {
        &self.headers
    }

    /// Returns true for the composite operation.
    pub fn is_composite(&self) -> bool {
        self.name == COMPOSITE
    }

    /// Parses the ordered steps of a composite operation.
    pub fn steps(&self) -> Result<Vec<Operation>> {
        let steps = self.require_param(STEPS)?;
        let list = steps.as_list().ok_or_else(|| ExecError::InvalidParameter {
            name: STEPS.to_string(),
            reason: "expected a list".to_string(),
        })?;
        list.iter().map(Operation::from_value).collect()
    }

    /// Renders the wire form of this operation.
    pub fn to_value(&self) -> ModelValue {
        let mut obj = ModelValue::object();
        obj.set("operation", self.name.as_str().into()).unwrap();
        obj.set("address", self.address.to_value()).unwrap();
        for (name, value) in &self.params {
            obj.set(name, value.clone()).unwrap();
        }
        if !self.headers.is_empty() {
            obj.set("operation-headers", self.headers.to_value()).unwrap();
        }
        obj
    }

    /// Parses an operation from its wire form.
    pub fn from_value(value: &ModelValue) -> Result<Operation> {
        let obj = value.as_object().ok_or_else(|| ExecError::InvalidParameter {
            name: "operation".to_string(),
            reason: "expected an object".to_string(),
        })?;
        let name = obj
            .get("operation")
            .and_then(ModelValue::as_str)
            .ok_or_else(|| ExecError::MissingParameter("operation".to_string()))?
            .to_string();
        let address = match obj.get("address") {
            Some(addr) => PathAddress::from_value(addr)?,
            None => PathAddress::root(),
        };
        let headers = obj
            .get("operation-headers")
            .map(OperationHeaders::from_value)
            .unwrap_or_default();
        let mut params = BTreeMap::new();
        for (key, val) in obj {
            if key == "operation" || key == "address" || key == "operation-headers" {
                continue;
            }
            params.insert(key.clone(), val.clone());
        }
        Ok(Operation {
            name,
            address,
            params,
            headers,
        })
    }
}

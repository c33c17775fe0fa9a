//! Management responses: the reply half of the wire contract.

use serde::{Deserialize, Serialize};
use std::fmt;

use appdom_model::ModelValue;

/// Overall outcome of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The operation was applied.
    Success,
    /// The operation failed; any applied steps were compensated.
    Failed,
    /// The operation was cancelled before completion.
    Cancelled,
}

impl Outcome {
    /// Returns the wire string of this outcome.
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failed => "failed",
            Outcome::Cancelled => "cancelled",
        }
    }

    /// Parses the wire string of an outcome.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Outcome::Success),
            "failed" => Some(Outcome::Failed),
            "cancelled" => Some(Outcome::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Headers attached to a response by the executor or router.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseHeaders {
    /// The change is applied to the model but only takes effect after a
    /// reload of the affected processes.
    pub operation_requires_reload: bool,
    /// The step was applied and then compensated during composite rollback.
    pub rolled_back: bool,
    /// Non-fatal warnings for the operator.
    pub warnings: Vec<String>,
}

impl ResponseHeaders {
    /// Returns true if no header is set.
    pub fn is_empty(&self) -> bool {
        !self.operation_requires_reload && !self.rolled_back && self.warnings.is_empty()
    }

    /// Renders the headers as a model value.
    pub fn to_value(&self) -> ModelValue {
        let mut obj = ModelValue::object();
        if self.operation_requires_reload {
            obj.set("operation-requires-reload", true.into()).unwrap();
        }
        if self.rolled_back {
            obj.set("rolled-back", true.into()).unwrap();
        }
        if !self.warnings.is_empty() {
            let mut list = ModelValue::list();
            for w in &self.warnings {
                list.push(w.as_str().into()).unwrap();
            }
            obj.set("warnings", list).unwrap();
        }
        obj
    }

    /// Parses headers from their wire form.
    pub fn from_value(value: &ModelValue) -> Self {
        Self {
            operation_requires_reload: value
                .get("operation-requires-reload")
                .and_then(ModelValue::as_bool)
                .unwrap_or(false),
            rolled_back: value
                .get("rolled-back")
                .and_then(ModelValue::as_bool)
                .unwrap_or(false),
            warnings: value
                .get("warnings")
                .and_then(ModelValue::as_list)
                .map(|l| {
                    l.iter()
                        .filter_map(ModelValue::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// One management response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Overall outcome.
    pub outcome: Outcome,
    /// Operation result; `Undefined` for operations with no payload.
    pub result: ModelValue,
    /// Failure detail when the outcome is not `Success`.
    pub failure_description: Option<ModelValue>,
    /// Response headers.
    pub response_headers: ResponseHeaders,
}

impl Response {
    /// Creates a success response with a result payload.
    pub fn success(result: ModelValue) -> Self {
        Self {
            outcome: Outcome::Success,
            result,
            failure_description: None,
            response_headers: ResponseHeaders::default(),
        }
    }

    /// Creates a success response with no payload.
    pub fn success_empty() -> Self {
        Self::success(ModelValue::Undefined)
    }

    /// Creates a failed response from a failure description value.
    pub fn failed(description: ModelValue) -> Self {
        Self {
            outcome: Outcome::Failed,
            result: ModelValue::Undefined,
            failure_description: Some(description),
            response_headers: ResponseHeaders::default(),
        }
    }

    /// Creates a failed response from a message.
    pub fn failed_msg(message: impl Into<String>) -> Self {
        Self::failed(ModelValue::Str(message.into()))
    }

    /// Creates a cancelled response.
    pub fn cancelled() -> Self {
        Self {
            outcome: Outcome::Cancelled,
            result: ModelValue::Undefined,
            failure_description: Some(ModelValue::Str("operation cancelled".into())),
            response_headers: ResponseHeaders::default(),
        }
    }

    /// Returns true for a success outcome.
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Marks this response as requiring a reload to take effect.
    pub fn requires_reload(mut self) -> Self {
        self.response_headers.operation_requires_reload = true;
        self
    }

    /// Renders the wire form of this response.
    pub fn to_value(&self) -> ModelValue {
        let mut obj = ModelValue::object();
        obj.set("outcome", self.outcome.as_str().into()).unwrap();
        if self.result.is_defined() {
            obj.set("result", self.result.clone()).unwrap();
        }
        if let Some(failure) = &self.failure_description {
            obj.set("failure-description", failure.clone()).unwrap();
        }
        if !self.response_headers.is_empty() {
            obj.set("response-headers", self.response_headers.to_value()).unwrap();
        }
        obj
    }

    /// Parses a response from its wire form.
    pub fn from_value(value: &ModelValue) -> Option<Response> {
        let outcome = Outcome::parse(value.get("outcome")?.as_str()?)?;
        Some(Response {
            outcome,
            result: value.get("result").cloned().unwrap_or(ModelValue::Undefined),
            failure_description: value.get("failure-description").cloned(),
            response_headers: value
                .get("response-headers")
                .map(ResponseHeaders::from_value)
                .unwrap_or_default(),
        })
    }

    /// Returns the response stored under `step-N` of a composite result,
    /// `n` being 1-based.
    pub fn step(&self, n: usize) -> Option<Response> {
        self.result
            .get(&format!("step-{n}"))
            .and_then(Response::from_value)
    }

    /// Returns the number of `step-N` entries in a composite result.
    pub fn step_count(&self) -> usize {
        match self.result.as_object() {
            Some(map) => map.keys().filter(|k| k.starts_with("step-")).count(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_wire_strings() {
        assert_eq!(Outcome::Success.as_str(), "success");
        assert_eq!(Outcome::Failed.as_str(), "failed");
        assert_eq!(Outcome::Cancelled.as_str(), "cancelled");
        assert_eq!(Outcome::parse("success"), Some(Outcome::Success));
        assert_eq!(Outcome::parse("bogus"), None);
    }

    #[test]
    fn success_round_trip() {
        let resp = Response::success(ModelValue::Int(42));
        let back = Response::from_value(&resp.to_value()).unwrap();
        assert_eq!(resp, back);
    }

    #[test]
    fn failed_round_trip() {
        let resp = Response::failed_msg("resource not found at /profile=x");
        let back = Response::from_value(&resp.to_value()).unwrap();
        assert_eq!(resp, back);
        assert!(!back.is_success());
    }

    #[test]
    fn headers_round_trip() {
        let mut resp = Response::success_empty().requires_reload();
        resp.response_headers.warnings.push("deprecated attribute".into());
        let back = Response::from_value(&resp.to_value()).unwrap();
        assert!(back.response_headers.operation_requires_reload);
        assert_eq!(back.response_headers.warnings, vec!["deprecated attribute".to_string()]);
    }

    #[test]
    fn empty_headers_omitted() {
        let resp = Response::success_empty();
        assert!(resp.to_value().get("response-headers").is_none());
        assert!(resp.to_value().get("result").is_none());
    }

    #[test]
    fn rolled_back_header_round_trip() {
        let mut resp = Response::success_empty();
        resp.response_headers.rolled_back = true;
        let back = Response::from_value(&resp.to_value()).unwrap();
        assert!(back.response_headers.rolled_back);
    }

    #[test]
    fn step_accessors() {
        let mut result = ModelValue::object();
        result
            .set("step-1", Response::success(ModelValue::Int(1)).to_value())
            .unwrap();
        result
            .set("step-2", Response::failed_msg("boom").to_value())
            .unwrap();
        let resp = Response::success(result);

        assert_eq!(resp.step_count(), 2);
        assert!(resp.step(1).unwrap().is_success());
        assert!(!resp.step(2).unwrap().is_success());
        assert!(resp.step(3).is_none());
    }

    #[test]
    fn cancelled_has_failure_description() {
        let resp = Response::cancelled();
        assert_eq!(resp.outcome, Outcome::Cancelled);
        assert!(resp.failure_description.is_some());
    }
}

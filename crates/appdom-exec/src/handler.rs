//! Operation handler contract and registry.
//!
//! Every operation name maps to one registered handler. Dispatch goes
//! through the registry table; call sites never match on operation name
//! strings.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use appdom_model::{DescriptionRegistry, ResourceTree};

use crate::capability::CapabilityRegistry;
use crate::error::Result;
use crate::operation::Operation;
use crate::response::Response;

/// Mutable process state a handler executes against.
pub struct OperationContext<'a> {
    /// The process-local model tree.
    pub tree: &'a mut ResourceTree,
    /// Static resource descriptions.
    pub descriptions: &'a DescriptionRegistry,
    /// Capability registry of this process.
    pub capabilities: &'a mut CapabilityRegistry,
}

/// Result of one handler invocation.
#[derive(Debug)]
pub struct HandlerResult {
    /// The response returned to the caller.
    pub response: Response,
    /// Compensating operation undoing this invocation, for composite
    /// rollback. `None` for read-only handlers.
    pub compensation: Option<Operation>,
}

impl HandlerResult {
    /// A result with no compensation.
    pub fn read_only(response: Response) -> Self {
        Self {
            response,
            compensation: None,
        }
    }

    /// A result carrying a compensating operation.
    pub fn with_compensation(response: Response, compensation: Operation) -> Self {
        Self {
            response,
            compensation: Some(compensation),
        }
    }
}

/// A registered operation handler.
pub trait OperationHandler: Send + Sync {
    /// Executes the operation against the context. The address is concrete
    /// by the time a handler runs; wildcard expansion happens in the
    /// executor.
    fn execute(&self, ctx: &mut OperationContext<'_>, op: &Operation) -> Result<HandlerResult>;
}

/// Static dispatch metadata for a handler.
#[derive(Clone, Debug)]
pub struct HandlerSpec {
    /// Operation name the handler serves.
    pub name: String,
    /// Read-only handlers never mutate and may target wildcards.
    pub read_only: bool,
    /// Runtime-only handlers fail against a stopped process.
    pub runtime_only: bool,
    /// The executor expands wildcard addresses before dispatch. Handlers
    /// serving static metadata opt out and see the pattern itself.
    pub expands_wildcards: bool,
}

impl HandlerSpec {
    /// Spec for a mutating handler.
    pub fn mutating(name: &str) -> Self {
        Self {
            name: name.to_string(),
            read_only: false,
            runtime_only: false,
            expands_wildcards: true,
        }
    }

    /// Spec for a read-only handler.
    pub fn read_only(name: &str) -> Self {
        Self {
            name: name.to_string(),
            read_only: true,
            runtime_only: false,
            expands_wildcards: true,
        }
    }

    /// Marks the handler runtime-only.
    pub fn runtime_only(mut self) -> Self {
        self.runtime_only = true;
        self
    }

    /// Opts out of wildcard expansion.
    pub fn no_wildcard_expansion(mut self) -> Self {
        self.expands_wildcards = false;
        self
    }
}

#[derive(Clone)]
struct RegisteredHandler {
    spec: HandlerSpec,
    handler: Arc<dyn OperationHandler>,
}

/// Handler table keyed by operation name.
pub struct HandlerRegistry {
    by_name: RwLock<HashMap<String, RegisteredHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            by_name: RwLock::new(HashMap::new()),
        }
    }

    /// Registers or replaces a handler.
    pub fn register(&self, spec: HandlerSpec, handler: Arc<dyn OperationHandler>) {
        let mut map = self.by_name.write().unwrap();
        map.insert(spec.name.clone(), RegisteredHandler { spec, handler });
    }

    /// Looks up a handler and its spec by operation name.
    pub fn lookup(&self, name: &str) -> Option<(HandlerSpec, Arc<dyn OperationHandler>)> {
        let map = self.by_name.read().unwrap();
        map.get(name).map(|r| (r.spec.clone(), r.handler.clone()))
    }

    /// Returns the registered operation names, sorted.
    pub fn operation_names(&self) -> Vec<String> {
        let map = self.by_name.read().unwrap();
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

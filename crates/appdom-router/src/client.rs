//! Process clients: how the router talks to a managed process.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use appdom_exec::{CancelFlag, CapabilityRegistry, Operation, OperationContext, OperationExecutor, Response};
use appdom_model::{DescriptionRegistry, ResourceTree};

use crate::error::Result;

/// A connection to one managed process (host controller or server).
#[async_trait]
pub trait ProcessClient: Send + Sync {
    /// Executes one operation on the process and returns its response.
    async fn execute(&self, op: Operation) -> Result<Response>;
}

/// The mutable state of one in-process managed process.
pub struct ProcessState {
    /// The process model tree.
    pub tree: ResourceTree,
    /// The process capability registry.
    pub capabilities: CapabilityRegistry,
}

impl ProcessState {
    /// Creates empty process state.
    pub fn new() -> Self {
        Self {
            tree: ResourceTree::new(),
            capabilities: CapabilityRegistry::new(),
        }
    }
}

impl Default for ProcessState {
    fn default() -> Self {
        Self::new()
    }
}

/// A process hosted in the controller's own address space. The model tree
/// is single-writer: the state lock serializes overlapping operations.
#[derive(Clone)]
pub struct LocalProcess {
    state: Arc<Mutex<ProcessState>>,
    descriptions: Arc<DescriptionRegistry>,
    executor: Arc<OperationExecutor>,
}

impl LocalProcess {
    /// Creates a process with empty state and the standard handlers.
    pub fn new(descriptions: Arc<DescriptionRegistry>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ProcessState::new())),
            descriptions,
            executor: Arc::new(OperationExecutor::with_standard_ops()),
        }
    }

    /// Creates a process over existing state.
    pub fn with_state(state: ProcessState, descriptions: Arc<DescriptionRegistry>) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            descriptions,
            executor: Arc::new(OperationExecutor::with_standard_ops()),
        }
    }

    /// Executes synchronously against the process state.
    pub fn execute_sync(&self, op: &Operation) -> Response {
        self.execute_sync_cancellable(op, &CancelFlag::new())
    }

    /// Executes synchronously, checking `flag` between composite steps.
    pub fn execute_sync_cancellable(&self, op: &Operation, flag: &CancelFlag) -> Response {
        let mut state = self.state.lock().unwrap();
        let ProcessState { tree, capabilities } = &mut *state;
        let mut ctx = OperationContext {
            tree,
            descriptions: &self.descriptions,
            capabilities,
        };
        self.executor.execute_cancellable(&mut ctx, op, flag)
    }

    /// Runs a closure against the process state, for setup and assertions.
    pub fn with_state_mut<T>(&self, f: impl FnOnce(&mut ProcessState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Returns the process model rendered as a value.
    pub fn model_value(&self) -> appdom_model::ModelValue {
        self.state.lock().unwrap().tree.to_value()
    }
}

#[async_trait]
impl ProcessClient for LocalProcess {
    async fn execute(&self, op: Operation) -> Result<Response> {
        Ok(self.execute_sync(&op))
    }
}

//! The operation executor.
//!
//! Resolves addresses, dispatches through the handler table, and runs
//! composite operations: steps execute strictly in order, each step's
//! response lands under `step-(index+1)`, and the first failure compensates
//! every already-applied step in reverse order.

use std::sync::Arc;

use appdom_model::ModelValue;

use crate::active::CancelFlag;
use crate::error::ExecError;
use crate::handler::{HandlerRegistry, OperationContext, OperationHandler};
use crate::operation::Operation;
use crate::response::{Outcome, Response};
use crate::standard::standard_registry;

/// Executes single and composite operations against one process context.
pub struct OperationExecutor {
    registry: Arc<HandlerRegistry>,
}

impl OperationExecutor {
    /// Creates an executor over a handler registry.
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// Creates an executor pre-loaded with the built-in handlers.
    pub fn with_standard_ops() -> Self {
        Self::new(Arc::new(standard_registry()))
    }

    /// Returns the handler registry for extension registration.
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Executes an operation. Errors surface as `Failed` responses; this
    /// never panics the process on a bad request.
    pub fn execute(&self, ctx: &mut OperationContext<'_>, op: &Operation) -> Response {
        self.execute_cancellable(ctx, op, &CancelFlag::new())
    }

    /// Executes an operation, checking `flag` between composite steps.
    pub fn execute_cancellable(
        &self,
        ctx: &mut OperationContext<'_>,
        op: &Operation,
        flag: &CancelFlag,
    ) -> Response {
        let mut compensations = Vec::new();
        self.run(ctx, op, flag, &mut compensations)
    }

    fn run(
        &self,
        ctx: &mut OperationContext<'_>,
        op: &Operation,
        flag: &CancelFlag,
        compensations: &mut Vec<Operation>,
    ) -> Response {
        if flag.is_cancelled() {
            return Response::cancelled();
        }
        if op.is_composite() {
            return self.run_composite(ctx, op, flag, compensations);
        }

        let Some((spec, handler)) = self.registry.lookup(op.name()) else {
            return Response::failed_msg(ExecError::NoHandler(op.name().to_string()).to_string());
        };

        if op.address().is_multi_target() && spec.expands_wildcards {
            if !spec.read_only {
                return Response::failed_msg(
                    ExecError::WildcardNotAllowed {
                        name: op.name().to_string(),
                        address: op.address().to_string(),
                    }
                    .to_string(),
                );
            }
            return self.run_expanded(ctx, op, handler.as_ref());
        }

        match handler.execute(ctx, op) {
            Ok(result) => {
                if let Some(compensation) = result.compensation {
                    compensations.push(compensation);
                }
                result.response
            }
            Err(ExecError::Cancelled) => Response::cancelled(),
            Err(err) => {
                tracing::debug!(operation = op.name(), address = %op.address(), error = %err, "operation failed");
                Response::failed_msg(err.to_string())
            }
        }
    }

    /// Expands a wildcard read into one result entry per concrete match.
    fn run_expanded(
        &self,
        ctx: &mut OperationContext<'_>,
        op: &Operation,
        handler: &dyn OperationHandler,
    ) -> Response {
        let matches = ctx.tree.resolve(op.address());
        let mut entries = ModelValue::list();
        for concrete in matches {
            let rewritten = op.clone().with_address(concrete.clone());
            let mut entry = ModelValue::object();
            entry.set("address", concrete.to_value()).unwrap();
            match handler.execute(ctx, &rewritten) {
                Ok(result) => {
                    entry.set("outcome", result.response.outcome.as_str().into()).unwrap();
                    entry.set("result", result.response.result).unwrap();
                }
                Err(err) => {
                    entry.set("outcome", Outcome::Failed.as_str().into()).unwrap();
                    entry
                        .set("failure-description", ModelValue::Str(err.to_string()))
                        .unwrap();
                }
            }
            entries.push(entry).unwrap();
        }
        Response::success(entries)
    }

    fn run_composite(
        &self,
        ctx: &mut OperationContext<'_>,
        op: &Operation,
        flag: &CancelFlag,
        parent_compensations: &mut Vec<Operation>,
    ) -> Response {
        let steps = match op.steps() {
            Ok(steps) => steps,
            Err(err) => return Response::failed_msg(err.to_string()),
        };

        let mut local_compensations: Vec<Operation> = Vec::new();
        let mut step_responses: Vec<Response> = Vec::new();
        let mut failed_step: Option<usize> = None;
        let mut cancelled = false;

        for (index, step) in steps.iter().enumerate() {
            if flag.is_cancelled() {
                cancelled = true;
                break;
            }
            let response = self.run(ctx, step, flag, &mut local_compensations);
            let success = response.is_success();
            step_responses.push(response);
            if !success {
                failed_step = Some(index);
                break;
            }
        }

        let aborted = cancelled || failed_step.is_some();
        if aborted {
            self.roll_back(ctx, &mut local_compensations);
            // Applied steps are re-labelled as rolled back.
            for response in step_responses.iter_mut().filter(|r| r.is_success()) {
                response.response_headers.rolled_back = true;
            }
        }

        let mut result = ModelValue::object();
        let mut requires_reload = false;
        for (index, response) in step_responses.iter().enumerate() {
            requires_reload |= response.response_headers.operation_requires_reload;
            result
                .set(&format!("step-{}", index + 1), response.to_value())
                .unwrap();
        }

        let mut response = if cancelled {
            let mut r = Response::cancelled();
            r.result = result;
            r
        } else if let Some(index) = failed_step {
            let failure = step_responses[index]
                .failure_description
                .clone()
                .unwrap_or_else(|| ModelValue::Str("step failed".into()));
            let mut description = ModelValue::object();
            description.set("failed-step", ModelValue::Int((index + 1) as i64)).unwrap();
            description.set("failure", failure).unwrap();
            let mut r = Response::failed(description);
            r.result = result;
            r
        } else {
            if !local_compensations.is_empty() {
                local_compensations.reverse();
                parent_compensations.push(Operation::composite(local_compensations));
            }
            Response::success(result)
        };
        if requires_reload {
            response.response_headers.operation_requires_reload = true;
        }
        response
    }

    /// Applies compensations in reverse order. Compensation failures are
    /// logged and skipped; the remaining compensations still run.
    fn roll_back(&self, ctx: &mut OperationContext<'_>, compensations: &mut Vec<Operation>) {
        while let Some(compensation) = compensations.pop() {
            let mut discard = Vec::new();
            let response = self.run(ctx, &compensation, &CancelFlag::new(), &mut discard);
            if !response.is_success() {
                tracing::error!(
                    operation = compensation.name(),
                    address = %compensation.address(),
                    "compensation failed during rollback"
                );
            }
        }
    }
}

impl Default for OperationExecutor {
    fn default() -> Self {
        Self::with_standard_ops()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityRegistry;
    use crate::standard::{ADD, READ_CHILDREN_NAMES, READ_RESOURCE, REMOVE, WRITE_ATTRIBUTE};
    use appdom_model::{DescriptionRegistry, PathAddress, ResourceTree};

    struct Fixture {
        tree: ResourceTree,
        descriptions: DescriptionRegistry,
        capabilities: CapabilityRegistry,
        executor: OperationExecutor,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tree: ResourceTree::new(),
                descriptions: DescriptionRegistry::with_core_types(),
                capabilities: CapabilityRegistry::new(),
                executor: OperationExecutor::with_standard_ops(),
            }
        }

        fn execute(&mut self, op: &Operation) -> Response {
            let mut ctx = OperationContext {
                tree: &mut self.tree,
                descriptions: &self.descriptions,
                capabilities: &mut self.capabilities,
            };
            self.executor.execute(&mut ctx, op)
        }

        fn execute_cancellable(&mut self, op: &Operation, flag: &CancelFlag) -> Response {
            let mut ctx = OperationContext {
                tree: &mut self.tree,
                descriptions: &self.descriptions,
                capabilities: &mut self.capabilities,
            };
            self.executor.execute_cancellable(&mut ctx, op, flag)
        }
    }

    fn addr(s: &str) -> PathAddress {
        PathAddress::parse(s).unwrap()
    }

    fn add_prop(name: &str, value: &str) -> Operation {
        Operation::new(ADD, addr(&format!("/system-property={name}"))).with_param("value", value.into())
    }

    #[test]
    fn single_operation_success() {
        let mut fx = Fixture::new();
        let response = fx.execute(&add_prop("a", "1"));
        assert!(response.is_success());
        assert!(fx.tree.exists(&addr("/system-property=a")));
    }

    #[test]
    fn unknown_operation_fails() {
        let mut fx = Fixture::new();
        let response = fx.execute(&Operation::new("bogus-op", PathAddress::root()));
        assert_eq!(response.outcome, Outcome::Failed);
        let text = response.failure_description.unwrap().to_json().to_string();
        assert!(text.contains("bogus-op"));
    }

    #[test]
    fn composite_success_has_one_entry_per_step() {
        let mut fx = Fixture::new();
        let composite = Operation::composite(vec![
            add_prop("a", "1"),
            add_prop("b", "2"),
            add_prop("c", "3"),
        ]);
        let response = fx.execute(&composite);
        assert!(response.is_success());
        assert_eq!(response.step_count(), 3);
        for n in 1..=3 {
            assert!(response.step(n).unwrap().is_success());
        }
        assert!(response.step(4).is_none());
    }

    #[test]
    fn composite_failure_rolls_back_applied_steps() {
        let mut fx = Fixture::new();
        fx.execute(&add_prop("conflict", "existing"));

        let composite = Operation::composite(vec![
            add_prop("a", "1"),
            add_prop("conflict", "dup"), // fails: already exists
            add_prop("never", "x"),
        ]);
        let response = fx.execute(&composite);
        assert_eq!(response.outcome, Outcome::Failed);

        // Step 1 applied then compensated.
        assert!(!fx.tree.exists(&addr("/system-property=a")));
        // Step 3 never ran.
        assert!(!fx.tree.exists(&addr("/system-property=never")));
        // Pre-existing state untouched.
        assert!(fx.tree.exists(&addr("/system-property=conflict")));

        let step1 = response.step(1).unwrap();
        assert!(step1.is_success());
        assert!(step1.response_headers.rolled_back);
        let step2 = response.step(2).unwrap();
        assert_eq!(step2.outcome, Outcome::Failed);
        assert!(response.step(3).is_none());

        let failure = response.failure_description.unwrap();
        assert_eq!(failure.get("failed-step"), Some(&ModelValue::Int(2)));
    }

    #[test]
    fn composite_rollback_restores_written_attributes() {
        let mut fx = Fixture::new();
        fx.execute(&add_prop("a", "old"));

        let composite = Operation::composite(vec![
            Operation::new(WRITE_ATTRIBUTE, addr("/system-property=a"))
                .with_param("name", "value".into())
                .with_param("value", "new".into()),
            Operation::new(REMOVE, addr("/system-property=missing")), // fails
        ]);
        let response = fx.execute(&composite);
        assert_eq!(response.outcome, Outcome::Failed);
        assert_eq!(
            fx.tree.read_attribute(&addr("/system-property=a"), "value").unwrap(),
            ModelValue::Str("old".into())
        );
    }

    #[test]
    fn nested_composite_numbering_restarts() {
        let mut fx = Fixture::new();
        let inner = Operation::composite(vec![add_prop("x", "1"), add_prop("y", "2")]);
        let outer = Operation::composite(vec![add_prop("a", "0"), inner]);
        let response = fx.execute(&outer);
        assert!(response.is_success());
        assert_eq!(response.step_count(), 2);

        let nested = response.step(2).unwrap();
        assert_eq!(nested.step_count(), 2);
        assert!(nested.step(1).unwrap().is_success());
        assert!(nested.step(2).unwrap().is_success());
    }

    #[test]
    fn nested_composite_failure_unwinds_outer_steps() {
        let mut fx = Fixture::new();
        fx.execute(&add_prop("conflict", "existing"));

        let inner = Operation::composite(vec![add_prop("x", "1"), add_prop("conflict", "dup")]);
        let outer = Operation::composite(vec![add_prop("a", "0"), inner]);
        let response = fx.execute(&outer);
        assert_eq!(response.outcome, Outcome::Failed);

        // Everything applied anywhere in the nesting is compensated.
        assert!(!fx.tree.exists(&addr("/system-property=a")));
        assert!(!fx.tree.exists(&addr("/system-property=x")));
    }

    #[test]
    fn wildcard_read_expands_to_entry_per_match() {
        let mut fx = Fixture::new();
        fx.execute(&add_prop("a", "1"));
        fx.execute(&add_prop("b", "2"));

        let response = fx.execute(&Operation::new(READ_RESOURCE, addr("/system-property=*")));
        assert!(response.is_success());
        let entries = response.result.as_list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].get_path(&["result", "value"]),
            Some(&ModelValue::Str("1".into()))
        );
    }

    #[test]
    fn wildcard_with_no_matches_is_empty_success() {
        let mut fx = Fixture::new();
        let response = fx.execute(&Operation::new(READ_RESOURCE, addr("/system-property=*")));
        assert!(response.is_success());
        assert!(response.result.as_list().unwrap().is_empty());
    }

    #[test]
    fn wildcard_write_rejected() {
        let mut fx = Fixture::new();
        fx.execute(&add_prop("a", "1"));
        let response = fx.execute(
            &Operation::new(WRITE_ATTRIBUTE, addr("/system-property=*"))
                .with_param("name", "value".into())
                .with_param("value", "x".into()),
        );
        assert_eq!(response.outcome, Outcome::Failed);
        assert_eq!(
            fx.tree.read_attribute(&addr("/system-property=a"), "value").unwrap(),
            ModelValue::Str("1".into())
        );
    }

    #[test]
    fn read_children_names_after_composite() {
        let mut fx = Fixture::new();
        fx.execute(&Operation::composite(vec![add_prop("a", "1"), add_prop("b", "2")]));
        let response = fx.execute(
            &Operation::new(READ_CHILDREN_NAMES, PathAddress::root())
                .with_param("child-type", "system-property".into()),
        );
        assert_eq!(
            response.result,
            ModelValue::List(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn cancelled_before_start_returns_cancelled() {
        let mut fx = Fixture::new();
        let flag = CancelFlag::new();
        flag.cancel();
        let response = fx.execute_cancellable(&add_prop("a", "1"), &flag);
        assert_eq!(response.outcome, Outcome::Cancelled);
        assert!(!fx.tree.exists(&addr("/system-property=a")));
    }

    #[test]
    fn composite_requires_reload_propagates_to_top() {
        let mut fx = Fixture::new();
        fx.execute(
            &Operation::new(ADD, addr("/interface=public")).with_param("provides", "net.public".into()),
        );
        fx.execute(
            &Operation::new(ADD, addr("/socket-binding-group=std"))
                .with_param("requires", "net.public".into()),
        );

        // Remove and re-add the provider in one composite.
        let cycle = Operation::composite(vec![
            Operation::new(REMOVE, addr("/interface=public")),
            Operation::new(ADD, addr("/interface=public")).with_param("provides", "net.public".into()),
        ]);
        let response = fx.execute(&cycle);
        assert!(response.is_success());
        assert!(response.response_headers.operation_requires_reload);

        // A dependent add keeps reporting reload until the scope reloads.
        let dependent = fx.execute(
            &Operation::new(ADD, addr("/socket-binding-group=other"))
                .with_param("requires", "net.public".into()),
        );
        assert!(dependent.is_success());
        assert!(dependent.response_headers.operation_requires_reload);

        fx.capabilities.reload(&PathAddress::root());
        let dependent = fx.execute(
            &Operation::new(ADD, addr("/socket-binding-group=third"))
                .with_param("requires", "net.public".into()),
        );
        assert!(!dependent.response_headers.operation_requires_reload);
    }

    #[test]
    fn compensation_order_is_reverse_of_application() {
        let mut fx = Fixture::new();
        // Step 2 writes to the resource step 1 created; rollback must undo
        // the write before removing the resource.
        let composite = Operation::composite(vec![
            add_prop("a", "1"),
            Operation::new(WRITE_ATTRIBUTE, addr("/system-property=a"))
                .with_param("name", "value".into())
                .with_param("value", "2".into()),
            Operation::new(REMOVE, addr("/system-property=missing")), // fails
        ]);
        let response = fx.execute(&composite);
        assert_eq!(response.outcome, Outcome::Failed);
        assert!(!fx.tree.exists(&addr("/system-property=a")));
    }
}

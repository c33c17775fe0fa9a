//! The built-in global operation handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use appdom_model::ModelValue;

use crate::capability::DependentOutcome;
use crate::error::{ExecError, Result};
use crate::handler::{HandlerRegistry, HandlerResult, HandlerSpec, OperationContext, OperationHandler};
use crate::operation::Operation;
use crate::response::Response;

/// Operation name: create a resource.
pub const ADD: &str = "add";
/// Operation name: remove a resource.
pub const REMOVE: &str = "remove";
/// Operation name: write one attribute.
pub const WRITE_ATTRIBUTE: &str = "write-attribute";
/// Operation name: read one attribute.
pub const READ_ATTRIBUTE: &str = "read-attribute";
/// Operation name: remove one attribute.
pub const UNDEFINE_ATTRIBUTE: &str = "undefine-attribute";
/// Operation name: read a resource, optionally recursive.
pub const READ_RESOURCE: &str = "read-resource";
/// Operation name: list child names under one child type.
pub const READ_CHILDREN_NAMES: &str = "read-children-names";
/// Operation name: list child types.
pub const READ_CHILDREN_TYPES: &str = "read-children-types";
/// Operation name: read the static resource-type description.
pub const READ_RESOURCE_DESCRIPTION: &str = "read-resource-description";

/// Reserved add parameter naming capabilities the resource provides.
pub const PROVIDES: &str = "provides";
/// Reserved add parameter naming capabilities the resource requires.
pub const REQUIRES: &str = "requires";

fn capability_list(op: &Operation, param: &str) -> Result<Vec<String>> {
    match op.param(param) {
        None => Ok(Vec::new()),
        Some(ModelValue::Str(s)) => Ok(vec![s.clone()]),
        Some(ModelValue::List(list)) => list
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ExecError::InvalidParameter {
                        name: param.to_string(),
                        reason: "expected a string or list of strings".to_string(),
                    })
            })
            .collect(),
        Some(_) => Err(ExecError::InvalidParameter {
            name: param.to_string(),
            reason: "expected a string or list of strings".to_string(),
        }),
    }
}

struct AddHandler;

impl OperationHandler for AddHandler {
    fn execute(&self, ctx: &mut OperationContext<'_>, op: &Operation) -> Result<HandlerResult> {
        let address = op.address();
        let provides = capability_list(op, PROVIDES)?;
        let requires = capability_list(op, REQUIRES)?;

        // Validation happens before any model mutation.
        for cap in &requires {
            if !ctx.capabilities.is_provided(cap) {
                return Err(ExecError::MissingCapability(cap.clone()));
            }
        }

        let attributes: BTreeMap<String, ModelValue> = op
            .params()
            .iter()
            .filter(|(name, _)| name.as_str() != PROVIDES && name.as_str() != REQUIRES)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        ctx.tree.create(address, attributes)?;

        for cap in &provides {
            ctx.capabilities.register_provider(cap, address);
        }
        let mut reload = false;
        for cap in &requires {
            if ctx.capabilities.add_dependent(cap, address) == Some(DependentOutcome::RequiresReload) {
                reload = true;
            }
        }

        let mut response = Response::success_empty();
        if reload {
            response = response.requires_reload();
        }
        Ok(HandlerResult::with_compensation(
            response,
            Operation::new(REMOVE, address.clone()),
        ))
    }
}

struct RemoveHandler;

impl OperationHandler for RemoveHandler {
    fn execute(&self, ctx: &mut OperationContext<'_>, op: &Operation) -> Result<HandlerResult> {
        let address = op.address();
        let removed = ctx.tree.remove(address)?;

        let provided = ctx.capabilities.provided_at(address);
        for cap in &provided {
            ctx.capabilities.remove_provider(cap);
        }
        ctx.capabilities.remove_dependent(address);

        let reload = provided.iter().any(|cap| ctx.capabilities.is_reload_required(cap));

        let mut compensation = Operation::new(ADD, address.clone());
        for (name, value) in removed.attributes() {
            compensation = compensation.with_param(name, value.clone());
        }
        if !provided.is_empty() {
            let caps = provided.iter().map(|c| ModelValue::Str(c.clone())).collect();
            compensation = compensation.with_param(PROVIDES, ModelValue::List(caps));
        }

        let mut response = Response::success_empty();
        if reload {
            response = response.requires_reload();
        }
        Ok(HandlerResult::with_compensation(response, compensation))
    }
}

struct WriteAttributeHandler;

impl OperationHandler for WriteAttributeHandler {
    fn execute(&self, ctx: &mut OperationContext<'_>, op: &Operation) -> Result<HandlerResult> {
        let name = op.require_str_param("name")?.to_string();
        let value = op.param("value").cloned().unwrap_or(ModelValue::Undefined);
        let prior = ctx.tree.write_attribute(op.address(), &name, value)?;

        let compensation = if prior.is_defined() {
            Operation::new(WRITE_ATTRIBUTE, op.address().clone())
                .with_param("name", name.as_str().into())
                .with_param("value", prior)
        } else {
            Operation::new(UNDEFINE_ATTRIBUTE, op.address().clone())
                .with_param("name", name.as_str().into())
        };
        Ok(HandlerResult::with_compensation(Response::success_empty(), compensation))
    }
}

struct ReadAttributeHandler;

impl OperationHandler for ReadAttributeHandler {
    fn execute(&self, ctx: &mut OperationContext<'_>, op: &Operation) -> Result<HandlerResult> {
        let name = op.require_str_param("name")?;
        let value = ctx.tree.read_attribute(op.address(), name)?;
        Ok(HandlerResult::read_only(Response::success(value)))
    }
}

struct UndefineAttributeHandler;

impl OperationHandler for UndefineAttributeHandler {
    fn execute(&self, ctx: &mut OperationContext<'_>, op: &Operation) -> Result<HandlerResult> {
        let name = op.require_str_param("name")?.to_string();
        let prior = ctx.tree.undefine_attribute(op.address(), &name)?;
        let compensation = Operation::new(WRITE_ATTRIBUTE, op.address().clone())
            .with_param("name", name.as_str().into())
            .with_param("value", prior);
        Ok(HandlerResult::with_compensation(Response::success_empty(), compensation))
    }
}

struct ReadResourceHandler;

impl OperationHandler for ReadResourceHandler {
    fn execute(&self, ctx: &mut OperationContext<'_>, op: &Operation) -> Result<HandlerResult> {
        let recursive = op
            .param("recursive")
            .and_then(ModelValue::as_bool)
            .unwrap_or(false);
        let resource = ctx.tree.read(op.address())?;
        Ok(HandlerResult::read_only(Response::success(resource.to_value(recursive))))
    }
}

struct ReadChildrenNamesHandler;

impl OperationHandler for ReadChildrenNamesHandler {
    fn execute(&self, ctx: &mut OperationContext<'_>, op: &Operation) -> Result<HandlerResult> {
        let child_type = op.require_str_param("child-type")?;
        let names = ctx.tree.children_names(op.address(), child_type)?;
        let list = names.into_iter().map(ModelValue::Str).collect();
        Ok(HandlerResult::read_only(Response::success(ModelValue::List(list))))
    }
}

struct ReadChildrenTypesHandler;

impl OperationHandler for ReadChildrenTypesHandler {
    fn execute(&self, ctx: &mut OperationContext<'_>, op: &Operation) -> Result<HandlerResult> {
        let types = ctx.tree.children_types(op.address())?;
        let list = types.into_iter().map(ModelValue::Str).collect();
        Ok(HandlerResult::read_only(Response::success(ModelValue::List(list))))
    }
}

struct ReadResourceDescriptionHandler;

impl OperationHandler for ReadResourceDescriptionHandler {
    fn execute(&self, ctx: &mut OperationContext<'_>, op: &Operation) -> Result<HandlerResult> {
        let description = ctx.descriptions.describe(op.address())?;
        Ok(HandlerResult::read_only(Response::success(description.to_value())))
    }
}

/// Returns true when the operation only reads. A composite is read-only
/// iff every step is.
pub fn operation_is_read_only(op: &Operation) -> bool {
    if op.is_composite() {
        return op
            .steps()
            .map(|steps| steps.iter().all(operation_is_read_only))
            .unwrap_or(false);
    }
    matches!(
        op.name(),
        READ_ATTRIBUTE | READ_RESOURCE | READ_CHILDREN_NAMES | READ_CHILDREN_TYPES | READ_RESOURCE_DESCRIPTION
    )
}

/// Registers every built-in global handler on `registry`.
pub fn register_standard_ops(registry: &HandlerRegistry) {
    registry.register(HandlerSpec::mutating(ADD), Arc::new(AddHandler));
    registry.register(HandlerSpec::mutating(REMOVE), Arc::new(RemoveHandler));
    registry.register(HandlerSpec::mutating(WRITE_ATTRIBUTE), Arc::new(WriteAttributeHandler));
    registry.register(HandlerSpec::mutating(UNDEFINE_ATTRIBUTE), Arc::new(UndefineAttributeHandler));
    registry.register(HandlerSpec::read_only(READ_ATTRIBUTE), Arc::new(ReadAttributeHandler));
    registry.register(HandlerSpec::read_only(READ_RESOURCE), Arc::new(ReadResourceHandler));
    registry.register(HandlerSpec::read_only(READ_CHILDREN_NAMES), Arc::new(ReadChildrenNamesHandler));
    registry.register(HandlerSpec::read_only(READ_CHILDREN_TYPES), Arc::new(ReadChildrenTypesHandler));
    registry.register(
        HandlerSpec::read_only(READ_RESOURCE_DESCRIPTION).no_wildcard_expansion(),
        Arc::new(ReadResourceDescriptionHandler),
    );
}

/// Creates a registry pre-loaded with the built-in handlers.
pub fn standard_registry() -> HandlerRegistry {
    let registry = HandlerRegistry::new();
    register_standard_ops(&registry);
    registry
}

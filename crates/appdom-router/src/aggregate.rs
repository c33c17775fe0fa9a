//! Merging per-target responses into the aggregate response tree.

use appdom_exec::Response;
use appdom_model::ModelValue;

use crate::dispatch::DispatchOutcome;

/// Builds the `server-groups → group → host → server → response` structure
/// from dispatch outcomes. Outcomes without a group or server context (host
/// controller dispatches) are skipped; local routing failures render as
/// failed responses with the router error as the failure description.
pub fn aggregate_group_responses(outcomes: &[DispatchOutcome]) -> ModelValue {
    let mut groups = ModelValue::object();
    for outcome in outcomes {
        let (Some(group), Some(server)) = (&outcome.target.group, &outcome.target.server) else {
            continue;
        };
        let response_value = match &outcome.result {
            Ok(response) => response.to_value(),
            Err(err) => Response::failed_msg(err.to_string()).to_value(),
        };

        let mut response_node = ModelValue::object();
        response_node.set("response", response_value).unwrap();

        groups
            .entry_object(group)
            .and_then(|g| g.entry_object("host"))
            .and_then(|h| h.entry_object(&outcome.target.host))
            .and_then(|s| s.set(server, response_node))
            .expect("aggregate tree is always object-shaped");
    }

    let mut out = ModelValue::object();
    out.set("server-groups", groups).unwrap();
    out
}

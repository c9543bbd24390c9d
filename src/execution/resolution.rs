//! Turning one function invocation into a return value.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::warn;

use crate::error::ParleyError;
use crate::functions::{Function, FunctionCatalog};
use crate::types::{FunctionApproval, FunctionInvocation, FunctionReturnValue};

pub const DECLINED_MESSAGE: &str = "user manually declined function invocation request";

const APPROVAL_FAILED_PREFIX: &str =
    "user wanted to manually approve this request, but an error happened during approval: ";

/// Resolve one invocation against the request's functions.
///
/// Returns `Ok(None)` when nothing in the catalog can run the invocation;
/// the caller owns it then. Approval denials and implementation failures
/// (including panics) come back as unsuccessful return values. Only a
/// missing approval callback is an error.
pub async fn resolve_invocation(
    invocation: FunctionInvocation,
    functions: &[Function],
    approval: Option<&FunctionApproval>,
) -> Result<Option<FunctionReturnValue>, ParleyError> {
    let catalog = FunctionCatalog::new(functions);
    let Some(function) = catalog.get(&invocation.name) else {
        return Ok(None);
    };
    if !function.has_implementation() {
        return Ok(None);
    }

    if function.requires_explicit_approval() {
        let approval = approval.ok_or_else(|| {
            ParleyError::Configuration(format!(
                "function '{}' requires explicit approval but the request has no approval callback",
                function.name()
            ))
        })?;

        let decision = AssertUnwindSafe(approval.approve(invocation.clone(), function.clone()))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(ParleyError::Configuration(panic_message(payload.as_ref())))
            });

        match decision {
            Ok(true) => {}
            Ok(false) => {
                return Ok(Some(FunctionReturnValue::failed(
                    invocation.id,
                    DECLINED_MESSAGE,
                )))
            }
            Err(err) => {
                return Ok(Some(FunctionReturnValue::failed(
                    invocation.id,
                    format!("{APPROVAL_FAILED_PREFIX}{err}"),
                )))
            }
        }
    }

    let Some(call) = function.invoke(invocation.parameters.clone()) else {
        return Ok(None);
    };

    let outcome = AssertUnwindSafe(call)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| {
            Err(ParleyError::function(
                function.name(),
                format!("panicked: {}", panic_message(payload.as_ref())),
            ))
        });

    match outcome {
        Ok(result) => Ok(Some(FunctionReturnValue::succeeded(invocation.id, result))),
        Err(err) => {
            warn!(function = function.name(), error = %err, "function invocation failed");
            Ok(Some(FunctionReturnValue::failed(invocation.id, failure_text(err))))
        }
    }
}

/// Text the model sees for a failed implementation: the failure's own
/// message, without the error-kind prefix.
fn failure_text(err: ParleyError) -> String {
    match err {
        ParleyError::InvalidArgument(message)
        | ParleyError::FunctionExecution { message, .. } => message,
        other => other.to_string(),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

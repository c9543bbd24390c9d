//! The vendor-neutral chat request.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bon::Builder;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::message::{FunctionInvocation, FunctionReturnValue, Message};
use crate::error::ParleyError;
use crate::functions::Function;

/// Requested response format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Json,
}

type ApprovalFn = dyn Fn(FunctionInvocation, Function) -> BoxFuture<'static, Result<bool, ParleyError>>
    + Send
    + Sync;

/// Async approval callback consulted before running functions that require
/// explicit approval.
#[derive(Clone)]
pub struct FunctionApproval(Arc<ApprovalFn>);

impl FunctionApproval {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(FunctionInvocation, Function) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, ParleyError>> + Send + 'static,
    {
        Self(Arc::new(move |invocation, function| {
            Box::pin(f(invocation, function))
        }))
    }

    /// Approval callback that answers every request the same way.
    pub fn always(approved: bool) -> Self {
        Self::new(move |_, _| async move { Ok(approved) })
    }

    pub async fn approve(
        &self,
        invocation: FunctionInvocation,
        function: Function,
    ) -> Result<bool, ParleyError> {
        (self.0)(invocation, function).await
    }
}

impl fmt::Debug for FunctionApproval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FunctionApproval(..)")
    }
}

/// A request for one execution.
///
/// Requests are values: continuing a conversation builds a new request with
/// [`ChatRequest::continued_with`] rather than editing this one.
#[derive(Debug, Clone, Builder)]
pub struct ChatRequest {
    #[builder(into)]
    pub system_prompt: Option<String>,
    /// Conversation so far, in order.
    pub messages: Vec<Message>,
    pub response_format: Option<ResponseFormat>,
    #[builder(default)]
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    #[builder(default)]
    pub functions: Vec<Function>,
    /// Forces the model to call exactly this function.
    pub mandatory_function: Option<Function>,
    /// Opaque end-user id forwarded for vendor-side abuse tracking.
    #[builder(into)]
    pub end_user_identifier: Option<String>,
    pub function_approval: Option<FunctionApproval>,
}

impl ChatRequest {
    /// Shorthand for a request with only a message list.
    pub fn new(messages: Vec<Message>) -> Self {
        Self::builder().messages(messages).build()
    }

    /// Build the request for the next round: this request's messages, then
    /// everything the model produced, then the function results.
    pub fn continued_with(
        &self,
        received: &[Message],
        return_values: &[FunctionReturnValue],
    ) -> ChatRequest {
        let mut next = self.clone();
        next.messages.reserve(received.len() + return_values.len());
        next.messages.extend(received.iter().cloned());
        next.messages
            .extend(return_values.iter().cloned().map(Message::FunctionReturnValue));
        next
    }

    pub fn is_json(&self) -> bool {
        self.response_format == Some(ResponseFormat::Json)
    }
}

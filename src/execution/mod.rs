//! Execution orchestrator.
//!
//! An execution drives a [`ProtocolAdapter`] in rounds. Each round is one
//! adapter pass followed by resolution of the function invocations it
//! produced. When at least one invocation resolves, the next round starts
//! from [`ChatRequest::continued_with`]; otherwise the execution ends.

pub mod handle;
pub mod resolution;

pub use handle::ExecutionInProgress;
pub use resolution::resolve_invocation;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ParleyError, SharedError};
use crate::functions::Function;
use crate::provider::{ProtocolAdapter, ResponseSink};
use crate::types::{ChatRequest, FunctionApproval, FunctionReturnValue, Message};

/// Knobs for one execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Fail with [`ParleyError::RoundLimitExceeded`] instead of starting
    /// round `max_rounds + 1`. Unbounded when `None`.
    pub max_rounds: Option<usize>,
}

impl ExecutionOptions {
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }
}

/// Start an execution in the background and return its handle immediately.
///
/// Must be called from within a tokio runtime.
pub fn execute(
    adapter: Arc<dyn ProtocolAdapter>,
    request: ChatRequest,
    cancel: CancellationToken,
) -> ExecutionInProgress {
    execute_with(adapter, request, cancel, ExecutionOptions::default())
}

/// [`execute`] with explicit options.
pub fn execute_with(
    adapter: Arc<dyn ProtocolAdapter>,
    request: ChatRequest,
    cancel: CancellationToken,
    options: ExecutionOptions,
) -> ExecutionInProgress {
    let id = Uuid::new_v4();
    let cancel = cancel.child_token();
    let (text_tx, text_rx) = mpsc::unbounded_channel();
    let (message_tx, message_rx) = mpsc::unbounded_channel();

    let orchestrator = Orchestrator {
        id,
        adapter,
        options,
        cancel: cancel.clone(),
        text_tx,
        message_tx,
    };

    let task = tokio::spawn(async move {
        let result = orchestrator.run_round(request, 1).await;
        orchestrator.finish(result)
    });

    ExecutionInProgress::new(id, text_rx, message_rx, cancel, task)
}

type TextSender = UnboundedSender<Result<String, SharedError>>;
type MessageSender = UnboundedSender<Result<Message, SharedError>>;

struct Orchestrator {
    id: Uuid,
    adapter: Arc<dyn ProtocolAdapter>,
    options: ExecutionOptions,
    cancel: CancellationToken,
    text_tx: TextSender,
    message_tx: MessageSender,
}

impl Orchestrator {
    /// Run one round, then recurse with the continued request if any
    /// invocation resolved.
    fn run_round(&self, request: ChatRequest, round: usize) -> BoxFuture<'_, Result<(), ParleyError>> {
        Box::pin(async move {
            if let Some(max_rounds) = self.options.max_rounds {
                if round > max_rounds {
                    return Err(ParleyError::RoundLimitExceeded { max_rounds });
                }
            }
            if self.cancel.is_cancelled() {
                return Err(ParleyError::Canceled);
            }

            debug!(
                execution_id = %self.id,
                round,
                provider = self.adapter.provider_name(),
                model = self.adapter.identifier(),
                "starting round"
            );

            let mut sink = RoundSink::new(
                &self.text_tx,
                &self.message_tx,
                Arc::new(request.functions.clone()),
                request.function_approval.clone(),
            );
            self.adapter.run(&request, &mut sink, &self.cancel).await?;

            let RoundSink {
                received,
                mut resolutions,
                invocations,
                ..
            } = sink;

            debug!(execution_id = %self.id, round, invocations, "adapter pass finished");
            if invocations == 0 {
                return Ok(());
            }

            let mut resolved = Vec::with_capacity(invocations);
            loop {
                // Dropping the set on cancellation aborts what is still running.
                let joined = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(ParleyError::Canceled),
                    next = resolutions.join_next() => next,
                };
                let Some(joined) = joined else {
                    break;
                };
                let (index, outcome) = joined.map_err(|e| {
                    ParleyError::Configuration(format!("function resolution task failed: {e}"))
                })?;
                if let Some(return_value) = outcome? {
                    resolved.push((index, return_value));
                }
            }
            resolved.sort_by_key(|(index, _)| *index);
            let return_values: Vec<FunctionReturnValue> =
                resolved.into_iter().map(|(_, rv)| rv).collect();

            if return_values.is_empty() {
                return Ok(());
            }
            if self.cancel.is_cancelled() {
                return Err(ParleyError::Canceled);
            }

            for return_value in &return_values {
                let _ = self
                    .message_tx
                    .send(Ok(Message::FunctionReturnValue(return_value.clone())));
            }

            let next = request.continued_with(&received, &return_values);
            self.run_round(next, round + 1).await
        })
    }

    fn finish(&self, result: Result<(), ParleyError>) -> Result<(), SharedError> {
        match result {
            Ok(()) => {
                debug!(execution_id = %self.id, "execution complete");
                Ok(())
            }
            Err(err) if err.is_cancellation() => {
                debug!(execution_id = %self.id, "execution canceled");
                Ok(())
            }
            Err(err) => {
                debug!(execution_id = %self.id, error = %err, "execution failed");
                let shared = SharedError::new(err);
                let _ = self.text_tx.send(Err(shared.clone()));
                let _ = self.message_tx.send(Err(shared.clone()));
                Err(shared)
            }
        }
    }
}

type Resolution = (usize, Result<Option<FunctionReturnValue>, ParleyError>);

/// Records one pass's output, forwards it to the caller, and starts
/// resolving function invocations as soon as they complete.
struct RoundSink<'a> {
    text_tx: &'a TextSender,
    message_tx: &'a MessageSender,
    functions: Arc<Vec<Function>>,
    approval: Option<FunctionApproval>,
    received: Vec<Message>,
    resolutions: JoinSet<Resolution>,
    invocations: usize,
}

impl<'a> RoundSink<'a> {
    fn new(
        text_tx: &'a TextSender,
        message_tx: &'a MessageSender,
        functions: Arc<Vec<Function>>,
        approval: Option<FunctionApproval>,
    ) -> Self {
        Self {
            text_tx,
            message_tx,
            functions,
            approval,
            received: Vec::new(),
            resolutions: JoinSet::new(),
            invocations: 0,
        }
    }
}

#[async_trait]
impl<'a> ResponseSink for RoundSink<'a> {
    async fn write_text_fragment(&mut self, fragment: String) {
        let _ = self.text_tx.send(Ok(fragment));
    }

    async fn write_complete_message(&mut self, message: Message) {
        if let Message::FunctionInvocation(invocation) = &message {
            let index = self.invocations;
            self.invocations += 1;

            let invocation = invocation.clone();
            let functions = Arc::clone(&self.functions);
            let approval = self.approval.clone();
            self.resolutions.spawn(async move {
                let outcome = resolve_invocation(invocation, &functions, approval.as_ref()).await;
                (index, outcome)
            });
        }

        self.received.push(message.clone());
        let _ = self.message_tx.send(Ok(message));
    }
}

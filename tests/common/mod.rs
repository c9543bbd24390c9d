//! Shared test helpers and scripted adapter.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use parley::error::{ParleyError, SharedError};
use parley::execution::ExecutionInProgress;
use parley::models::capabilities::ModelCapabilities;
use parley::provider::{ProtocolAdapter, ResponseSink};
use parley::types::{ChatRequest, Message};

/// One scripted action inside a pass.
pub enum Step {
    Fragment(String),
    Message(Message),
    /// Emit a fragment and the matching assistant message.
    Text(String),
    Fail(ParleyError),
    /// Block like an in-flight HTTP call until cancelled.
    Hang,
}

/// An adapter that plays back one scripted pass per round.
///
/// Passes beyond the script produce no output.
pub struct ScriptedAdapter {
    capabilities: ModelCapabilities,
    passes: Mutex<VecDeque<Vec<Step>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self {
            capabilities: ModelCapabilities::full(),
            passes: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_pass(self, steps: Vec<Step>) -> Self {
        self.passes.lock().unwrap().push_back(steps);
        self
    }

    /// Requests seen so far, one per round.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn rounds(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ProtocolAdapter for ScriptedAdapter {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn identifier(&self) -> &str {
        "scripted-model"
    }

    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }

    async fn run(
        &self,
        request: &ChatRequest,
        sink: &mut dyn ResponseSink,
        cancel: &CancellationToken,
    ) -> Result<(), ParleyError> {
        self.requests.lock().unwrap().push(request.clone());
        let steps = self.passes.lock().unwrap().pop_front().unwrap_or_default();

        for step in steps {
            match step {
                Step::Fragment(text) => sink.write_text_fragment(text).await,
                Step::Message(message) => sink.write_complete_message(message).await,
                Step::Text(text) => {
                    sink.write_text_fragment(text.clone()).await;
                    sink.write_complete_message(Message::assistant(text)).await;
                }
                Step::Fail(err) => return Err(err),
                Step::Hang => {
                    cancel.cancelled().await;
                    return Err(ParleyError::Canceled);
                }
            }
        }
        Ok(())
    }
}

/// Drain both streams concurrently.
pub async fn drain(
    execution: &mut ExecutionInProgress,
) -> (
    Vec<Result<String, SharedError>>,
    Vec<Result<Message, SharedError>>,
) {
    let fragments = execution.text_fragments();
    let messages = execution.complete_messages();
    tokio::join!(fragments.collect::<Vec<_>>(), messages.collect::<Vec<_>>())
}

/// Unwrap every item, panicking on the first error.
pub fn ok_items<T: std::fmt::Debug>(items: Vec<Result<T, SharedError>>) -> Vec<T> {
    items
        .into_iter()
        .map(|item| item.expect("stream item should be Ok"))
        .collect()
}

/// Build an SSE body from JSON events.
pub fn sse_body(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .map(|event| format!("data: {event}\n\n"))
        .collect()
}

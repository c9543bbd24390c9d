//! Caller-side handle of a running execution.

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ParleyError, SharedError};
use crate::types::Message;

use super::resolution::panic_message;

pub(crate) type TextReceiver = UnboundedReceiver<Result<String, SharedError>>;
pub(crate) type MessageReceiver = UnboundedReceiver<Result<Message, SharedError>>;

/// A running execution.
///
/// Both output streams can be drained concurrently and independently. A
/// failure ends each stream with the error as its last item; cancellation
/// just ends them. Dropping the handle cancels the execution, so keep it
/// alive while the streams are consumed.
pub struct ExecutionInProgress {
    id: Uuid,
    text_rx: Option<TextReceiver>,
    message_rx: Option<MessageReceiver>,
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<(), SharedError>>>,
}

impl ExecutionInProgress {
    pub(crate) fn new(
        id: Uuid,
        text_rx: TextReceiver,
        message_rx: MessageReceiver,
        cancel: CancellationToken,
        task: JoinHandle<Result<(), SharedError>>,
    ) -> Self {
        Self {
            id,
            text_rx: Some(text_rx),
            message_rx: Some(message_rx),
            cancel,
            task: Some(task),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Assistant text, piece by piece, across all rounds.
    ///
    /// The stream can be taken once; later calls return an empty stream.
    pub fn text_fragments(&mut self) -> BoxStream<'static, Result<String, SharedError>> {
        match self.text_rx.take() {
            Some(rx) => UnboundedReceiverStream::new(rx).boxed(),
            None => stream::empty().boxed(),
        }
    }

    /// Chat turns, function invocations and function return values, in order.
    ///
    /// The stream can be taken once; later calls return an empty stream.
    pub fn complete_messages(&mut self) -> BoxStream<'static, Result<Message, SharedError>> {
        match self.message_rx.take() {
            Some(rx) => UnboundedReceiverStream::new(rx).boxed(),
            None => stream::empty().boxed(),
        }
    }

    /// Request cancellation without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel the execution and wait for its task to stop.
    ///
    /// Cancellation is not an error; any other failure is returned.
    pub async fn dispose(mut self) -> Result<(), SharedError> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the execution to finish on its own.
    pub async fn wait(mut self) -> Result<(), SharedError> {
        self.join().await
    }

    /// Drain the text stream into one string.
    pub async fn collect_text(mut self) -> Result<String, SharedError> {
        let mut fragments = self.text_fragments();
        let mut text = String::new();
        while let Some(fragment) = fragments.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }

    /// Drain the complete-message stream.
    pub async fn collect_messages(mut self) -> Result<Vec<Message>, SharedError> {
        let mut messages = self.complete_messages();
        let mut out = Vec::new();
        while let Some(message) = messages.next().await {
            out.push(message?);
        }
        Ok(out)
    }

    async fn join(&mut self) -> Result<(), SharedError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(Err(err)) if err.is_cancellation() => Ok(()),
            Ok(result) => result,
            Err(join_err) if join_err.is_cancelled() => Ok(()),
            Err(join_err) => {
                let message = match join_err.try_into_panic() {
                    Ok(payload) => panic_message(payload.as_ref()),
                    Err(err) => err.to_string(),
                };
                Err(SharedError::new(ParleyError::Configuration(format!(
                    "execution task failed: {message}"
                ))))
            }
        }
    }
}

impl Drop for ExecutionInProgress {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for ExecutionInProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionInProgress")
            .field("id", &self.id)
            .field("canceled", &self.cancel.is_cancelled())
            .finish()
    }
}

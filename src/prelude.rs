//! Convenience re-exports for common use.

pub use crate::config::ParleyConfig;
pub use crate::error::{ParleyError, Result, SharedError};
pub use crate::execution::{execute, execute_with, ExecutionInProgress, ExecutionOptions};
pub use crate::functions::{Function, FunctionArguments, FunctionParameters};
pub use crate::models::LanguageModel;
pub use crate::provider::{create_adapter, ProtocolAdapter, ResponseSink};
pub use crate::types::{
    ChatMessage, ChatRequest, FunctionApproval, FunctionInvocation, FunctionReturnValue,
    ImageMessage, Message, ResponseFormat, Role,
};
pub use tokio_util::sync::CancellationToken;

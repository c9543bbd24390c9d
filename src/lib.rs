//! Parley: a streaming execution engine for chat-style language model APIs.
//!
//! A [`ChatRequest`](types::ChatRequest) is sent through a vendor
//! [`ProtocolAdapter`](provider::ProtocolAdapter). The resulting
//! [`ExecutionInProgress`](execution::ExecutionInProgress) exposes two
//! streams: text fragments as they arrive and complete messages as they are
//! assembled. Function invocations issued by the model are resolved against
//! the request's functions and fed back until the model stops calling them.
//!
//! # Quick Start
//!
//! ```no_run
//! use parley::prelude::*;
//! use futures::StreamExt;
//!
//! # async fn example() -> parley::error::Result<()> {
//! let model: LanguageModel = "anthropic:claude-3-5-sonnet-20240620".parse()?;
//! let adapter = create_adapter(&model, ParleyConfig::global())?;
//!
//! let request = ChatRequest::new(vec![Message::user("Hello!")]);
//! let mut execution = execute(adapter, request, CancellationToken::new());
//!
//! let mut fragments = execution.text_fragments();
//! while let Some(fragment) = fragments.next().await {
//!     match fragment {
//!         Ok(text) => print!("{text}"),
//!         Err(err) => eprintln!("{err}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod functions;
pub mod models;
pub mod prelude;
pub mod provider;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;

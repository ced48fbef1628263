//! Streaming client for Letta agent conversations.
//!
//! Issues a long-lived streaming request to an agent's message endpoint,
//! decodes the incrementally-delivered frame protocol, classifies event
//! payloads, forwards a policy-filtered subset to a caller-supplied sink,
//! and assembles the final answer. Connection establishment is retried with
//! bounded backoff; optionally every raw frame, event, and error is captured
//! to an append-only JSONL log for replay.
//!
//! # Builder-first usage
//!
//! ```no_run
//! use letta_pipe::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = Client::builder()
//!     .config(LettaConfig::from_env()?)
//!     .build()?;
//!
//! let answer = client
//!     .run(vec![Message::user("What did we discuss yesterday?")])
//!     .collect_text()
//!     .await?;
//!
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```
//!
//! For streaming consumption, `start_stream()` yields normalized
//! [`StreamEvent`]s in wire order; attach an [`EventSink`] to receive
//! status, reasoning, usage, and warning events alongside the answer.

/// Client entry point and builder.
pub mod client;
/// Configuration snapshots and display policy resolution.
pub mod config;
/// Append-only JSONL diagnostic capture.
pub mod diagnostics;
/// Public error types.
pub mod errors;
/// Classification of data frame payloads.
pub mod event;
/// Byte-stream framing.
pub mod frame;
/// Conversation messages.
pub mod message;
/// Common imports for typical usage.
pub mod prelude;
/// Wire request construction.
pub mod request;
/// Run builder, streaming handle, and cancellation handle.
pub mod run;
/// Caller-supplied event sink contracts.
pub mod sink;
/// Normalized public stream events and run outcomes.
pub mod stream;
/// Byte transport contract, HTTP implementation, and retry policy.
pub mod transport;

pub use client::{Client, ClientBuilder};
pub use config::{DiagnosticsConfig, DisplayPolicy, DisplaySettings, LettaConfig};
pub use diagnostics::DiagnosticLog;
pub use errors::{ClientError, RunFailure, TransportError};
pub use event::{AgentEvent, classify};
pub use frame::{Frame, FrameDecoder, FrameKind};
pub use message::{Message, MessageRole};
pub use request::StreamRequest;
pub use run::{AbortHandle, RunBuilder, RunStream};
pub use sink::{ChannelSink, EventSink, SinkEvent};
pub use stream::{RunOutcome, RunStatus, StreamEvent};
pub use transport::{ByteStream, ByteTransport, HttpTransport, RetryPolicy, RetryingTransport};

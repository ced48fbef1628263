//! Common imports for typical client usage.
//!
//! This module intentionally exports the most frequently used builder and
//! runtime types so examples and application code need fewer import lines.
pub use crate::{
    AbortHandle, ChannelSink, Client, ClientBuilder, ClientError, DisplaySettings, EventSink,
    LettaConfig, Message, MessageRole, RunFailure, RunOutcome, RunStatus, RunStream, SinkEvent,
    StreamEvent,
};

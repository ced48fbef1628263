use std::sync::Arc;

use futures::StreamExt as _;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use crate::client::ClientInner;
use crate::config::{DisplayPolicy, DisplaySettings};
use crate::diagnostics::DiagnosticLog;
use crate::errors::{ClientError, RunFailure, establish_failure};
use crate::event::{AgentEvent, classify};
use crate::frame::{FrameDecoder, FrameKind};
use crate::message::Message;
use crate::request::StreamRequest;
use crate::sink::{EventSink, SinkEvent};
use crate::stream::{RunOutcome, StreamEvent};
use crate::transport::ByteTransport;

/// Handle used to request cancellation of a running stream.
///
/// Cancellation closes the underlying connection promptly and surfaces as a
/// terminal `StreamEvent::Error` with `RunFailure::Cancelled`. No sink
/// events are delivered after an abort.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// Builder for configuring and starting a single streaming run.
pub struct RunBuilder {
    inner: Arc<ClientInner>,
    conversation: Vec<Message>,
    sink: Option<Arc<dyn EventSink>>,
    overrides: DisplaySettings,
    stream_steps: bool,
    stream_tokens: bool,
    buffer_capacity: usize,
}

impl RunBuilder {
    pub(crate) fn new(inner: Arc<ClientInner>, conversation: Vec<Message>) -> Self {
        Self {
            inner,
            conversation,
            sink: None,
            overrides: DisplaySettings::default(),
            stream_steps: true,
            stream_tokens: true,
            buffer_capacity: 128,
        }
    }

    /// Attaches an event sink. Without one, no events are forwarded and the
    /// answer is still accumulated.
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Per-run display overrides, merged with the system settings. Overrides
    /// narrow, never widen.
    pub fn display_overrides(mut self, overrides: DisplaySettings) -> Self {
        self.overrides = overrides;
        self
    }

    /// Whether to request step-level events from the backend.
    pub fn stream_steps(mut self, stream_steps: bool) -> Self {
        self.stream_steps = stream_steps;
        self
    }

    /// Whether to request token-level deltas from the backend.
    pub fn stream_tokens(mut self, stream_tokens: bool) -> Self {
        self.stream_tokens = stream_tokens;
        self
    }

    /// Bounded event buffer size between the run task and the consumer.
    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Validates the builder state and starts a streaming run.
    pub async fn start_stream(self) -> Result<RunStream, ClientError> {
        if self.conversation.is_empty() {
            return Err(ClientError::Validation(
                "at least one conversation message is required".into(),
            ));
        }
        if self
            .conversation
            .last()
            .is_some_and(|m| m.content.trim().is_empty())
        {
            return Err(ClientError::Validation(
                "message content must not be empty".into(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(ClientError::Validation(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }

        let run_id = uuid::Uuid::new_v4();
        let policy = DisplayPolicy::resolve(&self.inner.config.display, &self.overrides);
        let request = StreamRequest::from_conversation(
            self.inner.config.stream_url(),
            &self.conversation,
            self.stream_steps,
            self.stream_tokens,
        );
        debug!(
            run_id = %run_id,
            agent_id = %self.inner.config.agent_id,
            "starting agent message stream"
        );

        let (tx, rx) = mpsc::channel(self.buffer_capacity);
        let (final_tx, final_rx) = oneshot::channel();
        let (abort_tx, abort_rx) = watch::channel(false);
        let abort_handle = AbortHandle { tx: abort_tx };

        let ctx = RunContext {
            run_id,
            agent_id: self.inner.config.agent_id.clone(),
            request,
            transport: self.inner.transport.clone(),
            sink: self.sink,
            policy,
            diagnostics: self.inner.diagnostics.clone(),
        };
        tokio::spawn(run_task(ctx, tx, final_tx, abort_rx));

        Ok(RunStream {
            run_id,
            rx,
            final_rx,
            abort_handle,
            saw_terminal: false,
        })
    }

    /// Runs to completion and returns the final outcome. A failed run still
    /// carries the partial answer accumulated before the failure.
    pub async fn collect(self) -> Result<RunOutcome, ClientError> {
        self.start_stream().await?.finish().await
    }

    /// Runs to completion and returns the answer text, failing the call if
    /// the run failed.
    pub async fn collect_text(self) -> Result<String, ClientError> {
        self.collect().await?.into_result()
    }
}

/// Streaming handle returned by `RunBuilder::start_stream`.
pub struct RunStream {
    run_id: uuid::Uuid,
    rx: mpsc::Receiver<StreamEvent>,
    final_rx: oneshot::Receiver<RunOutcome>,
    abort_handle: AbortHandle,
    saw_terminal: bool,
}

impl RunStream {
    pub fn run_id(&self) -> uuid::Uuid {
        self.run_id
    }

    /// Returns a handle that can cancel the run.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for and returns the next stream event, `None` once closed.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        let event = self.rx.recv().await;
        if let Some(StreamEvent::Completed { .. } | StreamEvent::Error { .. }) = &event {
            self.saw_terminal = true;
        }
        event
    }

    /// Drains remaining events (if needed) and returns the final outcome.
    pub async fn finish(mut self) -> Result<RunOutcome, ClientError> {
        while !self.saw_terminal {
            match self.rx.recv().await {
                Some(StreamEvent::Completed { .. } | StreamEvent::Error { .. }) => {
                    self.saw_terminal = true;
                }
                Some(_) => {}
                None => break,
            }
        }
        match self.final_rx.await {
            Ok(outcome) => Ok(outcome),
            Err(_) => Err(ClientError::protocol_msg(
                "run task ended without a final outcome",
            )),
        }
    }
}

struct RunContext {
    run_id: uuid::Uuid,
    agent_id: String,
    request: StreamRequest,
    transport: Arc<dyn ByteTransport>,
    sink: Option<Arc<dyn EventSink>>,
    policy: DisplayPolicy,
    diagnostics: Option<Arc<DiagnosticLog>>,
}

impl RunContext {
    fn diag(&self, kind: &str, content: serde_json::Value) {
        if let Some(log) = &self.diagnostics {
            log.record(kind, content);
        }
    }

    async fn forward(&self, event: SinkEvent) {
        if self.policy.show_events
            && let Some(sink) = &self.sink
        {
            sink.emit(event).await;
        }
    }
}

async fn send_event(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> bool {
    tx.send(event).await.is_ok()
}

async fn finish_completed(
    ctx: &RunContext,
    tx: &mpsc::Sender<StreamEvent>,
    final_tx: oneshot::Sender<RunOutcome>,
    answer: String,
) {
    debug!(run_id = %ctx.run_id, "agent message stream completed");
    ctx.diag("completed", serde_json::Value::String(answer.clone()));
    ctx.forward(SinkEvent::completed()).await;
    let _ = send_event(
        tx,
        StreamEvent::Completed {
            run_id: ctx.run_id,
            text: answer.clone(),
        },
    )
    .await;
    let _ = final_tx.send(RunOutcome::completed(answer));
}

async fn finish_failed(
    ctx: &RunContext,
    tx: &mpsc::Sender<StreamEvent>,
    final_tx: oneshot::Sender<RunOutcome>,
    answer: String,
    failure: RunFailure,
) {
    ctx.diag(
        "error",
        serde_json::json!({ "error": failure.to_string() }),
    );
    ctx.forward(SinkEvent::Error {
        message: failure.to_string(),
    })
    .await;
    let _ = send_event(
        tx,
        StreamEvent::Error {
            run_id: ctx.run_id,
            error: failure.clone(),
            partial: answer.clone(),
        },
    )
    .await;
    let _ = final_tx.send(RunOutcome::failed(answer, failure));
}

async fn run_task(
    ctx: RunContext,
    tx: mpsc::Sender<StreamEvent>,
    final_tx: oneshot::Sender<RunOutcome>,
    mut abort_rx: watch::Receiver<bool>,
) {
    let run_id = ctx.run_id;

    if !send_event(
        &tx,
        StreamEvent::RunStarted {
            run_id,
            agent_id: ctx.agent_id.clone(),
        },
    )
    .await
    {
        let _ = final_tx.send(RunOutcome::failed(
            String::new(),
            RunFailure::Protocol {
                message: "run stream receiver dropped before start".into(),
            },
        ));
        return;
    }
    ctx.forward(SinkEvent::processing()).await;

    let mut stream = match ctx.transport.open(&ctx.request).await {
        Ok(stream) => stream,
        Err(err) => {
            debug!(run_id = %run_id, error = %err, "failed to establish agent message stream");
            let failure = establish_failure(&err);
            finish_failed(&ctx, &tx, final_tx, String::new(), failure).await;
            return;
        }
    };

    let mut decoder = FrameDecoder::default();
    let mut answer = String::new();
    let mut seq = 0u64;
    let mut abort_open = true;

    loop {
        tokio::select! {
            changed = abort_rx.changed(), if abort_open => {
                match changed {
                    Ok(()) if *abort_rx.borrow() => {
                        debug!(run_id = %run_id, "run aborted by caller");
                        // Release the connection before reporting; no sink
                        // events are delivered past this point.
                        drop(stream);
                        let failure = RunFailure::Cancelled;
                        let _ = send_event(&tx, StreamEvent::Error {
                            run_id,
                            error: failure.clone(),
                            partial: answer.clone(),
                        }).await;
                        let _ = final_tx.send(RunOutcome::failed(answer, failure));
                        return;
                    }
                    Ok(()) => {}
                    Err(_) => abort_open = false,
                }
            }
            next = stream.next() => match next {
                Some(Ok(chunk)) => {
                    for frame in decoder.push_chunk(&chunk) {
                        ctx.diag("raw_chunk", serde_json::Value::String(frame.raw.clone()));
                        match frame.kind {
                            FrameKind::Discard => continue,
                            FrameKind::Done => {
                                ctx.diag("done_marker", serde_json::Value::String("[DONE]".into()));
                                finish_completed(&ctx, &tx, final_tx, answer).await;
                                return;
                            }
                            FrameKind::Data => {
                                let event = classify(frame.payload().unwrap_or_default());
                                match event {
                                    AgentEvent::AssistantText { content } => {
                                        if content.is_empty() {
                                            continue;
                                        }
                                        ctx.diag(
                                            "assistant_message",
                                            serde_json::Value::String(content.clone()),
                                        );
                                        answer.push_str(&content);
                                        ctx.forward(SinkEvent::Message {
                                            content: content.clone(),
                                        })
                                        .await;
                                        let sent = send_event(&tx, StreamEvent::OutputDelta {
                                            run_id,
                                            seq,
                                            text: content,
                                        })
                                        .await;
                                        seq = seq.saturating_add(1);
                                        if !sent {
                                            let _ = final_tx.send(RunOutcome::failed(
                                                answer,
                                                RunFailure::Protocol {
                                                    message:
                                                        "run stream receiver dropped during output"
                                                            .into(),
                                                },
                                            ));
                                            return;
                                        }
                                    }
                                    AgentEvent::UsageStatistics { stats } => {
                                        ctx.diag("usage_stats", stats.clone());
                                        if ctx.policy.show_usage {
                                            ctx.forward(SinkEvent::Usage(stats)).await;
                                        }
                                    }
                                    AgentEvent::ReasoningStep { step, content } => {
                                        ctx.diag(
                                            "reasoning",
                                            serde_json::json!({ "step": step, "content": content }),
                                        );
                                        if ctx.policy.show_reasoning {
                                            ctx.forward(SinkEvent::Reasoning { step, content }).await;
                                        }
                                    }
                                    AgentEvent::Unrecognized { message_type, payload } => {
                                        debug!(
                                            run_id = %run_id,
                                            message_type = %message_type,
                                            "ignoring unrecognized event"
                                        );
                                        ctx.diag(
                                            "unrecognized",
                                            serde_json::json!({
                                                "message_type": message_type,
                                                "payload": payload,
                                            }),
                                        );
                                    }
                                    AgentEvent::ParseError { raw, message } => {
                                        ctx.diag(
                                            "parse_error",
                                            serde_json::json!({ "error": message, "chunk": raw }),
                                        );
                                        ctx.forward(SinkEvent::Warning {
                                            message: "failed to parse frame payload".into(),
                                            raw,
                                            detail: message,
                                        })
                                        .await;
                                    }
                                }
                            }
                        }
                    }
                }
                Some(Err(err)) => {
                    debug!(run_id = %run_id, error = %err, "agent message stream read failed");
                    let failure = RunFailure::Stream {
                        message: err.to_string(),
                    };
                    finish_failed(&ctx, &tx, final_tx, answer, failure).await;
                    return;
                }
                None => {
                    finish_completed(&ctx, &tx, final_tx, answer).await;
                    return;
                }
            }
        }
    }
}

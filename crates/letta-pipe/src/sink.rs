use tokio::sync::mpsc;

/// Event forwarded to a caller-supplied sink, one call per event, in wire
/// order.
///
/// Serializes as `{"type": ..., "data": {...}}` so a sink can hand events to
/// chat front-ends unchanged.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SinkEvent {
    /// Progress marker; `done` clears the status line.
    Status {
        status: String,
        description: String,
        done: bool,
    },
    /// One answer-content increment.
    Message { content: String },
    /// Token/step accounting record, as received.
    Usage(serde_json::Value),
    /// One reasoning step.
    Reasoning { step: String, content: String },
    /// Recovered local problem, e.g. an unparseable frame.
    Warning {
        message: String,
        raw: String,
        detail: String,
    },
    /// Terminal run error.
    Error { message: String },
}

impl SinkEvent {
    pub(crate) fn processing() -> Self {
        Self::Status {
            status: "processing".into(),
            description: "Processing request...".into(),
            done: false,
        }
    }

    pub(crate) fn completed() -> Self {
        Self::Status {
            status: "complete".into(),
            description: String::new(),
            done: true,
        }
    }
}

/// Consumer callback for forwarded events.
///
/// The sink is optional on a run; when absent, no events are forwarded and
/// answer accumulation proceeds regardless.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: SinkEvent);
}

/// Sink backed by an unbounded channel; useful for tests and UI bridges.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait::async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: SinkEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_and_data() {
        let event = SinkEvent::Message {
            content: "Hi".into(),
        };
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value.get("type").and_then(|v| v.as_str()), Some("message"));
        assert_eq!(
            value.pointer("/data/content").and_then(|v| v.as_str()),
            Some("Hi")
        );
    }

    #[test]
    fn usage_payload_is_passed_through_unwrapped() {
        let event = SinkEvent::Usage(serde_json::json!({"total_tokens": 42}));
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value.get("type").and_then(|v| v.as_str()), Some("usage"));
        assert_eq!(
            value.pointer("/data/total_tokens").and_then(|v| v.as_u64()),
            Some(42)
        );
    }

    #[tokio::test]
    async fn channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(SinkEvent::processing()).await;
        sink.emit(SinkEvent::completed()).await;
        assert!(matches!(
            rx.recv().await,
            Some(SinkEvent::Status { done: false, .. })
        ));
        assert!(matches!(
            rx.recv().await,
            Some(SinkEvent::Status { done: true, .. })
        ));
    }
}

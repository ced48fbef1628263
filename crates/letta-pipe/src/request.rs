use crate::message::Message;

/// Wire request for one streaming run. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamRequest {
    /// Full endpoint URL for the agent's message stream.
    pub url: String,
    /// Messages sent upstream.
    pub messages: Vec<Message>,
    /// Ask the backend to stream per-step events (reasoning, usage).
    pub stream_steps: bool,
    /// Ask the backend to stream token-level assistant deltas.
    pub stream_tokens: bool,
}

impl StreamRequest {
    /// Builds the request from a conversation history.
    ///
    /// Only the most recent message is sent: the agent keeps its own
    /// conversation memory server-side, so resending the full history would
    /// duplicate context.
    pub fn from_conversation(
        url: String,
        conversation: &[Message],
        stream_steps: bool,
        stream_tokens: bool,
    ) -> Self {
        let messages = conversation.last().cloned().into_iter().collect();
        Self {
            url,
            messages,
            stream_steps,
            stream_tokens,
        }
    }

    /// JSON body for the streaming POST.
    pub fn body(&self) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = self
            .messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role.wire_name(),
                    "content": m.content,
                })
            })
            .collect();
        serde_json::json!({
            "messages": messages,
            "stream_steps": self.stream_steps,
            "stream_tokens": self.stream_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_most_recent_message_is_sent() {
        let conversation = vec![
            Message::system("be brief"),
            Message::user("first question"),
            Message::assistant("first answer"),
            Message::user("second question"),
        ];
        let request =
            StreamRequest::from_conversation("http://x/stream".into(), &conversation, true, true);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].content, "second question");
    }

    #[test]
    fn body_carries_flags_and_wire_roles() {
        let conversation = vec![Message::assistant("echoed")];
        let request =
            StreamRequest::from_conversation("http://x/stream".into(), &conversation, true, false);
        let body = request.body();
        assert_eq!(
            body.get("stream_steps").and_then(|v| v.as_bool()),
            Some(true)
        );
        assert_eq!(
            body.get("stream_tokens").and_then(|v| v.as_bool()),
            Some(false)
        );
        let first = &body["messages"][0];
        assert_eq!(first.get("role").and_then(|v| v.as_str()), Some("user"));
        assert_eq!(
            first.get("content").and_then(|v| v.as_str()),
            Some("echoed")
        );
    }
}

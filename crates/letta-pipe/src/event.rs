use serde_json::Value;

const UNKNOWN_STEP: &str = "unknown";

/// Classified result of a data frame.
///
/// Events are immutable values: produced here, consumed once by the run
/// loop, and optionally mirrored into the diagnostic log.
#[derive(Clone, Debug, PartialEq)]
pub enum AgentEvent {
    /// Visible answer content. Empty content is a valid no-op payload.
    AssistantText { content: String },
    /// Token/step accounting, forwarded only when usage display is enabled.
    UsageStatistics { stats: Value },
    /// A reasoning step with its identifier and text.
    ReasoningStep { step: String, content: String },
    /// Syntactically valid payload with an unknown discriminator.
    Unrecognized { message_type: String, payload: Value },
    /// Malformed payload; recorded, never aborts the run.
    ParseError { raw: String, message: String },
}

/// Parses a data frame payload and determines its semantic kind.
///
/// Never fails: malformed JSON becomes an `AgentEvent::ParseError` value so
/// the caller decides whether to surface it.
pub fn classify(payload: &str) -> AgentEvent {
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => {
            return AgentEvent::ParseError {
                raw: payload.to_string(),
                message: err.to_string(),
            };
        }
    };

    let message_type = value
        .get("message_type")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    match message_type.as_str() {
        "assistant_message" => AgentEvent::AssistantText {
            content: text_field(&value, "content"),
        },
        "usage_statistics" => AgentEvent::UsageStatistics { stats: value },
        "reasoning_message" => AgentEvent::ReasoningStep {
            step: value
                .get("step")
                .and_then(|v| v.as_str())
                .unwrap_or(UNKNOWN_STEP)
                .to_string(),
            content: text_field(&value, "content"),
        },
        other => AgentEvent::Unrecognized {
            message_type: other.to_string(),
            payload: value,
        },
    }
}

fn text_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_assistant_text() {
        let event = classify(r#"{"message_type":"assistant_message","content":"Hi"}"#);
        assert_eq!(
            event,
            AgentEvent::AssistantText {
                content: "Hi".into()
            }
        );
    }

    #[test]
    fn missing_content_is_an_empty_no_op_payload() {
        let event = classify(r#"{"message_type":"assistant_message"}"#);
        assert_eq!(event, AgentEvent::AssistantText { content: String::new() });
    }

    #[test]
    fn reasoning_step_defaults_to_unknown() {
        let event = classify(r#"{"message_type":"reasoning_message","content":"thinking"}"#);
        assert_eq!(
            event,
            AgentEvent::ReasoningStep {
                step: "unknown".into(),
                content: "thinking".into()
            }
        );
    }

    #[test]
    fn usage_statistics_keeps_the_full_record() {
        let event = classify(r#"{"message_type":"usage_statistics","total_tokens":42}"#);
        let AgentEvent::UsageStatistics { stats } = event else {
            panic!("expected usage statistics");
        };
        assert_eq!(stats.get("total_tokens").and_then(|v| v.as_u64()), Some(42));
    }

    #[test]
    fn unknown_discriminators_are_unrecognized() {
        let event = classify(r#"{"message_type":"tool_call_message","tool":"search"}"#);
        assert!(matches!(
            event,
            AgentEvent::Unrecognized { message_type, .. } if message_type == "tool_call_message"
        ));
        let event = classify(r#"{"content":"no discriminator"}"#);
        assert!(matches!(event, AgentEvent::Unrecognized { message_type, .. } if message_type.is_empty()));
    }

    #[test]
    fn malformed_json_never_raises() {
        let event = classify("{not json");
        let AgentEvent::ParseError { raw, message } = event else {
            panic!("expected parse error");
        };
        assert_eq!(raw, "{not json");
        assert!(!message.is_empty());
    }
}

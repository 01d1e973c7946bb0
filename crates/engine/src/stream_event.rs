//! Per-conversation progress events.
//!
//! A caller that subscribes to a [`Conversation`](crate::Conversation)
//! receives these as the loop runs: text as it arrives, each tool call and
//! its result, and how the run ended.

use serde::{Deserialize, Serialize};
use toolloop_core::error::FailureReason;
use toolloop_core::message::ToolCallRequest;

/// Events emitted while a conversation is driven.
///
/// - `text_delta`  : partial (streamed) or whole (buffered) assistant text
/// - `tool_call`   : the model requested a function
/// - `tool_result` : a requested function produced its result
/// - `suspended`   : manual mode is waiting for results
/// - `completed`   : the model produced a final answer
/// - `failed`      : the conversation entered the failed state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    TextDelta { content: String },

    ToolCall {
        id: String,
        function: String,
        arguments: String,
    },

    ToolResult {
        id: String,
        function: String,
        success: bool,
        output: String,
    },

    Suspended { pending: Vec<ToolCallRequest> },

    Completed {
        answer: Option<String>,
        iterations: u32,
    },

    Failed { reason: FailureReason },
}

impl LoopEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text_delta",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Suspended { .. } => "suspended",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether no further events follow for this run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Suspended { .. } | Self::Completed { .. } | Self::Failed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = LoopEvent::TextDelta {
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"text_delta""#));
        assert!(json.contains(r#""content":"Hello""#));
    }

    #[test]
    fn failure_reason_is_nested() {
        let event = LoopEvent::Failed {
            reason: FailureReason::IterationBudgetExceeded { budget: 5 },
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "failed");
        assert_eq!(json["reason"]["reason"], "iteration_budget_exceeded");
        assert_eq!(json["reason"]["budget"], 5);
    }

    #[test]
    fn event_types() {
        let completed = LoopEvent::Completed {
            answer: None,
            iterations: 2,
        };
        assert_eq!(completed.event_type(), "completed");
        assert!(completed.is_terminal());
        assert!(!LoopEvent::TextDelta { content: String::new() }.is_terminal());
    }
}

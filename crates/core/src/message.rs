//! Turn domain types.
//!
//! These are the value objects that flow through the engine:
//! User submits a turn → Provider answers with an assistant turn (text and/or
//! tool calls) → Engine appends one tool-result turn per call → repeat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::InvocationError;
use crate::function::{qualified_name, split_qualified_name};

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System instructions seeded before the first user turn
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// Result of one tool call
    ToolResult,
}

/// A request, emitted by the model, to invoke a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Opaque id, unique within one model response
    pub id: String,

    /// Namespace of the requested function
    pub namespace: String,

    /// Name of the requested function
    pub name: String,

    /// Raw argument payload (JSON object text), parsed only by the resolver
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Build a request from a model-facing `namespace-name`.
    pub fn from_qualified(
        id: impl Into<String>,
        qualified: &str,
        arguments: impl Into<String>,
    ) -> Self {
        let (namespace, name) = split_qualified_name(qualified);
        Self::new(id, namespace, name, arguments)
    }

    pub fn qualified_name(&self) -> String {
        qualified_name(&self.namespace, &self.name)
    }
}

/// The outcome of exactly one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The id of the request this result answers
    pub call_id: String,

    /// Value returned by the function (`null` on error)
    #[serde(default)]
    pub value: serde_json::Value,

    /// Why the call did not produce a value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<InvocationError>,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            call_id: call_id.into(),
            value,
            error: None,
        }
    }

    pub fn failure(call_id: impl Into<String>, error: InvocationError) -> Self {
        Self {
            call_id: call_id.into(),
            value: serde_json::Value::Null,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Text form fed back to the model.
    pub fn render(&self) -> String {
        match (&self.error, &self.value) {
            (Some(err), _) => format!("Error: {err}"),
            (None, serde_json::Value::String(s)) => s.clone(),
            (None, value) => value.to_string(),
        }
    }
}

/// One unit of conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: String,

    /// Who produced this turn
    pub role: Role,

    /// Text content, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool calls requested by the assistant, in issue order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Set on `ToolResult` turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,

    pub timestamp: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, content: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_result: None,
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, Some(content.into()))
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, Some(content.into()))
    }

    /// An assistant turn. Empty text is stored as no content, so buffered
    /// and streamed responses produce the same turn.
    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        let mut turn = Self::new(Role::Assistant, content.filter(|c| !c.is_empty()));
        turn.tool_calls = tool_calls;
        turn
    }

    pub fn tool_result(result: ToolResult) -> Self {
        let mut turn = Self::new(Role::ToolResult, Some(result.render()));
        turn.tool_result = Some(result);
        turn
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Compare everything except the generated id and timestamp.
    pub fn same_content(&self, other: &Turn) -> bool {
        self.role == other.role
            && self.content == other.content
            && self.tool_calls == other.tool_calls
            && self.tool_result == other.tool_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_turn() {
        let turn = Turn::user("time and weather in Paris");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content.as_deref(), Some("time and weather in Paris"));
        assert!(!turn.has_tool_calls());
    }

    #[test]
    fn empty_assistant_text_is_no_content() {
        let a = Turn::assistant(Some(String::new()), vec![]);
        let b = Turn::assistant(None, vec![]);
        assert!(a.content.is_none());
        assert!(a.same_content(&b));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn request_from_qualified_name() {
        let call = ToolCallRequest::from_qualified("call_1", "HelperFunctions-GetCurrentUtcTime", "");
        assert_eq!(call.namespace, "HelperFunctions");
        assert_eq!(call.name, "GetCurrentUtcTime");
        assert_eq!(call.qualified_name(), "HelperFunctions-GetCurrentUtcTime");
    }

    #[test]
    fn tool_result_turn_renders_value_or_error() {
        let ok = Turn::tool_result(ToolResult::success("c1", serde_json::json!("60 and rainy")));
        assert_eq!(ok.role, Role::ToolResult);
        assert_eq!(ok.content.as_deref(), Some("60 and rainy"));

        let err = Turn::tool_result(ToolResult::failure(
            "c2",
            InvocationError::UnknownFunction {
                function: "DoesNotExist".into(),
            },
        ));
        assert!(err.content.unwrap().starts_with("Error: Unknown function"));
        assert!(!err.tool_result.unwrap().is_success());
    }

    #[test]
    fn turn_serialization_roundtrip() {
        let mut turn = Turn::assistant(Some("Checking".into()), vec![]);
        turn.tool_calls.push(ToolCallRequest::new("c1", "ns", "f", r#"{"a":1}"#));
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains(r#""role":"assistant""#));
        let back: Turn = serde_json::from_str(&json).unwrap();
        assert!(back.same_content(&turn));
        assert_eq!(back.id, turn.id);
    }
}

//! Provider trait: the abstraction over model backends.
//!
//! A provider knows how to send the conversation so far to a model and get
//! the next assistant turn back, either as a complete turn or as a stream of
//! deltas. Any backend satisfying the trait is usable; transport details
//! stay inside the implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::function::FunctionDefinition;
use crate::message::Turn;

/// Whether the model may call functions on this request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionChoice {
    /// Function definitions are sent; the model decides
    #[default]
    Auto,
    /// No definitions are sent
    None,
}

/// Model settings carried with every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionSettings {
    /// The model to use
    pub model: String,

    /// Temperature (0.0 = deterministic, 2.0 = most random)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub function_choice: FunctionChoice,
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: "demo-model".into(),
            temperature: default_temperature(),
            max_tokens: None,
            function_choice: FunctionChoice::Auto,
        }
    }
}

/// One request to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The history snapshot, verbatim
    pub turns: Vec<Turn>,

    pub settings: CompletionSettings,

    /// Functions the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionDefinition>,

    /// Whether the response is consumed as a stream
    #[serde(default)]
    pub stream: bool,
}

/// A complete (buffered) response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The assistant turn (text and/or tool calls)
    pub turn: Turn,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// A fragment of one tool call.
///
/// Fragments sharing an `index` belong to the same call; every string field
/// is appended to what earlier fragments delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Position of the call within the response
    pub index: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Piece of the JSON argument payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// A single element of a streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Partial text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Partial tool call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallDelta>,

    /// Whether this is the last delta of the response
    #[serde(default)]
    pub is_final: bool,

    /// Usage info (typically only on the final delta)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamDelta {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn tool_call(delta: ToolCallDelta) -> Self {
        Self {
            tool_call: Some(delta),
            ..Self::default()
        }
    }

    pub fn finished(usage: Option<Usage>) -> Self {
        Self {
            is_final: true,
            usage,
            ..Self::default()
        }
    }
}

/// Receiving half of a streamed response.
pub type DeltaReceiver = tokio::sync::mpsc::Receiver<Result<StreamDelta, ProviderError>>;

/// The core provider trait.
///
/// The orchestration loop calls `complete()` or `stream()` without knowing
/// which backend answers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// A human-readable name for this provider.
    fn name(&self) -> &str;

    /// Send a request and get a complete assistant turn.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Send a request and get a stream of deltas.
    ///
    /// Default implementation calls `complete()` and replays the turn as
    /// one text delta, one delta per tool call and a final delta.
    async fn stream(&self, request: CompletionRequest) -> Result<DeltaReceiver, ProviderError> {
        let response = self.complete(request).await?;
        let turn = response.turn;
        let (tx, rx) = tokio::sync::mpsc::channel(turn.tool_calls.len() + 2);

        if let Some(text) = turn.content {
            let _ = tx.send(Ok(StreamDelta::text(text))).await;
        }
        for (index, call) in turn.tool_calls.into_iter().enumerate() {
            let delta = ToolCallDelta {
                index: index as u32,
                id: Some(call.id),
                namespace: Some(call.namespace),
                name: Some(call.name),
                arguments: Some(call.arguments),
            };
            let _ = tx.send(Ok(StreamDelta::tool_call(delta))).await;
        }
        let _ = tx.send(Ok(StreamDelta::finished(response.usage))).await;
        Ok(rx)
    }
}

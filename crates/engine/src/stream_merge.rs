//! Reassembly of streamed responses.
//!
//! Providers deliver a streamed assistant turn as deltas: text fragments
//! and tool-call fragments tagged with the call's position in the response.
//! [`DeltaMerger`] concatenates them in arrival order so that the turn it
//! produces is indistinguishable from a buffered one.

use std::collections::BTreeMap;

use toolloop_core::error::ProviderError;
use toolloop_core::message::ToolCallRequest;
use toolloop_core::provider::{StreamDelta, Usage};

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    namespace: String,
    name: String,
    arguments: String,
}

/// Merged content of a finished stream.
#[derive(Debug, Clone, Default)]
pub struct MergedResponse {
    pub content: Option<String>,

    /// Calls ordered by their stream index
    pub tool_calls: Vec<ToolCallRequest>,

    pub usage: Option<Usage>,
}

/// Accumulates deltas until the final one arrives.
#[derive(Debug, Default)]
pub struct DeltaMerger {
    text: String,
    calls: BTreeMap<u32, PartialCall>,
    usage: Option<Usage>,
    finished: bool,
}

impl DeltaMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one delta in. Returns the text fragment it carried, if any.
    ///
    /// Deltas arriving after the final one are ignored.
    pub fn push(&mut self, delta: StreamDelta) -> Option<String> {
        if self.finished {
            return None;
        }

        if let Some(fragment) = &delta.tool_call {
            let call = self.calls.entry(fragment.index).or_default();
            if let Some(id) = &fragment.id {
                call.id.push_str(id);
            }
            if let Some(namespace) = &fragment.namespace {
                call.namespace.push_str(namespace);
            }
            if let Some(name) = &fragment.name {
                call.name.push_str(name);
            }
            if let Some(arguments) = &fragment.arguments {
                call.arguments.push_str(arguments);
            }
        }

        if delta.usage.is_some() {
            self.usage = delta.usage;
        }
        if delta.is_final {
            self.finished = true;
        }

        let text = delta.text.filter(|t| !t.is_empty())?;
        self.text.push_str(&text);
        Some(text)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of distinct tool calls seen so far.
    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// The assembled response. Fails if the final delta never arrived.
    pub fn finish(self) -> Result<MergedResponse, ProviderError> {
        if !self.finished {
            return Err(ProviderError::StreamInterrupted(
                "stream closed before the final delta".into(),
            ));
        }

        let tool_calls = self
            .calls
            .into_values()
            .map(|call| ToolCallRequest {
                id: call.id,
                namespace: call.namespace,
                name: call.name,
                arguments: call.arguments,
            })
            .collect();

        Ok(MergedResponse {
            content: (!self.text.is_empty()).then_some(self.text),
            tool_calls,
            usage: self.usage,
        })
    }
}

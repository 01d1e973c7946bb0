//! Conversation state driven by the orchestrator.
//!
//! A [`Conversation`] owns its [`History`], the loop state machine and the
//! bookkeeping for manual mode. Callers read it and, while it is suspended,
//! supply results; every other mutation goes through the orchestrator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use toolloop_core::error::{FailureReason, ManualError};
use toolloop_core::history::History;
use toolloop_core::message::{ConversationId, ToolCallRequest, ToolResult, Turn};
use toolloop_core::provider::Usage;

use crate::stream_event::LoopEvent;

/// Where the loop stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    RequestingCompletion,
    ToolCallsPending,
    ExecutingTools,
    AppendingResults,
    Completed,
    Failed { reason: FailureReason },
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }
}

/// How a run of the loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The model answered without requesting functions.
    Completed { answer: Option<String> },

    /// Manual mode: these calls wait for results.
    Suspended { pending: Vec<ToolCallRequest> },

    Failed { reason: FailureReason },
}

impl Outcome {
    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Completed { answer } => answer.as_deref(),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// One conversation with the model.
#[derive(Debug)]
pub struct Conversation {
    id: ConversationId,
    history: History,
    state: LoopState,

    /// Completed tool-execution cycles over the conversation's lifetime
    iterations: u32,

    /// Value of `iterations` when the current user turn was submitted
    submitted_at: u32,

    pending: Vec<ToolCallRequest>,
    supplied: HashMap<String, ToolResult>,
    usage: Usage,
    cancel: CancellationToken,
    events: Option<mpsc::UnboundedSender<LoopEvent>>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::from_history(History::new())
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self::from_history(History::with_system_prompt(prompt))
    }

    /// Continue from a previously recorded history.
    pub fn from_history(history: History) -> Self {
        Self {
            id: ConversationId::new(),
            history,
            state: LoopState::Idle,
            iterations: 0,
            submitted_at: 0,
            pending: Vec::new(),
            supplied: HashMap::new(),
            usage: Usage::default(),
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Tool-execution cycles completed so far.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Token usage summed over every completion.
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Receive [`LoopEvent`]s for this conversation.
    ///
    /// Replaces any earlier subscription.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<LoopEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    /// A token that cancels this conversation from another task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Calls awaiting results while suspended in manual mode.
    pub fn pending_tool_calls(&self) -> &[ToolCallRequest] {
        &self.pending
    }

    /// Pending calls that have no supplied result yet.
    pub fn outstanding_tool_calls(&self) -> Vec<ToolCallRequest> {
        self.pending
            .iter()
            .filter(|call| !self.supplied.contains_key(&call.id))
            .cloned()
            .collect()
    }

    /// Whether a result has been supplied for `call_id`.
    pub fn has_result(&self, call_id: &str) -> bool {
        self.supplied.contains_key(call_id)
    }

    /// Record the result of a pending call.
    ///
    /// Results are held until the orchestrator resumes the conversation;
    /// the history is not touched here.
    pub fn supply_result(&mut self, result: ToolResult) -> Result<(), ManualError> {
        self.pending_request(&result.call_id)?;
        self.supplied.insert(result.call_id.clone(), result);
        Ok(())
    }

    /// Look up a pending call that still needs a result.
    pub(crate) fn pending_request(&self, call_id: &str) -> Result<&ToolCallRequest, ManualError> {
        if self.state != LoopState::ToolCallsPending || self.pending.is_empty() {
            return Err(ManualError::NotSuspended);
        }
        let request = self
            .pending
            .iter()
            .find(|call| call.id == call_id)
            .ok_or_else(|| ManualError::UnknownCallId(call_id.to_string()))?;
        if self.supplied.contains_key(call_id) {
            return Err(ManualError::DuplicateResult(call_id.to_string()));
        }
        Ok(request)
    }

    pub(crate) fn set_state(&mut self, state: LoopState) {
        self.state = state;
    }

    pub(crate) fn append(&mut self, turn: Turn) {
        self.history.append(turn);
    }

    pub(crate) fn begin_submission(&mut self, text: &str) {
        self.append(Turn::user(text));
        self.submitted_at = self.iterations;
    }

    /// Cycles completed since the current user turn.
    pub(crate) fn iterations_this_submission(&self) -> u32 {
        self.iterations - self.submitted_at
    }

    pub(crate) fn record_iteration(&mut self) {
        self.iterations += 1;
    }

    pub(crate) fn add_usage(&mut self, usage: Option<Usage>) {
        if let Some(usage) = usage {
            self.usage.add(&usage);
        }
    }

    pub(crate) fn suspend(&mut self, pending: Vec<ToolCallRequest>) {
        self.pending = pending;
        self.supplied.clear();
        self.state = LoopState::ToolCallsPending;
    }

    /// Supplied results in the order the calls were issued.
    ///
    /// Only valid once every pending call has a result.
    pub(crate) fn take_supplied(&mut self) -> Vec<(ToolCallRequest, ToolResult)> {
        let pending = std::mem::take(&mut self.pending);
        let mut supplied = std::mem::take(&mut self.supplied);
        pending
            .into_iter()
            .filter_map(|call| supplied.remove(&call.id).map(|result| (call, result)))
            .collect()
    }

    pub(crate) fn emit(&self, event: LoopEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is listening
            let _ = tx.send(event);
        }
    }

    /// The answer of the last completed run.
    pub(crate) fn last_answer(&self) -> Option<String> {
        self.history.last_assistant().and_then(|turn| turn.content.clone())
    }
}

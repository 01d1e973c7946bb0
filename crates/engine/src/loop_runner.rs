//! The orchestration loop.
//!
//! One user submission drives the cycle
//! `RequestingCompletion → (ToolCallsPending → ExecutingTools →
//! AppendingResults)* → Completed`, ending early in `Failed` on provider
//! failure, budget exhaustion or cancellation. In manual mode the loop stops
//! at `ToolCallsPending` and continues when the caller resumes it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use toolloop_config::{EngineConfig, InvocationMode, ResponseMode};
use toolloop_core::catalog::FunctionCatalog;
use toolloop_core::error::{FailureReason, ManualError, ProviderError};
use toolloop_core::event::{DomainEvent, EventBus};
use toolloop_core::function::split_qualified_name;
use toolloop_core::message::{ToolCallRequest, ToolResult, Turn};
use toolloop_core::provider::{
    CompletionRequest, CompletionSettings, FunctionChoice, ModelProvider,
};
use tracing::{debug, info, warn};

use crate::conversation::{Conversation, LoopState, Outcome};
use crate::executor::{CompletedCall, InvocationExecutor};
use crate::resolver::FunctionResolver;
use crate::stream_event::LoopEvent;
use crate::stream_merge::DeltaMerger;

/// Knobs of the loop, usually built from an [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub completion: CompletionSettings,

    /// Tool-call cycles allowed per user submission
    pub max_iterations: u32,

    pub invocation_mode: InvocationMode,

    pub response_mode: ResponseMode,

    pub tool_timeout: Option<Duration>,

    pub max_concurrent_calls: usize,

    /// Seeds conversations started by the orchestrator
    pub system_prompt: Option<String>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl LoopSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            completion: CompletionSettings {
                model: config.model.clone(),
                temperature: config.temperature,
                max_tokens: config.max_tokens,
                function_choice: FunctionChoice::Auto,
            },
            max_iterations: config.max_iterations,
            invocation_mode: config.invocation_mode,
            response_mode: config.response_mode,
            tool_timeout: config.tool_timeout_ms.map(Duration::from_millis),
            max_concurrent_calls: config.max_concurrent_calls,
            system_prompt: config.system_prompt.clone(),
        }
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_invocation_mode(mut self, mode: InvocationMode) -> Self {
        self.invocation_mode = mode;
        self
    }

    pub fn with_response_mode(mut self, mode: ResponseMode) -> Self {
        self.response_mode = mode;
        self
    }

    pub fn with_function_choice(mut self, choice: FunctionChoice) -> Self {
        self.completion.function_choice = choice;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }
}

/// Drives conversations against a model provider and a function catalog.
pub struct Orchestrator {
    provider: Arc<dyn ModelProvider>,
    resolver: FunctionResolver,
    executor: InvocationExecutor,
    settings: LoopSettings,
    event_bus: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        catalog: Arc<FunctionCatalog>,
        settings: LoopSettings,
    ) -> Self {
        let mut executor =
            InvocationExecutor::new().with_max_concurrent_calls(settings.max_concurrent_calls);
        if let Some(timeout) = settings.tool_timeout {
            executor = executor.with_timeout(timeout);
        }
        Self {
            provider,
            resolver: FunctionResolver::new(catalog),
            executor,
            settings,
            event_bus: Arc::new(EventBus::default()),
        }
    }

    /// Publish domain events on a shared bus.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = bus;
        self
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn resolver(&self) -> &FunctionResolver {
        &self.resolver
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// A fresh conversation, seeded with the configured system prompt.
    pub fn start_conversation(&self) -> Conversation {
        match &self.settings.system_prompt {
            Some(prompt) => Conversation::with_system_prompt(prompt.clone()),
            None => Conversation::new(),
        }
    }

    /// Append a user turn and drive the loop until it completes, fails or
    /// suspends.
    ///
    /// A failed conversation stays failed, and a suspended one must be
    /// resumed first; in both cases nothing is appended.
    pub async fn submit(&self, conversation: &mut Conversation, text: &str) -> Outcome {
        match conversation.state() {
            LoopState::Failed { reason } => {
                return Outcome::Failed {
                    reason: reason.clone(),
                };
            }
            LoopState::ToolCallsPending => {
                return Outcome::Suspended {
                    pending: conversation.pending_tool_calls().to_vec(),
                };
            }
            _ => {}
        }

        info!(
            conversation_id = %conversation.id(),
            mode = ?self.settings.invocation_mode,
            "User turn submitted"
        );
        conversation.begin_submission(text);
        self.drive(conversation).await
    }

    /// Continue a suspended conversation once every pending call has a result.
    ///
    /// With results still missing the conversation stays suspended and is
    /// not modified.
    pub async fn resume(&self, conversation: &mut Conversation) -> Result<Outcome, ManualError> {
        if conversation.state() != &LoopState::ToolCallsPending {
            return Err(ManualError::NotSuspended);
        }
        if conversation.is_cancelled() {
            return Ok(self.fail(conversation, FailureReason::Cancelled));
        }

        let outstanding = conversation.outstanding_tool_calls();
        if !outstanding.is_empty() {
            debug!(
                conversation_id = %conversation.id(),
                outstanding = outstanding.len(),
                "Resume without all results; staying suspended"
            );
            return Ok(Outcome::Suspended {
                pending: conversation.pending_tool_calls().to_vec(),
            });
        }

        conversation.set_state(LoopState::AppendingResults);
        let completed = conversation
            .take_supplied()
            .into_iter()
            .map(|(request, result)| CompletedCall {
                request,
                result,
                duration: Duration::ZERO,
            })
            .collect();
        self.append_results(conversation, completed);
        Ok(self.drive(conversation).await)
    }

    /// Resolve and execute one pending call on the caller's behalf and
    /// record its result.
    pub async fn invoke_pending(
        &self,
        conversation: &mut Conversation,
        call_id: &str,
    ) -> Result<ToolResult, ManualError> {
        let request = conversation.pending_request(call_id)?.clone();
        let cancel = conversation.cancellation_token();
        let result = self.executor.run_request(&self.resolver, &request, &cancel).await;
        conversation.supply_result(result.clone())?;
        Ok(result)
    }

    /// Execute every outstanding pending call. Returns how many ran.
    pub async fn invoke_all_pending(&self, conversation: &mut Conversation) -> Result<usize, ManualError> {
        if conversation.state() != &LoopState::ToolCallsPending {
            return Err(ManualError::NotSuspended);
        }
        let outstanding = conversation.outstanding_tool_calls();
        for request in &outstanding {
            self.invoke_pending(conversation, &request.id).await?;
        }
        Ok(outstanding.len())
    }

    async fn drive(&self, conversation: &mut Conversation) -> Outcome {
        loop {
            if conversation.is_cancelled() {
                return self.fail(conversation, FailureReason::Cancelled);
            }

            conversation.set_state(LoopState::RequestingCompletion);
            let turn = match self.request_turn(conversation).await {
                Ok(turn) => turn,
                Err(reason) => return self.fail(conversation, reason),
            };

            let calls = turn.tool_calls.clone();
            conversation.append(turn);
            if calls.is_empty() {
                return self.complete(conversation);
            }

            conversation.set_state(LoopState::ToolCallsPending);
            if conversation.iterations_this_submission() >= self.settings.max_iterations {
                return self.fail(
                    conversation,
                    FailureReason::IterationBudgetExceeded {
                        budget: self.settings.max_iterations,
                    },
                );
            }

            for call in &calls {
                conversation.emit(LoopEvent::ToolCall {
                    id: call.id.clone(),
                    function: call.qualified_name(),
                    arguments: call.arguments.clone(),
                });
            }

            if self.settings.invocation_mode == InvocationMode::Manual {
                info!(
                    conversation_id = %conversation.id(),
                    pending = calls.len(),
                    "Suspended for manual tool results"
                );
                conversation.suspend(calls.clone());
                conversation.emit(LoopEvent::Suspended {
                    pending: calls.clone(),
                });
                return Outcome::Suspended { pending: calls };
            }

            conversation.set_state(LoopState::ExecutingTools);
            let cancel = conversation.cancellation_token();
            let completed = self.executor.execute_batch(&self.resolver, &calls, &cancel).await;
            if cancel.is_cancelled() {
                return self.fail(conversation, FailureReason::Cancelled);
            }

            conversation.set_state(LoopState::AppendingResults);
            self.append_results(conversation, completed);
        }
    }

    /// Ask the provider for the next assistant turn.
    async fn request_turn(&self, conversation: &mut Conversation) -> Result<Turn, FailureReason> {
        let streamed = self.settings.response_mode == ResponseMode::Streamed;
        let request = CompletionRequest {
            turns: conversation.history().snapshot(),
            settings: self.settings.completion.clone(),
            functions: match self.settings.completion.function_choice {
                FunctionChoice::Auto => self.resolver.catalog().definitions(),
                FunctionChoice::None => Vec::new(),
            },
            stream: streamed,
        };

        debug!(
            conversation_id = %conversation.id(),
            turns = request.turns.len(),
            functions = request.functions.len(),
            streamed,
            "Requesting completion"
        );
        self.event_bus.publish(DomainEvent::CompletionRequested {
            conversation_id: conversation.id().to_string(),
            iteration: conversation.iterations(),
            streamed,
            timestamp: Utc::now(),
        });

        if streamed {
            return self.stream_turn(conversation, request).await;
        }

        let cancel = conversation.cancellation_token();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FailureReason::Cancelled),
            response = self.provider.complete(request) => response?,
        };
        conversation.add_usage(response.usage);

        let turn = assistant_turn(response.turn.content, response.turn.tool_calls)?;
        if let Some(text) = &turn.content {
            conversation.emit(LoopEvent::TextDelta {
                content: text.clone(),
            });
        }
        Ok(turn)
    }

    async fn stream_turn(
        &self,
        conversation: &mut Conversation,
        request: CompletionRequest,
    ) -> Result<Turn, FailureReason> {
        let cancel = conversation.cancellation_token();
        let mut deltas = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FailureReason::Cancelled),
            deltas = self.provider.stream(request) => deltas?,
        };

        let mut merger = DeltaMerger::new();
        while !merger.is_finished() {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FailureReason::Cancelled),
                next = deltas.recv() => next,
            };
            match next {
                Some(Ok(delta)) => {
                    if let Some(content) = merger.push(delta) {
                        conversation.emit(LoopEvent::TextDelta { content });
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => break,
            }
        }

        let merged = merger.finish()?;
        conversation.add_usage(merged.usage);
        Ok(assistant_turn(merged.content, merged.tool_calls)?)
    }

    fn append_results(&self, conversation: &mut Conversation, completed: Vec<CompletedCall>) {
        for call in completed {
            let function = call.request.qualified_name();
            let success = call.result.is_success();
            self.event_bus.publish(DomainEvent::ToolExecuted {
                conversation_id: conversation.id().to_string(),
                function: function.clone(),
                call_id: call.result.call_id.clone(),
                success,
                duration_ms: call.duration.as_millis() as u64,
                timestamp: Utc::now(),
            });
            conversation.emit(LoopEvent::ToolResult {
                id: call.result.call_id.clone(),
                function,
                success,
                output: call.result.render(),
            });
            conversation.append(Turn::tool_result(call.result));
        }
        conversation.record_iteration();
    }

    fn complete(&self, conversation: &mut Conversation) -> Outcome {
        conversation.set_state(LoopState::Completed);
        let answer = conversation.last_answer();
        info!(
            conversation_id = %conversation.id(),
            iterations = conversation.iterations(),
            "Conversation completed"
        );
        self.event_bus.publish(DomainEvent::ConversationCompleted {
            conversation_id: conversation.id().to_string(),
            iterations: conversation.iterations(),
            timestamp: Utc::now(),
        });
        conversation.emit(LoopEvent::Completed {
            answer: answer.clone(),
            iterations: conversation.iterations(),
        });
        Outcome::Completed { answer }
    }

    fn fail(&self, conversation: &mut Conversation, reason: FailureReason) -> Outcome {
        warn!(conversation_id = %conversation.id(), reason = %reason, "Conversation failed");
        conversation.set_state(LoopState::Failed {
            reason: reason.clone(),
        });
        self.event_bus.publish(DomainEvent::ConversationFailed {
            conversation_id: conversation.id().to_string(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
        conversation.emit(LoopEvent::Failed {
            reason: reason.clone(),
        });
        Outcome::Failed { reason }
    }
}

/// Normalize a provider's answer into an assistant turn.
///
/// Calls without an id get `call_{index}`, and a qualified name without a
/// namespace is split. Ids must be unique within the response.
fn assistant_turn(
    content: Option<String>,
    mut tool_calls: Vec<ToolCallRequest>,
) -> Result<Turn, ProviderError> {
    let mut seen = HashSet::new();
    for (index, call) in tool_calls.iter_mut().enumerate() {
        if call.id.is_empty() {
            call.id = format!("call_{index}");
        }
        if call.namespace.is_empty() {
            let (namespace, name) = split_qualified_name(&call.name);
            let (namespace, name) = (namespace.to_string(), name.to_string());
            call.namespace = namespace;
            call.name = name;
        }
        if !seen.insert(call.id.clone()) {
            return Err(ProviderError::InvalidResponse(format!(
                "duplicate tool call id '{}' in one response",
                call.id
            )));
        }
    }
    Ok(Turn::assistant(content, tool_calls))
}

//! Error types for the toolloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// --- Bounded context errors ---

/// Registration and lookup failures of the function catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Function already registered: {namespace}-{name}")]
    DuplicateFunction { namespace: String, name: String },

    #[error("Unknown function: {namespace}-{name}")]
    UnknownFunction { namespace: String, name: String },

    #[error("Invalid function name '{value}': {reason}")]
    InvalidName { value: String, reason: String },

    #[error("Invalid parameter schema for {namespace}-{name}: {reason}")]
    InvalidSchema {
        namespace: String,
        name: String,
        reason: String,
    },
}

/// Errors local to a single tool call.
///
/// These never abort the loop: they are recorded in the call's
/// [`ToolResult`](crate::message::ToolResult) and fed back to the model.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvocationError {
    #[error("Unknown function: {function}")]
    UnknownFunction { function: String },

    #[error("Malformed arguments for {function}: {reason}")]
    MalformedArguments { function: String, reason: String },

    #[error("Invocation of {function} failed: {details}")]
    InvocationFailure { function: String, details: String },

    #[error("{function} timed out after {timeout_ms}ms")]
    Timeout { function: String, timeout_ms: u64 },

    #[error("Invocation of {function} was cancelled")]
    Cancelled { function: String },
}

impl InvocationError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownFunction { .. } => "unknown_function",
            Self::MalformedArguments { .. } => "malformed_arguments",
            Self::InvocationFailure { .. } => "invocation_failure",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

impl From<CatalogError> for InvocationError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::UnknownFunction { namespace, name }
            | CatalogError::DuplicateFunction { namespace, name } => Self::UnknownFunction {
                function: crate::function::qualified_name(&namespace, &name),
            },
            CatalogError::InvalidName { value, .. } => Self::UnknownFunction { function: value },
            CatalogError::InvalidSchema {
                namespace,
                name,
                reason,
            } => Self::MalformedArguments {
                function: crate::function::qualified_name(&namespace, &name),
                reason,
            },
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Violations of the manual-mode caller contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManualError {
    #[error("Conversation is not waiting for tool results")]
    NotSuspended,

    #[error("No pending tool call with id '{0}'")]
    UnknownCallId(String),

    #[error("A result for tool call '{0}' was already supplied")]
    DuplicateResult(String),
}

/// Why a conversation ended in the `Failed` state.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("Iteration budget of {budget} exceeded with tool calls still pending")]
    IterationBudgetExceeded { budget: u32 },

    #[error("Model provider unavailable: {message}")]
    ProviderUnavailable { message: String },

    #[error("Conversation cancelled")]
    Cancelled,
}

impl From<ProviderError> for FailureReason {
    fn from(err: ProviderError) -> Self {
        Self::ProviderUnavailable {
            message: err.to_string(),
        }
    }
}

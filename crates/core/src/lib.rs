//! # toolloop core
//!
//! Domain types, traits, and error definitions for the toolloop
//! function-calling engine. The engine, the function sets and the CLI all
//! depend inward on this crate.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the engine is a trait here:
//! - [`ModelProvider`]: any model backend, buffered or streamed
//! - [`Function`]: any callable capability
//! - [`FunctionProvider`]: any source of function descriptors
//!
//! Implementations live elsewhere, which keeps tests on scripted mocks.

pub mod catalog;
pub mod error;
pub mod event;
pub mod function;
pub mod history;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use catalog::FunctionCatalog;
pub use error::{CatalogError, FailureReason, InvocationError, ManualError, ProviderError};
pub use event::{DomainEvent, EventBus};
pub use function::{
    Arguments, Function, FunctionDefinition, FunctionDescriptor, FunctionProvider,
};
pub use history::History;
pub use message::{ConversationId, Role, ToolCallRequest, ToolResult, Turn};
pub use provider::{
    CompletionRequest, CompletionResponse, CompletionSettings, DeltaReceiver, FunctionChoice,
    ModelProvider, StreamDelta, ToolCallDelta, Usage,
};

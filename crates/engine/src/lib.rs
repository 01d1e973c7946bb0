//! # toolloop engine
//!
//! The orchestration loop that lets a model call registered functions.
//!
//! ```text
//! user turn ─► Orchestrator ─► ModelProvider ─► assistant turn
//!                   ▲                               │ tool calls
//!                   │                               ▼
//!             tool results ◄─ InvocationExecutor ◄─ FunctionResolver
//! ```
//!
//! In automatic mode the engine resolves and runs every requested call; in
//! manual mode it suspends and the caller supplies results before resuming.
//! Responses are consumed buffered or streamed; both produce the same
//! history.

pub mod conversation;
pub mod executor;
pub mod loop_runner;
pub mod resolver;
pub mod stream_event;
pub mod stream_merge;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use conversation::{Conversation, LoopState, Outcome};
pub use executor::{CompletedCall, InvocationExecutor};
pub use loop_runner::{LoopSettings, Orchestrator};
pub use resolver::{BoundInvocation, FunctionResolver};
pub use stream_event::LoopEvent;
pub use stream_merge::{DeltaMerger, MergedResponse};

//! Invocation executor.
//!
//! Runs bound invocations and turns every outcome into a [`ToolResult`]:
//! a returned value, an error, a panic, a deadline or a cancellation. The
//! function body runs on its own task so that a panic or an abandoned call
//! never takes the loop down with it.

use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::task::{AbortHandle, JoinError};
use tokio_util::sync::CancellationToken;
use toolloop_core::error::InvocationError;
use toolloop_core::message::{ToolCallRequest, ToolResult};
use tracing::{debug, warn};

use crate::resolver::{BoundInvocation, FunctionResolver};

/// Default number of calls from one response run at the same time.
pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 4;

/// One executed request.
#[derive(Debug, Clone)]
pub struct CompletedCall {
    pub request: ToolCallRequest,
    pub result: ToolResult,
    pub duration: Duration,
}

/// Executes bound invocations with an optional deadline.
#[derive(Debug, Clone)]
pub struct InvocationExecutor {
    timeout: Option<Duration>,
    max_concurrent_calls: usize,
}

impl Default for InvocationExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl InvocationExecutor {
    pub fn new() -> Self {
        Self {
            timeout: None,
            max_concurrent_calls: DEFAULT_MAX_CONCURRENT_CALLS,
        }
    }

    /// Abandon calls that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_concurrent_calls(mut self, max: usize) -> Self {
        self.max_concurrent_calls = max.max(1);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run one invocation to completion, timeout or cancellation.
    pub async fn execute(&self, bound: BoundInvocation, cancel: &CancellationToken) -> ToolResult {
        let function = bound.function_name();
        let call_id = bound.call_id.clone();

        if cancel.is_cancelled() {
            return ToolResult::failure(call_id, InvocationError::Cancelled { function });
        }

        let invoker = bound.descriptor.invoker();
        let arguments = bound.arguments;
        let mut handle = tokio::spawn(async move { invoker.invoke(arguments).await });
        let _guard = AbortOnDrop(handle.abort_handle());

        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(function = %function, call_id = %call_id, "Invocation cancelled");
                return ToolResult::failure(call_id, InvocationError::Cancelled { function });
            }
            joined = join_within(&mut handle, self.timeout) => joined,
        };

        match joined {
            None => {
                let timeout_ms = self.timeout.map(|t| t.as_millis() as u64).unwrap_or_default();
                warn!(function = %function, call_id = %call_id, timeout_ms, "Invocation timed out");
                ToolResult::failure(call_id, InvocationError::Timeout { function, timeout_ms })
            }
            Some(Ok(Ok(value))) => ToolResult::success(call_id, value),
            Some(Ok(Err(e))) => {
                debug!(function = %function, call_id = %call_id, error = %e, "Invocation failed");
                ToolResult::failure(
                    call_id,
                    InvocationError::InvocationFailure {
                        function,
                        details: format!("{e:#}"),
                    },
                )
            }
            Some(Err(e)) => {
                let details = join_failure(e);
                warn!(function = %function, call_id = %call_id, details = %details, "Invocation aborted");
                ToolResult::failure(call_id, InvocationError::InvocationFailure { function, details })
            }
        }
    }

    /// Resolve and run a request; resolution failures become results too.
    pub async fn run_request(
        &self,
        resolver: &FunctionResolver,
        request: &ToolCallRequest,
        cancel: &CancellationToken,
    ) -> ToolResult {
        match resolver.resolve(request) {
            Ok(bound) => self.execute(bound, cancel).await,
            Err(err) => {
                debug!(call_id = %request.id, error = %err, "Tool call did not resolve");
                ToolResult::failure(request.id.clone(), err)
            }
        }
    }

    /// Run every request of one response.
    ///
    /// Up to `max_concurrent_calls` calls are in flight at once; the output
    /// is in request order regardless of completion order.
    pub async fn execute_batch(
        &self,
        resolver: &FunctionResolver,
        requests: &[ToolCallRequest],
        cancel: &CancellationToken,
    ) -> Vec<CompletedCall> {
        futures::stream::iter(requests.iter().cloned().map(|request| async move {
            let started = Instant::now();
            let result = self.run_request(resolver, &request, cancel).await;
            CompletedCall {
                request,
                result,
                duration: started.elapsed(),
            }
        }))
        .buffered(self.max_concurrent_calls)
        .collect()
        .await
    }
}

/// Aborts the spawned call when the executing future goes away.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn join_within<T>(
    handle: &mut tokio::task::JoinHandle<T>,
    timeout: Option<Duration>,
) -> Option<Result<T, JoinError>> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, handle).await.ok(),
        None => Some(handle.await),
    }
}

fn join_failure(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("function panicked: {message}")
}

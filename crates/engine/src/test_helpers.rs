//! Shared test helpers: scripted providers and ready-made catalogs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use toolloop_core::catalog::FunctionCatalog;
use toolloop_core::error::ProviderError;
use toolloop_core::function::empty_parameters;
use toolloop_core::message::{ToolCallRequest, Turn};
use toolloop_core::provider::{
    CompletionRequest, CompletionResponse, DeltaReceiver, ModelProvider, StreamDelta,
    ToolCallDelta, Usage,
};
use toolloop_functions::{FunctionSet, helper_functions};

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue; once the
/// queue is exhausted the provider reports itself unavailable.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider that answers once with plain text.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![text_response(text)])
    }

    /// A provider that first requests `tool_calls`, then answers.
    pub fn tool_then_answer(tool_calls: Vec<ToolCallRequest>, answer: &str) -> Self {
        Self::new(vec![tool_call_response(tool_calls, None), text_response(answer)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let index = requests.len();
        requests.push(request);

        self.responses
            .lock()
            .unwrap()
            .get(index)
            .cloned()
            .ok_or_else(|| ProviderError::Unavailable(format!("no scripted response #{index}")))
    }
}

/// A provider that streams scripted delta sequences, one per request.
pub struct DeltaScriptProvider {
    scripts: Mutex<Vec<Vec<StreamDelta>>>,
    calls: Mutex<usize>,
}

impl DeltaScriptProvider {
    pub fn new(scripts: Vec<Vec<StreamDelta>>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ModelProvider for DeltaScriptProvider {
    fn name(&self) -> &str {
        "delta_script"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        Err(ProviderError::NotConfigured("delta_script only streams".into()))
    }

    async fn stream(&self, _request: CompletionRequest) -> Result<DeltaReceiver, ProviderError> {
        let script = {
            let mut calls = self.calls.lock().unwrap();
            let script = self.scripts.lock().unwrap().get(*calls).cloned();
            *calls += 1;
            script.ok_or_else(|| ProviderError::Unavailable("no scripted stream".into()))?
        };

        let (tx, rx) = tokio::sync::mpsc::channel(script.len().max(1));
        tokio::spawn(async move {
            for delta in script {
                if tx.send(Ok(delta)).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

/// A provider that never finishes a response.
///
/// `complete` never resolves; `stream` sends one text delta and then holds
/// the channel open without sending anything more.
pub struct StalledProvider;

#[async_trait]
impl ModelProvider for StalledProvider {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        futures::future::pending().await
    }

    async fn stream(&self, _request: CompletionRequest) -> Result<DeltaReceiver, ProviderError> {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        tokio::spawn(async move {
            if tx.send(Ok(StreamDelta::text("Thinking"))).await.is_ok() {
                futures::future::pending::<()>().await;
            }
            drop(tx);
        });
        Ok(rx)
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

/// A plain text answer.
pub fn text_response(text: &str) -> CompletionResponse {
    CompletionResponse {
        turn: Turn::assistant(Some(text.to_string()), vec![]),
        usage: usage(),
        model: "mock-model".into(),
    }
}

/// An answer requesting `tool_calls`, with optional text.
pub fn tool_call_response(tool_calls: Vec<ToolCallRequest>, text: Option<&str>) -> CompletionResponse {
    CompletionResponse {
        turn: Turn::assistant(text.map(String::from), tool_calls),
        usage: usage(),
        model: "mock-model".into(),
    }
}

/// A call to one of the built-in helpers.
pub fn helper_call(id: &str, name: &str, arguments: &str) -> ToolCallRequest {
    ToolCallRequest::new(id, toolloop_functions::HELPER_NAMESPACE, name, arguments)
}

/// Text split into a few deltas, then the final delta.
pub fn split_text(text: &str) -> Vec<StreamDelta> {
    let mut deltas: Vec<StreamDelta> = text
        .split_inclusive(' ')
        .map(StreamDelta::text)
        .collect();
    deltas.push(StreamDelta::finished(usage()));
    deltas
}

/// Tool calls streamed with their argument payloads cut into three pieces.
pub fn split_tool_calls(calls: &[ToolCallRequest]) -> Vec<StreamDelta> {
    let mut deltas = Vec::new();
    for (index, call) in calls.iter().enumerate() {
        let index = index as u32;
        let chars: Vec<char> = call.arguments.chars().collect();
        let third = chars.len().div_ceil(3).max(1);
        let pieces: Vec<String> = chars.chunks(third).map(|c| c.iter().collect()).collect();

        deltas.push(StreamDelta::tool_call(ToolCallDelta {
            index,
            id: Some(call.id.clone()),
            namespace: Some(call.namespace.clone()),
            name: Some(call.name.clone()),
            arguments: None,
        }));
        for piece in pieces {
            deltas.push(StreamDelta::tool_call(ToolCallDelta {
                index,
                arguments: Some(piece),
                ..ToolCallDelta::default()
            }));
        }
    }
    deltas.push(StreamDelta::finished(usage()));
    deltas
}

/// The built-in helper functions in a fresh catalog.
pub fn helper_catalog() -> Arc<FunctionCatalog> {
    let catalog = FunctionCatalog::new();
    catalog.register_provider(&helper_functions()).unwrap();
    Arc::new(catalog)
}

/// A `slow` namespace with `sleep(ms)`, `fail()` and `panic()`.
///
/// The flag is set whenever a `sleep` runs to completion.
pub fn slow_catalog() -> (Arc<FunctionCatalog>, Arc<AtomicBool>) {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();
    let set = FunctionSet::new("slow")
        .with_function(
            "sleep",
            "Sleeps for ms milliseconds",
            serde_json::json!({
                "type": "object",
                "properties": { "ms": { "type": "integer", "minimum": 0 } },
                "required": ["ms"]
            }),
            move |args| {
                let flag = flag.clone();
                async move {
                    let ms = args.get("ms").and_then(|v| v.as_u64()).unwrap_or_default();
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(serde_json::json!(ms))
                }
            },
        )
        .with_sync_function("fail", "Always fails", empty_parameters(), |_| {
            Err(anyhow::anyhow!("backend exploded"))
        })
        .with_sync_function("panic", "Always panics", empty_parameters(), |_| {
            panic!("function body panicked")
        });

    let catalog = FunctionCatalog::new();
    catalog.register_provider(&set).unwrap();
    (Arc::new(catalog), finished)
}

//! An offline model for the demo.
//!
//! It plays a fixed script: asked about a city, it requests the current time
//! and the city's weather, then phrases an answer from the tool results it
//! finds in the history. Streamed responses are cut into word-sized text
//! deltas and argument payloads split across several deltas.

use async_trait::async_trait;
use toolloop_core::error::ProviderError;
use toolloop_core::message::{Role, ToolCallRequest, Turn};
use toolloop_core::provider::{
    CompletionRequest, CompletionResponse, DeltaReceiver, ModelProvider, StreamDelta,
    ToolCallDelta, Usage,
};
use toolloop_functions::{HELPER_NAMESPACE, clock, weather};

const TIME_CALL: &str = "call_time";
const WEATHER_CALL: &str = "call_weather";

pub struct DemoProvider;

impl DemoProvider {
    fn respond(&self, request: &CompletionRequest) -> Result<Turn, ProviderError> {
        let Some(user_index) = request.turns.iter().rposition(|t| t.role == Role::User) else {
            return Err(ProviderError::InvalidResponse("no user turn to answer".into()));
        };
        let question = request.turns[user_index].content.clone().unwrap_or_default();
        let city = city_in(&question);
        let since_user = &request.turns[user_index + 1..];

        if request.functions.is_empty() {
            return Ok(Turn::assistant(
                Some(format!("I cannot look up {city} without any functions.")),
                vec![],
            ));
        }

        if since_user.is_empty() {
            let arguments = serde_json::json!({ "city": city }).to_string();
            return Ok(Turn::assistant(
                Some(format!("Let me check the time and the weather in {city}.")),
                vec![
                    ToolCallRequest::new(TIME_CALL, HELPER_NAMESPACE, clock::NAME, "{}"),
                    ToolCallRequest::new(WEATHER_CALL, HELPER_NAMESPACE, weather::SHORT_NAME, arguments),
                ],
            ));
        }

        let result_of = |call_id: &str| {
            since_user
                .iter()
                .filter_map(|t| t.tool_result.as_ref())
                .find(|r| r.call_id == call_id)
                .map(|r| r.render())
                .unwrap_or_else(|| "unknown".into())
        };
        Ok(Turn::assistant(
            Some(format!(
                "It is {} and the weather in {city} is {}.",
                result_of(TIME_CALL),
                result_of(WEATHER_CALL)
            )),
            vec![],
        ))
    }
}

#[async_trait]
impl ModelProvider for DemoProvider {
    fn name(&self) -> &str {
        "demo"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let turn = self.respond(&request)?;
        let prompt_tokens = request
            .turns
            .iter()
            .filter_map(|t| t.content.as_deref())
            .map(|c| c.split_whitespace().count() as u32)
            .sum();
        let completion_tokens = turn
            .content
            .as_deref()
            .map(|c| c.split_whitespace().count() as u32)
            .unwrap_or_default();
        Ok(CompletionResponse {
            turn,
            usage: Some(Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens.saturating_add(completion_tokens),
            }),
            model: request.settings.model,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<DeltaReceiver, ProviderError> {
        let response = self.complete(request).await?;
        let deltas = to_deltas(response.turn, response.usage);
        let (tx, rx) = tokio::sync::mpsc::channel(deltas.len());
        tokio::spawn(async move {
            for delta in deltas {
                if tx.send(Ok(delta)).await.is_err() {
                    break;
                }
                tokio::task::yield_now().await;
            }
        });
        Ok(rx)
    }
}

fn to_deltas(turn: Turn, usage: Option<Usage>) -> Vec<StreamDelta> {
    let mut deltas: Vec<StreamDelta> = turn
        .content
        .as_deref()
        .unwrap_or_default()
        .split_inclusive(' ')
        .map(StreamDelta::text)
        .collect();

    for (index, call) in turn.tool_calls.into_iter().enumerate() {
        let index = index as u32;
        let mut mid = call.arguments.len() / 2;
        while !call.arguments.is_char_boundary(mid) {
            mid -= 1;
        }
        let (head, tail) = call.arguments.split_at(mid);
        deltas.push(StreamDelta::tool_call(ToolCallDelta {
            index,
            id: Some(call.id),
            namespace: Some(call.namespace),
            name: Some(call.name),
            arguments: Some(head.to_string()),
        }));
        deltas.push(StreamDelta::tool_call(ToolCallDelta {
            index,
            arguments: Some(tail.to_string()),
            ..ToolCallDelta::default()
        }));
    }

    deltas.push(StreamDelta::finished(usage));
    deltas
}

/// The city a question asks about: whatever follows the last " in ".
fn city_in(question: &str) -> String {
    question
        .rsplit_once(" in ")
        .map(|(_, rest)| rest.trim_end_matches(['?', '.', '!', ' ']).trim().to_string())
        .filter(|city| !city.is_empty())
        .unwrap_or_else(|| "Paris".to_string())
}

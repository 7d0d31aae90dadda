//! Shared test helpers for loop tests.

use std::sync::Mutex;
use taskloop_core::error::ProviderError;
use taskloop_core::message::ContentBlock;
use taskloop_core::provider::{Provider, ProviderRequest, ProviderResponse, StopReason};
use taskloop_core::usage::Usage;

/// A mock provider that returns a sequence of scripted results.
///
/// Each call to `complete` returns the next entry in the queue and records
/// the request it was given. Panics if more calls are made than entries
/// provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    pub fn scripted(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let index = requests.len();

        if index >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{index}, have {})",
                responses.len()
            );
        }

        requests.push(request);
        responses[index].clone()
    }
}

/// A response that ends the turn with the given text.
pub fn make_text_response(text: &str) -> ProviderResponse {
    make_response(StopReason::EndTurn, vec![ContentBlock::text(text)], Usage::new(10, 5))
}

/// A response asking for the given tools, `(id, name, input)` each.
pub fn make_tool_call_response(
    calls: &[(&str, &str, serde_json::Value)],
    thought: &str,
) -> ProviderResponse {
    let mut content = Vec::new();
    if !thought.is_empty() {
        content.push(ContentBlock::text(thought));
    }
    for (id, name, input) in calls {
        content.push(ContentBlock::ToolUse {
            id: (*id).into(),
            name: (*name).into(),
            input: input.clone(),
        });
    }
    make_response(StopReason::ToolUse, content, Usage::new(20, 8))
}

pub fn make_response(stop_reason: StopReason, content: Vec<ContentBlock>, usage: Usage) -> ProviderResponse {
    ProviderResponse {
        content,
        stop_reason,
        usage,
        model: "mock-model".into(),
    }
}

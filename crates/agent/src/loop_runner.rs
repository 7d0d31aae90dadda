//! The agent reasoning loop implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use taskloop_config::AppConfig;
use taskloop_core::message::{ContentBlock, Conversation, Message, Role};
use taskloop_core::provider::{Provider, ProviderRequest};
use taskloop_core::tool::{ToolContext, ToolRegistry};
use taskloop_core::usage::UsageCounters;
use taskloop_tools::{ToolTimeouts, default_registry};
use tracing::{debug, info, warn};

use crate::budget::{ModelPricing, TurnBudget};
use crate::state::{LoopState, transition, unexpected_placeholder};

/// Result text for tool requests whose turn was aborted before they ran.
pub const INTERRUPTED_TOOL_RESULT: &str = "Error: Tool execution was interrupted";

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    Done,
    Truncated,
    Unexpected,
    BudgetExceeded,
}

/// What one user turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub text: String,
    pub status: TurnStatus,
    pub usage: UsageCounters,
    pub duration: Duration,
    pub estimated_cost_usd: f64,
}

impl TurnOutcome {
    /// Number of model calls made during the turn.
    pub fn model_calls(&self) -> u32 {
        self.usage.calls()
    }
}

/// The agent loop that alternates model calls and tool execution.
///
/// Owns the conversation for the whole session. Each call to
/// [`Agent::run_turn`] appends to it and never rewrites earlier messages.
pub struct Agent {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// Tools offered to the model
    tools: Arc<ToolRegistry>,

    /// Where tools resolve relative paths
    ctx: ToolContext,

    model: String,
    system_prompt: String,
    max_tokens: u32,
    temperature: Option<f32>,

    /// Per-turn call and spend limits
    budget: TurnBudget,

    conversation: Conversation,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        ctx: ToolContext,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            tools,
            ctx,
            model: model.into(),
            system_prompt: String::new(),
            max_tokens: 4096,
            temperature: None,
            budget: TurnBudget::default(),
            conversation: Conversation::new(),
        }
    }

    /// Build an agent with the built-in tools and the configured limits.
    pub fn from_config(config: &AppConfig, provider: Arc<dyn Provider>) -> taskloop_core::Result<Self> {
        let tools = default_registry(ToolTimeouts {
            bash: Duration::from_secs(config.tools.bash_timeout_secs),
            grep: Duration::from_secs(config.tools.grep_timeout_secs),
        })?;

        let budget = TurnBudget {
            max_iterations: config.agent.max_iterations,
            max_cost_usd: config.agent.max_budget_usd,
            pricing: ModelPricing::new(config.pricing.input_per_m, config.pricing.output_per_m),
        };

        let mut agent = Self::new(
            provider,
            Arc::new(tools),
            ToolContext::new(config.resolved_working_dir()),
            &config.model,
        )
        .with_system_prompt(&config.system_prompt)
        .with_max_tokens(config.max_tokens)
        .with_budget(budget);
        agent.temperature = config.temperature;
        Ok(agent)
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_budget(mut self, budget: TurnBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Start a fresh conversation.
    pub fn reset(&mut self) {
        self.conversation = Conversation::new();
    }

    /// Run one user turn to a terminal state.
    ///
    /// Model errors abort the turn and are returned as-is; whatever was
    /// appended before the failure stays in the conversation. Tool failures
    /// never abort: they reach the model as `Error: ` text.
    pub async fn run_turn(&mut self, input: &str) -> taskloop_core::Result<TurnOutcome> {
        let started = Instant::now();
        let mut usage = UsageCounters::new();

        info!(
            conversation_id = %self.conversation.id,
            messages = self.conversation.len(),
            "Processing turn"
        );

        self.push_user_input(input);

        let mut state = LoopState::Calling;
        let mut empty_tool_requests = 0u32;

        let terminal = loop {
            state = match state {
                LoopState::Calling => {
                    if let Some(reason) = self.budget.exceeded(&usage) {
                        warn!(
                            calls = usage.calls(),
                            "Turn budget exhausted before the model finished"
                        );
                        LoopState::BudgetExceeded(reason)
                    } else {
                        debug!(
                            conversation_id = %self.conversation.id,
                            iteration = usage.calls() + 1,
                            "Agent loop iteration"
                        );

                        let response = self.provider.complete(self.request()).await?;
                        usage.add(&response.usage);

                        let next = transition(&response);
                        if !response.content.is_empty() {
                            self.conversation
                                .push(Message::new(Role::Assistant, response.content));
                        }

                        match next {
                            LoopState::Calling => {
                                empty_tool_requests += 1;
                                warn!(
                                    occurrences = empty_tool_requests,
                                    "Model stopped for tool_use without requesting a tool"
                                );
                                if empty_tool_requests >= 2 {
                                    LoopState::Unexpected(unexpected_placeholder("tool_use"))
                                } else {
                                    LoopState::Calling
                                }
                            }
                            other => {
                                empty_tool_requests = 0;
                                other
                            }
                        }
                    }
                }
                LoopState::Dispatching(calls) => {
                    debug!(tool_count = calls.len(), "Executing tool calls");

                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        let record = self.tools.dispatch(call, &self.ctx).await;
                        results.push(ContentBlock::from(record));
                    }
                    self.conversation.push(Message::new(Role::User, results));
                    LoopState::Calling
                }
                terminal => break terminal,
            };
        };

        let (status, text) = match terminal {
            LoopState::Done(text) => (TurnStatus::Done, text),
            LoopState::Truncated(text) => (TurnStatus::Truncated, text),
            LoopState::Unexpected(text) => (TurnStatus::Unexpected, text),
            LoopState::BudgetExceeded(text) => (TurnStatus::BudgetExceeded, text),
            LoopState::Calling | LoopState::Dispatching(_) => {
                return Err(taskloop_core::Error::Internal(
                    "agent loop left in a non-terminal state".into(),
                ));
            }
        };

        let outcome = TurnOutcome {
            text,
            status,
            estimated_cost_usd: self.budget.pricing.cost(&usage.total()),
            usage,
            duration: started.elapsed(),
        };

        info!(
            status = ?outcome.status,
            calls = outcome.model_calls(),
            input_tokens = outcome.usage.total().input_tokens,
            output_tokens = outcome.usage.total().output_tokens,
            "Turn finished"
        );

        Ok(outcome)
    }

    /// Append the user's input, first answering any tool requests an aborted
    /// turn left behind.
    fn push_user_input(&mut self, input: &str) {
        let dangling = self.conversation.dangling_tool_uses();
        if !dangling.is_empty() {
            warn!(count = dangling.len(), "Closing tool requests from an interrupted turn");
        }

        let mut content: Vec<ContentBlock> = dangling
            .into_iter()
            .map(|id| ContentBlock::tool_error(id, INTERRUPTED_TOOL_RESULT))
            .collect();
        content.push(ContentBlock::text(input));
        self.conversation.push(Message::new(Role::User, content));
    }

    fn request(&self) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            system: self.system_prompt.clone(),
            messages: self.conversation.messages().to_vec(),
            tools: self.tools.definitions(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TRUNCATION_MARKER;
    use crate::test_helpers::*;
    use taskloop_core::error::ProviderError;
    use taskloop_core::provider::StopReason;
    use taskloop_core::usage::Usage;

    fn agent_with(provider: Arc<SequentialMockProvider>, dir: &std::path::Path) -> Agent {
        let tools = default_registry(ToolTimeouts::default()).unwrap();
        Agent::new(provider, Arc::new(tools), ToolContext::new(dir), "mock-model")
            .with_system_prompt("You manage tasks.")
    }

    fn tool_results(message: &Message) -> Vec<(String, String)> {
        message
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolResult { tool_use_id, content, .. } => {
                    Some((tool_use_id.clone(), content.clone()))
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn text_only_turn() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::new(vec![make_text_response("Hello!")]));
        let mut agent = agent_with(provider.clone(), dir.path());

        let outcome = agent.run_turn("Hi").await.unwrap();
        assert_eq!(outcome.text, "Hello!");
        assert_eq!(outcome.status, TurnStatus::Done);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(agent.conversation().len(), 2);

        let request = &provider.requests()[0];
        assert_eq!(request.system, "You manage tasks.");
        assert_eq!(request.tools.len(), 5);
        assert_eq!(request.tools[0].name, "read_file");
    }

    #[tokio::test]
    async fn tool_then_answer_makes_two_calls() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("task.md"), "status: pending").unwrap();
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response(
                &[("toolu_1", "read_file", serde_json::json!({"file_path": "task.md"}))],
                "Let me look.",
            ),
            make_text_response("The task is pending."),
        ]));
        let mut agent = agent_with(provider.clone(), dir.path());

        let outcome = agent.run_turn("What's the status?").await.unwrap();
        assert_eq!(outcome.text, "The task is pending.");
        assert_eq!(provider.call_count(), 2);
        assert_eq!(outcome.model_calls(), 2);

        // user, assistant(tool_use), user(tool_result), assistant(text)
        let messages = agent.conversation().messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].tool_use_ids(), vec!["toolu_1"]);
        assert_eq!(
            tool_results(&messages[2]),
            vec![("toolu_1".to_string(), "status: pending".to_string())]
        );

        let total = outcome.usage.total();
        assert_eq!(total.input_tokens, 30);
        assert_eq!(total.output_tokens, 13);

        // The second request carries the tool result.
        assert_eq!(provider.requests()[1].messages.len(), 3);
    }

    #[tokio::test]
    async fn results_keep_request_order_and_ids() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "alpha").unwrap();
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response(
                &[
                    ("id_z", "read_file", serde_json::json!({"file_path": "a.md"})),
                    ("id_a", "no_such_tool", serde_json::json!({})),
                    ("id_m", "read_file", serde_json::json!({})),
                ],
                "",
            ),
            make_text_response("done"),
        ]));
        let mut agent = agent_with(provider, dir.path());

        agent.run_turn("go").await.unwrap();

        let results = tool_results(&agent.conversation().messages()[2]);
        let ids: Vec<_> = results.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["id_z", "id_a", "id_m"]);
        assert_eq!(results[0].1, "alpha");
        assert_eq!(results[1].1, "Error: Unknown tool: no_such_tool");
        assert!(results[2].1.starts_with("Error:"));
    }

    #[tokio::test]
    async fn max_tokens_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::new(vec![make_response(
            StopReason::MaxTokens,
            vec![ContentBlock::text("Partial")],
            Usage::new(5, 100),
        )]));
        let mut agent = agent_with(provider, dir.path());

        let outcome = agent.run_turn("write a lot").await.unwrap();
        assert_eq!(outcome.status, TurnStatus::Truncated);
        assert!(outcome.text.starts_with("Partial"));
        assert!(outcome.text.ends_with(TRUNCATION_MARKER));
    }

    #[tokio::test]
    async fn unknown_stop_reason_with_no_text() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::new(vec![make_response(
            StopReason::Other("refusal".into()),
            vec![],
            Usage::new(5, 0),
        )]));
        let mut agent = agent_with(provider, dir.path());

        let outcome = agent.run_turn("hm").await.unwrap();
        assert_eq!(outcome.status, TurnStatus::Unexpected);
        assert!(outcome.text.contains("refusal"));
        // Empty assistant content is not recorded.
        assert_eq!(agent.conversation().len(), 1);
    }

    #[tokio::test]
    async fn single_empty_tool_request_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_response(StopReason::ToolUse, vec![ContentBlock::text("thinking")], Usage::new(1, 1)),
            make_text_response("ok"),
        ]));
        let mut agent = agent_with(provider.clone(), dir.path());

        let outcome = agent.run_turn("go").await.unwrap();
        assert_eq!(outcome.status, TurnStatus::Done);
        assert_eq!(provider.call_count(), 2);
        // No tool-result message was added.
        let roles: Vec<_> = agent.conversation().messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Assistant]);
    }

    #[tokio::test]
    async fn repeated_empty_tool_requests_end_the_turn() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_response(StopReason::ToolUse, vec![], Usage::new(1, 1)),
            make_response(StopReason::ToolUse, vec![], Usage::new(1, 1)),
        ]));
        let mut agent = agent_with(provider.clone(), dir.path());

        let outcome = agent.run_turn("go").await.unwrap();
        assert_eq!(outcome.status, TurnStatus::Unexpected);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn iteration_budget_stops_runaway_turn() {
        let dir = tempfile::tempdir().unwrap();
        let looping = |id: &'static str| {
            make_tool_call_response(&[(id, "glob", serde_json::json!({"pattern": "*.md"}))], "")
        };
        let provider = Arc::new(SequentialMockProvider::new(vec![
            looping("t1"),
            looping("t2"),
            looping("t3"),
        ]));
        let mut agent = agent_with(provider.clone(), dir.path()).with_budget(TurnBudget {
            max_iterations: 3,
            max_cost_usd: None,
            pricing: ModelPricing::default(),
        });

        let outcome = agent.run_turn("loop forever").await.unwrap();
        assert_eq!(outcome.status, TurnStatus::BudgetExceeded);
        assert_eq!(provider.call_count(), 3);
        // The last tool results are still recorded.
        let last = agent.conversation().last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(tool_results(last)[0].0, "t3");
    }

    #[tokio::test]
    async fn provider_error_propagates_and_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::scripted(vec![Err(
            ProviderError::AuthenticationFailed("bad key".into()),
        )]));
        let mut agent = agent_with(provider, dir.path());

        let err = agent.run_turn("hello").await.unwrap_err();
        assert!(matches!(
            err,
            taskloop_core::Error::Provider(ProviderError::AuthenticationFailed(_))
        ));
        assert_eq!(agent.conversation().len(), 1);
    }

    #[tokio::test]
    async fn usage_resets_each_turn() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_text_response("one"),
            make_text_response("two"),
        ]));
        let mut agent = agent_with(provider.clone(), dir.path());

        let first = agent.run_turn("1").await.unwrap();
        let second = agent.run_turn("2").await.unwrap();
        assert_eq!(first.usage.total(), Usage::new(10, 5));
        assert_eq!(second.usage.total(), Usage::new(10, 5));
        // History carries across turns.
        assert_eq!(provider.requests()[1].messages.len(), 3);
    }

    #[tokio::test]
    async fn dangling_tool_requests_are_closed_on_next_turn() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::new(vec![make_text_response("ok")]));
        let mut agent = agent_with(provider.clone(), dir.path());

        // Simulate a turn aborted between the tool request and its results.
        agent.conversation.push(Message::user("start"));
        agent.conversation.push(Message::new(
            Role::Assistant,
            vec![
                ContentBlock::ToolUse {
                    id: "a".into(),
                    name: "bash".into(),
                    input: serde_json::json!({"command": "sleep 60"}),
                },
                ContentBlock::ToolUse {
                    id: "b".into(),
                    name: "glob".into(),
                    input: serde_json::json!({"pattern": "*"}),
                },
            ],
        ));

        agent.run_turn("never mind").await.unwrap();

        let repaired = &agent.conversation().messages()[2];
        assert_eq!(
            tool_results(repaired),
            vec![
                ("a".to_string(), INTERRUPTED_TOOL_RESULT.to_string()),
                ("b".to_string(), INTERRUPTED_TOOL_RESULT.to_string()),
            ]
        );
        assert_eq!(repaired.text(), "never mind");
        assert!(
            repaired
                .content
                .iter()
                .filter(|b| matches!(b, ContentBlock::ToolResult { .. }))
                .all(|b| matches!(b, ContentBlock::ToolResult { is_error: true, .. }))
        );
    }

    #[tokio::test]
    async fn spend_budget_stops_turn_between_calls() {
        let dir = tempfile::tempdir().unwrap();
        let expensive = |id: &'static str| {
            make_response(
                StopReason::ToolUse,
                vec![ContentBlock::ToolUse {
                    id: id.into(),
                    name: "glob".into(),
                    input: serde_json::json!({"pattern": "*.md"}),
                }],
                Usage::new(400_000, 10_000),
            )
        };
        let provider = Arc::new(SequentialMockProvider::new(vec![
            expensive("t1"),
            expensive("t2"),
            make_text_response("never reached"),
        ]));
        // 400k input + 10k output at $3/$15 per million is $1.35 per call.
        let mut agent = agent_with(provider.clone(), dir.path()).with_budget(TurnBudget {
            max_iterations: 25,
            max_cost_usd: Some(2.0),
            pricing: ModelPricing::new(3.0, 15.0),
        });

        let outcome = agent.run_turn("expensive work").await.unwrap();
        assert_eq!(outcome.status, TurnStatus::BudgetExceeded);
        assert!(outcome.text.contains("turn budget"));
        assert_eq!(provider.call_count(), 2);
        assert!((outcome.estimated_cost_usd - 2.7).abs() < 1e-9);
        // Results of the last dispatched call are kept.
        assert_eq!(tool_results(agent.conversation().last().unwrap())[0].0, "t2");
    }

    #[tokio::test]
    async fn reset_starts_a_new_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(SequentialMockProvider::new(vec![make_text_response("hi")]));
        let mut agent = agent_with(provider, dir.path());
        agent.run_turn("hello").await.unwrap();
        let old_id = agent.conversation().id.clone();

        agent.reset();
        assert!(agent.conversation().is_empty());
        assert_ne!(agent.conversation().id, old_id);
    }

    #[tokio::test]
    async fn from_config_applies_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.working_dir = Some(dir.path().to_path_buf());
        config.model = "claude-test".into();
        config.max_tokens = 1234;
        config.system_prompt = "Be brief.".into();

        let provider = Arc::new(SequentialMockProvider::new(vec![make_text_response("ok")]));
        let mut agent = Agent::from_config(&config, provider.clone()).unwrap();
        agent.run_turn("hi").await.unwrap();

        let request = &provider.requests()[0];
        assert_eq!(request.model, "claude-test");
        assert_eq!(request.max_tokens, 1234);
        assert_eq!(request.system, "Be brief.");
    }
}

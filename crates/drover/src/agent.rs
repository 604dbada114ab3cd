//! The sampling loop: drives a multi-turn conversation between a model
//! provider and the tool collection until the model stops requesting tools,
//! the turn ceiling is reached, or the provider becomes unreachable.

use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use crate::models::message::{Message, MessageContent, ToolUse};
use crate::models::tool::ToolOutput;
use crate::providers::base::Provider;
use crate::retention;
use crate::retry::{call_with_retry, RetryPolicy};
use crate::tools::collection::ToolCollection;

/// Base system prompt for computer-use runs. The caller's suffix is appended
/// after a blank line.
pub const SYSTEM_PROMPT: &str = "\
You are using a browser-based virtual machine to complete tasks for a user.

<SYSTEM_CAPABILITY>
* You can interact with the screen through the computer tool: take screenshots, click, type, scroll, and press keys.
* A screenshot reflects the page at the moment it was taken. Take a fresh screenshot after navigating or whenever you are unsure of the current state.
* Some pages take a moment to load. If a screenshot looks incomplete, wait and take another one.
* When the task is complete, reply without calling any tools and summarize what you did.
</SYSTEM_CAPABILITY>";

pub type OutputCallback = Box<dyn Fn(&MessageContent) + Send + Sync>;
pub type ToolOutputCallback = Box<dyn Fn(&ToolOutput, &str) + Send + Sync>;
pub type ApiResponseCallback =
    Box<dyn Fn(&Value, Option<&Value>, Option<&anyhow::Error>) + Send + Sync>;

/// Observability hooks. All optional; an absent callback is a no-op.
#[derive(Default)]
pub struct Callbacks {
    output: Option<OutputCallback>,
    tool_output: Option<ToolOutputCallback>,
    api_response: Option<ApiResponseCallback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoked once per content block the model produces.
    pub fn on_output(mut self, f: impl Fn(&MessageContent) + Send + Sync + 'static) -> Self {
        self.output = Some(Box::new(f));
        self
    }

    /// Invoked once per completed tool call, with the tool_use id.
    pub fn on_tool_output(
        mut self,
        f: impl Fn(&ToolOutput, &str) + Send + Sync + 'static,
    ) -> Self {
        self.tool_output = Some(Box::new(f));
        self
    }

    /// Invoked once per raw provider exchange, success or failure.
    pub fn on_api_response(
        mut self,
        f: impl Fn(&Value, Option<&Value>, Option<&anyhow::Error>) + Send + Sync + 'static,
    ) -> Self {
        self.api_response = Some(Box::new(f));
        self
    }

    fn emit_output(&self, block: &MessageContent) {
        if let Some(f) = &self.output {
            f(block);
        }
    }

    fn emit_tool_output(&self, output: &ToolOutput, tool_use_id: &str) {
        if let Some(f) = &self.tool_output {
            f(output, tool_use_id);
        }
    }

    fn emit_api_response(
        &self,
        request: &Value,
        response: Option<&Value>,
        error: Option<&anyhow::Error>,
    ) {
        if let Some(f) = &self.api_response {
            f(request, response, error);
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Appended to the base system prompt.
    pub system_prompt_suffix: Option<String>,
    /// Safety ceiling on model calls per run. Reaching it is a soft
    /// termination, not an error.
    pub max_turns: usize,
    /// When set, prune old screenshots down to roughly this many.
    pub only_n_most_recent_images: Option<usize>,
    /// Screenshot removal granularity; see [`retention::prune_images`].
    pub image_removal_chunk: usize,
    pub retry: RetryPolicy,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            system_prompt_suffix: None,
            max_turns: 50,
            only_n_most_recent_images: None,
            image_removal_chunk: retention::DEFAULT_IMAGE_REMOVAL_CHUNK,
            retry: RetryPolicy::default(),
        }
    }
}

/// Owns one conversation-in-progress: the provider adapter, the tool
/// collection, and the loop configuration.
pub struct Agent {
    provider: Box<dyn Provider>,
    tools: ToolCollection,
    callbacks: Callbacks,
    config: LoopConfig,
}

impl Agent {
    pub fn new(provider: Box<dyn Provider>, tools: ToolCollection) -> Self {
        Self {
            provider,
            tools,
            callbacks: Callbacks::default(),
            config: LoopConfig::default(),
        }
    }

    pub fn with_callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    fn system_prompt(&self) -> String {
        match &self.config.system_prompt_suffix {
            Some(suffix) if !suffix.is_empty() => format!("{SYSTEM_PROMPT}\n\n{suffix}"),
            _ => SYSTEM_PROMPT.to_string(),
        }
    }

    /// Run the conversation to completion and hand it back.
    ///
    /// Each turn calls the model once and executes every requested tool in
    /// order, so the conversation grows by an assistant message and a user
    /// message per turn, except the final turn which adds only the assistant
    /// message. Tool failures come back as error-flagged tool results and
    /// never abort the run; only exhausted provider retries do.
    pub async fn run(&self, initial_messages: Vec<Message>) -> Result<Vec<Message>> {
        let mut messages = initial_messages;
        let system = self.system_prompt();
        let tool_params = self.tools.to_params();

        let mut turn = 0;
        loop {
            turn += 1;
            if turn > self.config.max_turns {
                debug!(max_turns = self.config.max_turns, "turn ceiling reached");
                return Ok(messages);
            }

            if self.provider.supports_prompt_caching() {
                retention::mark_cache_breakpoints(&mut messages);
            }

            let payload = self.provider.to_request(&system, &messages, &tool_params)?;
            let raw = call_with_retry(
                &self.config.retry,
                || self.provider.send(&payload),
                |err| self.callbacks.emit_api_response(&payload, None, Some(err)),
            )
            .await?;
            self.callbacks.emit_api_response(&payload, Some(&raw), None);

            let response = self.provider.parse_response(&raw)?;
            for block in &response.content {
                self.callbacks.emit_output(block);
            }

            let tool_uses: Vec<ToolUse> = response
                .content
                .iter()
                .filter_map(|block| block.as_tool_use())
                .cloned()
                .collect();

            messages.push(Message::assistant().with_blocks(response.content));

            if let Some(images_to_keep) = self.config.only_n_most_recent_images {
                retention::prune_images(
                    &mut messages,
                    images_to_keep,
                    self.config.image_removal_chunk,
                );
            }

            if tool_uses.is_empty() {
                return Ok(messages);
            }

            // Tools run strictly in call order: a later call may depend on
            // screen state mutated by an earlier one.
            let mut result_message = Message::user();
            for tool_use in &tool_uses {
                let output = self.tools.run(&tool_use.name, tool_use.input.clone()).await;
                self.callbacks.emit_tool_output(&output, &tool_use.id);
                result_message = result_message.with_content(output.into_tool_result(&tool_use.id));
            }
            messages.push(result_message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ToolError;
    use crate::models::role::Role;
    use crate::models::tool::Tool;
    use crate::providers::mock::MockProvider;
    use crate::tools::collection::AgentTool;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const FAKE_SCREENSHOT: &str = "c2NyZWVuc2hvdA==";

    /// A computer tool that answers every action with a screenshot and
    /// records the inputs it saw.
    struct FakeComputer {
        calls: Arc<Mutex<Vec<Value>>>,
    }

    impl FakeComputer {
        fn new() -> (Self, Arc<Mutex<Vec<Value>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl AgentTool for FakeComputer {
        fn name(&self) -> &'static str {
            "computer"
        }

        fn to_params(&self) -> Tool {
            Tool::new("computer", "fake screen", json!({"type": "object"}))
        }

        async fn run(&self, input: Value) -> Result<ToolOutput, ToolError> {
            self.calls.lock().unwrap().push(input);
            Ok(ToolOutput::screenshot(FAKE_SCREENSHOT))
        }
    }

    fn screenshot_request(id: &str) -> MessageContent {
        MessageContent::tool_use(id, "computer", json!({"action": "screenshot"}))
    }

    fn agent_with(provider: MockProvider) -> Agent {
        let (tool, _) = FakeComputer::new();
        Agent::new(Box::new(provider), ToolCollection::new(vec![Box::new(tool)]))
    }

    #[tokio::test]
    async fn test_simple_response() {
        let provider =
            MockProvider::new(vec![MockProvider::reply(vec![MessageContent::text("Hello!")])]);
        let agent = agent_with(provider);

        let messages = agent
            .run(vec![Message::user().with_text("Hi")])
            .await
            .unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content[0].as_text(), Some("Hello!"));
    }

    #[tokio::test]
    async fn test_screenshot_turn_then_continue() {
        // Turn 1 requests a screenshot; turn 2 finds the script exhausted and
        // terminates with an empty assistant message.
        let provider = MockProvider::new(vec![MockProvider::reply(vec![screenshot_request(
            "toolu_1",
        )])]);
        let (tool, calls) = FakeComputer::new();
        let agent = Agent::new(
            Box::new(provider),
            ToolCollection::new(vec![Box::new(tool)]),
        );

        let messages = agent
            .run(vec![Message::user().with_text("search for cats")])
            .await
            .unwrap();

        // [user prompt, assistant tool_use, user tool_result, assistant empty]
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content[0].as_tool_use().unwrap().id, "toolu_1");
        let result = messages[2].content[0].as_tool_result().unwrap();
        assert_eq!(result.tool_use_id, "toolu_1");
        assert!(result.content[0].is_image());
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_response_terminates_after_one_message() {
        let agent = agent_with(MockProvider::new(vec![]));
        let initial = vec![Message::user().with_text("hello?")];
        let initial_len = initial.len();

        let messages = agent.run(initial).await.unwrap();

        assert_eq!(messages.len(), initial_len + 1);
        assert_eq!(messages.last().unwrap().role, Role::Assistant);
        assert!(messages.last().unwrap().content.is_empty());
    }

    #[tokio::test]
    async fn test_turn_ceiling_is_a_soft_stop() {
        // The script would keep requesting tools forever; the ceiling cuts
        // the run short and returns the conversation as accumulated.
        let script: Vec<_> = (0..10)
            .map(|i| MockProvider::reply(vec![screenshot_request(&format!("toolu_{i}"))]))
            .collect();
        let provider = MockProvider::new(script);
        let probe = provider.clone();

        let (tool, _) = FakeComputer::new();
        let agent = Agent::new(
            Box::new(provider),
            ToolCollection::new(vec![Box::new(tool)]),
        )
        .with_config(LoopConfig {
            max_turns: 3,
            ..Default::default()
        });

        let messages = agent
            .run(vec![Message::user().with_text("loop forever")])
            .await
            .unwrap();

        // Three full turns: initial + 3 * (assistant + tool results), and
        // the model was called exactly three times.
        assert_eq!(messages.len(), 7);
        assert_eq!(probe.request_count(), 3);
    }

    #[tokio::test]
    async fn test_multiple_tool_calls_run_in_order() {
        let provider = MockProvider::new(vec![MockProvider::reply(vec![
            MessageContent::tool_use("a", "computer", json!({"action": "left_click", "n": 1})),
            MessageContent::tool_use("b", "computer", json!({"action": "screenshot", "n": 2})),
        ])]);
        let (tool, calls) = FakeComputer::new();
        let agent = Agent::new(
            Box::new(provider),
            ToolCollection::new(vec![Box::new(tool)]),
        );

        let messages = agent
            .run(vec![Message::user().with_text("click then look")])
            .await
            .unwrap();

        let seen = calls.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0]["n"], 1);
        assert_eq!(seen[1]["n"], 2);

        // Both results land in one user message, in call order.
        let results: Vec<&str> = messages[2]
            .content
            .iter()
            .map(|b| b.as_tool_result().unwrap().tool_use_id.as_str())
            .collect();
        assert_eq!(results, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_error_turn() {
        let provider = MockProvider::new(vec![MockProvider::reply(vec![
            MessageContent::tool_use("x", "teleport", json!({})),
        ])]);
        let agent = agent_with(provider);

        let messages = agent
            .run(vec![Message::user().with_text("go")])
            .await
            .unwrap();

        // The failure is an ordinary turn, not an error from run().
        let result = messages[2].content[0].as_tool_result().unwrap();
        assert!(result.is_error);
        assert!(result.content[0].as_text().unwrap().contains("Tool not found"));
        // The loop kept going and terminated naturally on the empty reply.
        assert_eq!(messages.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_scenario_reports_every_exchange() {
        let provider = MockProvider::new(vec![MockProvider::reply(vec![MessageContent::text(
            "Done",
        )])])
        .with_failures(2);

        let api_calls = Arc::new(AtomicUsize::new(0));
        let api_failures = Arc::new(AtomicUsize::new(0));
        let calls = api_calls.clone();
        let failures = api_failures.clone();

        let (tool, _) = FakeComputer::new();
        let agent = Agent::new(
            Box::new(provider),
            ToolCollection::new(vec![Box::new(tool)]),
        )
        .with_callbacks(Callbacks::new().on_api_response(move |_req, response, error| {
            calls.fetch_add(1, Ordering::SeqCst);
            if error.is_some() {
                failures.fetch_add(1, Ordering::SeqCst);
            } else {
                assert!(response.is_some());
            }
        }));

        let messages = agent
            .run(vec![Message::user().with_text("flaky network")])
            .await
            .unwrap();

        assert_eq!(messages.last().unwrap().content[0].as_text(), Some("Done"));
        assert_eq!(api_calls.load(Ordering::SeqCst), 3);
        assert_eq!(api_failures.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_propagate() {
        let provider = MockProvider::new(vec![]).with_failures(10);
        let agent = agent_with(provider).with_config(LoopConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                ..Default::default()
            },
            ..Default::default()
        });

        let err = agent
            .run(vec![Message::user().with_text("down")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("mock provider failure"));
    }

    #[tokio::test]
    async fn test_output_and_tool_callbacks_fire() {
        let provider = MockProvider::new(vec![
            MockProvider::reply(vec![
                MessageContent::text("Clicking"),
                screenshot_request("toolu_1"),
            ]),
            MockProvider::reply(vec![MessageContent::text("Done")]),
        ]);

        let blocks_seen = Arc::new(AtomicUsize::new(0));
        let tools_seen = Arc::new(Mutex::new(Vec::new()));
        let blocks = blocks_seen.clone();
        let tool_log = tools_seen.clone();

        let (tool, _) = FakeComputer::new();
        let agent = Agent::new(
            Box::new(provider),
            ToolCollection::new(vec![Box::new(tool)]),
        )
        .with_callbacks(
            Callbacks::new()
                .on_output(move |_| {
                    blocks.fetch_add(1, Ordering::SeqCst);
                })
                .on_tool_output(move |output, id| {
                    assert!(output.base64_image.is_some());
                    tool_log.lock().unwrap().push(id.to_string());
                }),
        );

        agent
            .run(vec![Message::user().with_text("go")])
            .await
            .unwrap();

        // Turn 1 produced two blocks, turn 2 one block.
        assert_eq!(blocks_seen.load(Ordering::SeqCst), 3);
        assert_eq!(*tools_seen.lock().unwrap(), vec!["toolu_1".to_string()]);
    }

    #[tokio::test]
    async fn test_image_pruning_keeps_conversation_bounded() {
        let script: Vec<_> = (0..6)
            .map(|i| MockProvider::reply(vec![screenshot_request(&format!("toolu_{i}"))]))
            .collect();
        let provider = MockProvider::new(script);
        let (tool, _) = FakeComputer::new();
        let agent = Agent::new(
            Box::new(provider),
            ToolCollection::new(vec![Box::new(tool)]),
        )
        .with_config(LoopConfig {
            only_n_most_recent_images: Some(2),
            image_removal_chunk: 1,
            ..Default::default()
        });

        let messages = agent
            .run(vec![Message::user().with_text("keep looking")])
            .await
            .unwrap();

        let image_count: usize = messages
            .iter()
            .flat_map(|m| &m.content)
            .filter_map(|b| b.as_tool_result())
            .map(|r| r.content.iter().filter(|c| c.is_image()).count())
            .sum();
        // Pruning runs before each tool round, so at most keep + the newest
        // turn's screenshot survive.
        assert!(image_count <= 3, "kept {image_count} images");
    }

    #[tokio::test]
    async fn test_caching_provider_gets_breakpoints() {
        let provider = MockProvider::new(vec![
            MockProvider::reply(vec![screenshot_request("toolu_1")]),
            MockProvider::reply(vec![MessageContent::text("Done")]),
        ])
        .with_prompt_caching();
        let (tool, _) = FakeComputer::new();
        let agent = Agent::new(
            Box::new(provider),
            ToolCollection::new(vec![Box::new(tool)]),
        );

        let messages = agent
            .run(vec![Message::user().with_text("go")])
            .await
            .unwrap();

        let marked = messages
            .iter()
            .filter(|m| m.content.iter().any(|b| b.cache_control().is_some()))
            .count();
        assert!(marked >= 1 && marked <= retention::MAX_CACHE_BREAKPOINTS);
    }

    #[test]
    fn test_system_prompt_suffix_appended() {
        let agent = agent_with(MockProvider::new(vec![])).with_config(LoopConfig {
            system_prompt_suffix: Some("Only browse example.com.".to_string()),
            ..Default::default()
        });
        let prompt = agent.system_prompt();
        assert!(prompt.starts_with(SYSTEM_PROMPT));
        assert!(prompt.ends_with("Only browse example.com."));
    }
}

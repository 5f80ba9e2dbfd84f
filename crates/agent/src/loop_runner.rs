//! The agent loop controller.
//!
//! Each step asks the model what to do next, parses the reply, and either
//! finishes, dispatches a tool, or feeds a format correction back:
//!
//! ```text
//! AWAITING_MODEL -> PARSING -> DISPATCHING_TOOL -> AWAITING_MODEL
//!                          \-> RETRY_PARSE      -> AWAITING_MODEL
//!                          \-> DONE | ABORTED
//! ```
//!
//! Two budgets guarantee termination: tool dispatches are capped by
//! `max_iterations` and malformed replies by `max_parse_retries`. Tool
//! failures become observations and never end a run. Completion errors
//! end it immediately.

use chrono::Utc;
use parley_core::event::{DomainEvent, EventBus};
use parley_core::message::SessionId;
use parley_core::provider::{CompletionClient, CompletionRequest};
use parley_core::tool::{Tool, ToolRegistry};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::parser::{Malformed, ParsedResponse, ToolCall, parse_response};
use crate::prompt::PromptBuilder;
use crate::scratchpad::{Scratchpad, ScratchpadEntry};

/// Generation halts right after a complete tool call or final answer.
pub const STOP_SEQUENCES: [&str; 2] = ["</tool_input>", "</final_answer>"];

/// Instruction fed back after a malformed reply.
pub const FORMAT_CORRECTION: &str =
    "Check your output and make sure it conforms to the expected format";

/// Partial text used when the budget runs out before the model said anything useful.
pub const EXHAUSTION_NOTICE: &str =
    "I reached the maximum number of reasoning steps before finding a final answer.";

/// Assistant turn recorded when a run gives up on malformed replies.
pub const PARSE_FAILURE_NOTICE: &str =
    "I couldn't produce a well-formed answer. Please rephrase your question.";

/// How a run ended. Exactly one per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "text", rename_all = "snake_case")]
pub enum LoopResult {
    FinalAnswer(String),
    Exhausted(String),
    ParseFailureExceeded,
}

impl LoopResult {
    /// Short outcome name for logs and events.
    pub fn outcome(&self) -> &'static str {
        match self {
            LoopResult::FinalAnswer(_) => "final_answer",
            LoopResult::Exhausted(_) => "exhausted",
            LoopResult::ParseFailureExceeded => "parse_failure_exceeded",
        }
    }

    /// The text stored as the assistant turn and shown to the user.
    pub fn reply_text(&self) -> &str {
        match self {
            LoopResult::FinalAnswer(text) | LoopResult::Exhausted(text) => text,
            LoopResult::ParseFailureExceeded => PARSE_FAILURE_NOTICE,
        }
    }
}

/// The auditable transcript of one run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRun {
    pub result: LoopResult,
    pub scratchpad: Scratchpad,
    pub model_calls: u32,
    pub iterations: u32,
    pub parse_failures: u32,
}

/// The core agent loop that orchestrates model calls and tool dispatch.
pub struct AgentLoop {
    /// The completion backend
    client: Arc<dyn CompletionClient>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Max tokens per response
    max_tokens: Option<u32>,

    /// Tool registry, read-only for the run
    tools: Arc<ToolRegistry>,

    /// Maximum tool dispatches per run
    max_iterations: u32,

    /// Malformed replies tolerated per run
    max_parse_retries: u32,

    prompts: PromptBuilder,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    /// Create a new agent loop with the default budgets (6 dispatches, 3 parse failures).
    pub fn new(
        client: Arc<dyn CompletionClient>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            tools,
            max_iterations: 6,
            max_parse_retries: 3,
            prompts: PromptBuilder::today(),
            event_bus,
        }
    }

    /// Set the maximum number of tool dispatches.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set how many malformed replies end the run.
    pub fn with_max_parse_retries(mut self, max: u32) -> Self {
        self.max_parse_retries = max;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the max tokens per model response.
    pub fn with_max_tokens(mut self, max: Option<u32>) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    fn correction_for(&self, malformed: &Malformed) -> String {
        match malformed {
            Malformed::UnknownTool(name) => format!(
                "{FORMAT_CORRECTION}. There is no tool named '{name}'; available tools: {}.",
                self.tools.names().join(", ")
            ),
            Malformed::EmptyFinalAnswer => {
                format!("{FORMAT_CORRECTION}. The final answer must not be empty.")
            }
            Malformed::NoRecognizedPattern => format!("{FORMAT_CORRECTION}."),
        }
    }

    /// Run the loop for one user input.
    ///
    /// `history` is the rendered conversation so far. Completion errors
    /// propagate; every other outcome is a [`LoopResult`].
    pub async fn run(
        &self,
        session: &SessionId,
        history: &str,
        user_input: &str,
    ) -> parley_core::Result<AgentRun> {
        let system = self.prompts.agent_system(&self.tools.catalogue());
        let stop: Vec<String> = STOP_SEQUENCES.iter().map(|s| s.to_string()).collect();

        let mut scratchpad = Scratchpad::new();
        let mut model_calls = 0u32;
        let mut iterations = 0u32;
        let mut parse_failures = 0u32;

        info!(
            session = %session,
            model = %self.model,
            max_iter = self.max_iterations,
            max_parse_retries = self.max_parse_retries,
            "Agent loop starting"
        );

        let finish = |result: LoopResult,
                      scratchpad: Scratchpad,
                      model_calls: u32,
                      iterations: u32,
                      parse_failures: u32| {
            info!(
                session = %session,
                outcome = result.outcome(),
                model_calls,
                iterations,
                parse_failures,
                "Agent loop finished"
            );
            AgentRun {
                result,
                scratchpad,
                model_calls,
                iterations,
                parse_failures,
            }
        };

        loop {
            // ── Call model ──
            let prompt = self
                .prompts
                .agent_prompt(history, user_input, &scratchpad.render());
            let request = CompletionRequest::new(self.model.clone(), system.clone(), prompt)
                .with_stop(stop.clone())
                .with_temperature(self.temperature)
                .with_max_tokens(self.max_tokens);

            let started = std::time::Instant::now();
            let response = self.client.complete(request).await?;
            model_calls += 1;

            self.event_bus.publish(DomainEvent::ModelCalled {
                session_id: session.to_string(),
                model: response.model.clone(),
                tokens_used: response.usage.map(|u| u.total_tokens).unwrap_or(0),
                duration_ms: started.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
            });

            // ── Parse ──
            let parsed = parse_response(&response.text, |name| self.tools.contains(name));
            let resolved = match parsed {
                ParsedResponse::FinalAnswer(answer) => {
                    return Ok(finish(
                        LoopResult::FinalAnswer(answer),
                        scratchpad,
                        model_calls,
                        iterations,
                        parse_failures,
                    ));
                }
                ParsedResponse::ToolCall(call) => match self.tools.get(&call.tool) {
                    Some(tool) => Ok((call, tool)),
                    None => Err(Malformed::UnknownTool(call.tool)),
                },
                ParsedResponse::Malformed(malformed) => Err(malformed),
            };
            let (call, tool): (ToolCall, &dyn Tool) = match resolved {
                Ok(resolved) => resolved,
                Err(malformed) => {
                    parse_failures += 1;
                    warn!(
                        session = %session,
                        reason = %malformed,
                        failures = parse_failures,
                        "Malformed model output"
                    );
                    self.event_bus.publish(DomainEvent::ParseFailed {
                        session_id: session.to_string(),
                        reason: malformed.to_string(),
                        failures: parse_failures,
                        timestamp: Utc::now(),
                    });

                    if parse_failures >= self.max_parse_retries {
                        return Ok(finish(
                            LoopResult::ParseFailureExceeded,
                            scratchpad,
                            model_calls,
                            iterations,
                            parse_failures,
                        ));
                    }

                    scratchpad.push_correction(response.text, self.correction_for(&malformed));
                    continue;
                }
            };

            // ── Dispatch tool ──
            if iterations >= self.max_iterations {
                let partial = call
                    .thought
                    .clone()
                    .or_else(|| scratchpad.last_thought().map(String::from))
                    .unwrap_or_else(|| EXHAUSTION_NOTICE.to_string());
                warn!(session = %session, max_iter = self.max_iterations, "Iteration budget exhausted");
                return Ok(finish(
                    LoopResult::Exhausted(partial),
                    scratchpad,
                    model_calls,
                    iterations,
                    parse_failures,
                ));
            }
            iterations += 1;

            debug!(session = %session, iteration = iterations, tool = %call.tool, "Dispatching tool");

            let started = std::time::Instant::now();
            let outcome = tool.invoke(&call.input).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            let success = outcome.is_ok();
            let observation = match outcome {
                Ok(output) => output,
                Err(e) => {
                    warn!(
                        session = %session,
                        tool = %call.tool,
                        error = %e,
                        "Tool failed, using fallback observation"
                    );
                    tool.fallback_error().to_string()
                }
            };

            self.event_bus.publish(DomainEvent::ToolInvoked {
                session_id: session.to_string(),
                tool_name: call.tool.clone(),
                success,
                duration_ms,
                timestamp: Utc::now(),
            });

            scratchpad.push_entry(ScratchpadEntry {
                thought: call.thought,
                tool: call.tool,
                tool_input: call.input,
                observation,
            });
        }
    }
}

//! Shared test helpers for agent tests.

use async_trait::async_trait;
use parley_core::error::{CompletionError, ToolError};
use parley_core::provider::{CompletionClient, CompletionRequest, CompletionResponse, Usage};
use parley_core::tool::Tool;
use std::sync::Mutex;

/// A completion client that returns a sequence of scripted replies.
///
/// Each call to `complete` returns the next reply in the script. Panics if
/// more calls are made than replies provided, unless built with
/// [`ScriptedClient::repeating`], which keeps returning the last reply.
pub struct ScriptedClient {
    script: Vec<String>,
    repeat_last: bool,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new<S: Into<String>>(script: impl IntoIterator<Item = S>) -> Self {
        Self {
            script: script.into_iter().map(Into::into).collect(),
            repeat_last: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A client that answers every call with the same text.
    pub fn repeating(text: &str) -> Self {
        Self {
            repeat_last: true,
            ..Self::new([text])
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let mut requests = self.requests.lock().unwrap();
        let index = requests.len();
        requests.push(request);

        let text = match self.script.get(index) {
            Some(text) => text.clone(),
            None if self.repeat_last && !self.script.is_empty() => {
                self.script[self.script.len() - 1].clone()
            }
            None => panic!(
                "ScriptedClient: no more replies (call #{}, have {})",
                index,
                self.script.len()
            ),
        };

        Ok(CompletionResponse {
            text,
            model: "mock-model".into(),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        })
    }
}

/// A client whose every call fails.
pub struct FailingClient;

#[async_trait]
impl CompletionClient for FailingClient {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        Err(CompletionError::Network("connection refused".into()))
    }
}

/// Returns `"{input}-observed"`.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "Echo"
    }

    fn description(&self) -> &str {
        "Echoes back the input"
    }

    async fn invoke(&self, input: &str) -> Result<String, ToolError> {
        Ok(format!("{input}-observed"))
    }
}

/// Always fails with a detailed error.
pub struct FailingTool;

pub const FAILING_TOOL_FALLBACK: &str = "Flaky is unavailable right now.";

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "Flaky"
    }

    fn description(&self) -> &str {
        "Never works"
    }

    fn fallback_error(&self) -> &str {
        FAILING_TOOL_FALLBACK
    }

    async fn invoke(&self, input: &str) -> Result<String, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "Flaky".into(),
            reason: format!("secret stack trace for {input}"),
        })
    }
}

//! The Parley agent: response parsing, the tool-using loop, and the
//! assistant router that answers a request in any chat mode.
//!
//! An agentic run follows a **Think -> Act -> Observe** cycle:
//!
//! 1. **Load** the session history
//! 2. **Ask** the model for the next step, with the scratchpad so far
//! 3. **If a tool call**: dispatch it, record the observation, loop back to 2
//! 4. **If a final answer**: record the exchange and return it
//!
//! The loop also ends when a budget runs out: tool dispatches or malformed
//! replies.

pub mod assistant;
pub mod loop_runner;
pub mod parser;
pub mod prompt;
pub mod scratchpad;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use assistant::{Assistant, AssistantSettings, ChatResponse, DOCUMENT_REQUIRED, RunRequest};
pub use loop_runner::{AgentLoop, AgentRun, LoopResult};
pub use parser::{Malformed, ParsedResponse, ToolCall, parse_response};
pub use prompt::{PromptBuilder, extract_markdown};
pub use scratchpad::{Scratchpad, ScratchpadEntry, ScratchpadStep};
pub use session::SessionManager;

//! Scratchpad: the in-run record of tool calls, observations, and format
//! corrections that feeds the next model call.
//!
//! Only tool entries count toward the iteration budget. Corrections are
//! rendered into the prompt like any other step but are not entries.

use serde::Serialize;

/// A completed tool dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScratchpadEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    pub tool: String,
    pub tool_input: String,
    pub observation: String,
}

/// One step of a run, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScratchpadStep {
    Tool(ScratchpadEntry),
    Correction { output: String, instruction: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Scratchpad {
    steps: Vec<ScratchpadStep>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_entry(&mut self, entry: ScratchpadEntry) {
        self.steps.push(ScratchpadStep::Tool(entry));
    }

    pub fn push_correction(&mut self, output: impl Into<String>, instruction: impl Into<String>) {
        self.steps.push(ScratchpadStep::Correction {
            output: output.into(),
            instruction: instruction.into(),
        });
    }

    pub fn steps(&self) -> &[ScratchpadStep] {
        &self.steps
    }

    /// Tool entries in dispatch order.
    pub fn entries(&self) -> impl Iterator<Item = &ScratchpadEntry> {
        self.steps.iter().filter_map(|step| match step {
            ScratchpadStep::Tool(entry) => Some(entry),
            ScratchpadStep::Correction { .. } => None,
        })
    }

    pub fn entry_count(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The most recent thought recorded with a tool entry.
    pub fn last_thought(&self) -> Option<&str> {
        self.entries()
            .filter_map(|entry| entry.thought.as_deref())
            .last()
    }

    /// Render the steps in the same protocol the model writes.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            match step {
                ScratchpadStep::Tool(entry) => {
                    if let Some(thought) = &entry.thought {
                        out.push_str(&format!("<thinking>{thought}</thinking>\n"));
                    }
                    out.push_str(&format!(
                        "<tool>{}</tool><tool_input>{}</tool_input><observation>{}</observation>\n",
                        entry.tool, entry.tool_input, entry.observation
                    ));
                }
                ScratchpadStep::Correction {
                    output,
                    instruction,
                } => {
                    out.push_str(&format!(
                        "<invalid_output>{output}</invalid_output><observation>{instruction}</observation>\n"
                    ));
                }
            }
        }
        out
    }
}

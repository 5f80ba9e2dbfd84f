//! Response parser: classifies raw model text.
//!
//! The model speaks a small XML-ish protocol:
//!
//! ```text
//! <thinking>why</thinking>
//! <tool>WebSearch</tool><tool_input>rust 2024 edition</tool_input>
//! ```
//!
//! or
//!
//! ```text
//! <final_answer>The answer.</final_answer>
//! ```
//!
//! `</tool_input>` and `</final_answer>` are stop sequences, so the backend
//! usually swallows them: an open tag that is never closed runs to the end
//! of the text. Everything string-shaped about the protocol stays in this
//! module; callers only see [`ParsedResponse`].

const FINAL_OPEN: &str = "<final_answer>";
const FINAL_CLOSE: &str = "</final_answer>";
const TOOL_OPEN: &str = "<tool>";
const TOOL_CLOSE: &str = "</tool>";
const INPUT_OPEN: &str = "<tool_input>";
const INPUT_CLOSE: &str = "</tool_input>";
const THINKING_OPEN: &str = "<thinking>";
const THINKING_CLOSE: &str = "</thinking>";

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    /// Reasoning the model gave before the call, if any.
    pub thought: Option<String>,
    pub tool: String,
    pub input: String,
}

/// Why a response could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Malformed {
    /// A final answer with nothing in it.
    EmptyFinalAnswer,
    /// A well-formed call to a tool that is not registered.
    UnknownTool(String),
    /// Neither a final answer nor a tool call.
    NoRecognizedPattern,
}

impl std::fmt::Display for Malformed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Malformed::EmptyFinalAnswer => write!(f, "empty final answer"),
            Malformed::UnknownTool(name) => write!(f, "unknown tool '{name}'"),
            Malformed::NoRecognizedPattern => write!(f, "no recognized pattern"),
        }
    }
}

/// The classification of one model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedResponse {
    FinalAnswer(String),
    ToolCall(ToolCall),
    Malformed(Malformed),
}

/// Classify `text`. `is_known_tool` decides whether a tool name exists.
///
/// Pure: the same text and tool set always give the same result.
pub fn parse_response(text: &str, is_known_tool: impl Fn(&str) -> bool) -> ParsedResponse {
    let text = text.replace("\r\n", "\n");

    if let Some(body) = enclosed(&text, FINAL_OPEN, FINAL_CLOSE) {
        let answer = normalize_whitespace(body);
        return if answer.is_empty() {
            ParsedResponse::Malformed(Malformed::EmptyFinalAnswer)
        } else {
            ParsedResponse::FinalAnswer(answer)
        };
    }

    let Some(call) = tool_call(&text) else {
        return ParsedResponse::Malformed(Malformed::NoRecognizedPattern);
    };

    if is_known_tool(&call.tool) {
        ParsedResponse::ToolCall(call)
    } else {
        ParsedResponse::Malformed(Malformed::UnknownTool(call.tool))
    }
}

/// Content after `open`, up to `close` or the end of the text.
fn enclosed<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let rest = &text[start..];
    Some(match rest.find(close) {
        Some(end) => &rest[..end],
        None => rest,
    })
}

fn tool_call(text: &str) -> Option<ToolCall> {
    let tool_start = text.find(TOOL_OPEN)?;
    let after_open = &text[tool_start + TOOL_OPEN.len()..];
    let name_end = after_open.find(TOOL_CLOSE)?;
    let tool = after_open[..name_end].trim();
    if tool.is_empty() {
        return None;
    }

    // Only whitespace may separate </tool> from <tool_input>.
    let after_name = after_open[name_end + TOOL_CLOSE.len()..].trim_start();
    let input_body = after_name.strip_prefix(INPUT_OPEN)?;
    let input = match input_body.find(INPUT_CLOSE) {
        Some(end) => &input_body[..end],
        None => input_body,
    };

    Some(ToolCall {
        thought: thought(&text[..tool_start]),
        tool: tool.to_string(),
        input: input.trim().to_string(),
    })
}

/// The `<thinking>` content before a tool call, or the bare text there.
fn thought(preamble: &str) -> Option<String> {
    let raw = match preamble.find(THINKING_OPEN) {
        Some(_) => enclosed(preamble, THINKING_OPEN, THINKING_CLOSE).unwrap_or_default(),
        None => preamble,
    };
    let thought = normalize_whitespace(raw);
    (!thought.is_empty()).then_some(thought)
}

/// Trim trailing whitespace per line, collapse blank-line runs to one,
/// and trim the whole.
fn normalize_whitespace(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim_end) {
        if line.is_empty() && out.last().is_some_and(|prev| prev.is_empty()) {
            continue;
        }
        out.push(line);
    }
    out.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(name: &str) -> bool {
        matches!(name, "Echo" | "WebSearch")
    }

    #[test]
    fn final_answer_closed() {
        assert_eq!(
            parse_response("<final_answer>done</final_answer>", known),
            ParsedResponse::FinalAnswer("done".into())
        );
    }

    #[test]
    fn final_answer_with_stop_sequence_consumed() {
        assert_eq!(
            parse_response("<thinking>easy</thinking>\n<final_answer>Hello there", known),
            ParsedResponse::FinalAnswer("Hello there".into())
        );
    }

    #[test]
    fn final_answer_whitespace_normalized() {
        let raw = "<final_answer>\r\n  Line one   \r\n\r\n\r\n\r\nLine two\t\n\n</final_answer>";
        assert_eq!(
            parse_response(raw, known),
            ParsedResponse::FinalAnswer("Line one\n\nLine two".into())
        );
    }

    #[test]
    fn empty_final_answer_is_malformed() {
        assert_eq!(
            parse_response("<final_answer>  \n </final_answer>", known),
            ParsedResponse::Malformed(Malformed::EmptyFinalAnswer)
        );
    }

    #[test]
    fn final_answer_wins_over_tool_call() {
        let raw = "<tool>Echo</tool><tool_input>x</tool_input><final_answer>ok</final_answer>";
        assert_eq!(
            parse_response(raw, known),
            ParsedResponse::FinalAnswer("ok".into())
        );
    }

    #[test]
    fn tool_call_with_thinking() {
        let raw = "<thinking>I should echo</thinking>\n<tool>Echo</tool>\n  <tool_input> hi </tool_input>";
        assert_eq!(
            parse_response(raw, known),
            ParsedResponse::ToolCall(ToolCall {
                thought: Some("I should echo".into()),
                tool: "Echo".into(),
                input: "hi".into(),
            })
        );
    }

    #[test]
    fn tool_call_with_stop_sequence_consumed() {
        let raw = "Let me look that up.\n<tool>WebSearch</tool><tool_input>rust news";
        match parse_response(raw, known) {
            ParsedResponse::ToolCall(call) => {
                assert_eq!(call.tool, "WebSearch");
                assert_eq!(call.input, "rust news");
                assert_eq!(call.thought.as_deref(), Some("Let me look that up."));
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn unknown_tool_is_malformed() {
        assert_eq!(
            parse_response("<tool>Calculator</tool><tool_input>1+1</tool_input>", known),
            ParsedResponse::Malformed(Malformed::UnknownTool("Calculator".into()))
        );
    }

    #[test]
    fn text_between_tool_and_input_is_rejected() {
        assert_eq!(
            parse_response("<tool>Echo</tool> then <tool_input>hi</tool_input>", known),
            ParsedResponse::Malformed(Malformed::NoRecognizedPattern)
        );
    }

    #[test]
    fn tool_without_input_is_rejected() {
        assert_eq!(
            parse_response("<tool>Echo</tool>", known),
            ParsedResponse::Malformed(Malformed::NoRecognizedPattern)
        );
    }

    #[test]
    fn unclosed_tool_name_is_rejected() {
        assert_eq!(
            parse_response("<tool>Echo<tool_input>hi", known),
            ParsedResponse::Malformed(Malformed::NoRecognizedPattern)
        );
    }

    #[test]
    fn plain_prose_is_no_pattern() {
        assert_eq!(
            parse_response("I think the answer is 42.", known),
            ParsedResponse::Malformed(Malformed::NoRecognizedPattern)
        );
        assert_eq!(
            parse_response("", known),
            ParsedResponse::Malformed(Malformed::NoRecognizedPattern)
        );
    }

    #[test]
    fn parsing_is_deterministic() {
        let raw = "<tool>Echo</tool><tool_input>same</tool_input>";
        assert_eq!(parse_response(raw, known), parse_response(raw, known));
    }

    #[test]
    fn odd_input_never_panics() {
        for raw in [
            "<final_answer>",
            "</final_answer><final_answer>",
            "<tool></tool><tool_input>",
            "<tool>é</tool><tool_input>ü",
            "<thinking>",
            "<<<>>>",
        ] {
            let _ = parse_response(raw, known);
        }
    }
}

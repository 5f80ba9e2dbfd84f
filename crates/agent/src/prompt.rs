//! Prompt construction for every chat mode.
//!
//! The date is fixed when the builder is created so a whole run sees the
//! same "today".

use chrono::NaiveDate;
use parley_core::search::ScoredDocument;

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    today: NaiveDate,
}

impl PromptBuilder {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// A builder dated with the local calendar date.
    pub fn today() -> Self {
        Self::new(chrono::Local::now().date_naive())
    }

    // ── Agentic ──

    pub fn agent_system(&self, catalogue: &str) -> String {
        format!(
            "You are a helpful assistant. Use the <conversation_history> to avoid duplicating work when answering questions.\n\n\
             Available tools:\n<tools>\n{catalogue}\n</tools>\n\n\
             To answer, first review the <conversation_history>. If it is not enough, use tools with the following format:\n\
             <thinking>Think about which tool to use and why</thinking>\n\
             <tool>tool_name</tool><tool_input>input</tool_input>\n\
             You will then receive <observation>tool response</observation>.\n\n\
             When you are done, give the final answer in markdown within <final_answer></final_answer>.\n\
             If the user input is a greeting or cannot be answered with the available tools, answer directly within <final_answer> tags.\n\n\
             The date today is {}.",
            self.today
        )
    }

    pub fn agent_prompt(&self, history: &str, user_input: &str, scratchpad: &str) -> String {
        format!(
            "Begin!\n\n\
             Previous conversation history:\n<conversation_history>\n{history}\n</conversation_history>\n\n\
             User input message:\n<user_input>\n{user_input}\n</user_input>\n\n\
             {scratchpad}"
        )
    }

    // ── Basic ──

    pub fn basic_system(&self) -> String {
        format!(
            "You are a friendly and knowledgeable assistant with a warm and approachable tone.\n\
             Give helpful and accurate information while keeping the conversation engaging.\n\n\
             1. Use the conversation history inside <conversation_history> for context, focusing on the most recent and relevant parts.\n\
             2. If you do not have enough information for a complete answer, say so politely and suggest sources the user could consult.\n\
             3. Match the user's level of formality while staying professional.\n\
             4. Your response must be valid markdown put inside <markdown> tags.\n\n\
             The date today is {}.",
            self.today
        )
    }

    pub fn basic_prompt(&self, history: &str, user_input: &str) -> String {
        format!(
            "Current conversation history:\n<conversation_history>\n{history}\n</conversation_history>\n\n\
             Here is the user's next reply:\n<user_input>\n{user_input}\n</user_input>"
        )
    }

    // ── Retrieval ──

    pub fn rag_system(&self) -> String {
        format!(
            "Use the documents inside <documents> to answer the question. \
             If the answer is not in the documents, say that you don't know. \
             Answer in markdown.\n\nThe date today is {}.",
            self.today
        )
    }

    pub fn rag_prompt(&self, documents: &[ScoredDocument], user_input: &str) -> String {
        let mut rendered = String::new();
        for (i, doc) in documents.iter().enumerate() {
            rendered.push_str(&format!("<document index=\"{}\">\n{}\n</document>\n", i + 1, doc.content.trim()));
        }
        format!("<documents>\n{rendered}</documents>\n\n<input>\n{user_input}\n</input>")
    }

    // ── Analytics ──

    pub fn analytics_system(&self) -> String {
        "Answer the question using the SQL result inside <sql_result>. \
         If the result reports a failure, apologize and ask the user to refine the question. \
         Answer in markdown."
            .to_string()
    }

    pub fn analytics_prompt(&self, user_input: &str, sql_result: &str) -> String {
        format!("<sql_result>\n{sql_result}\n</sql_result>\n\n<input>\n{user_input}\n</input>")
    }

    // ── Document ──

    pub fn document_system(&self) -> &'static str {
        "<rules>\n\
         1. Answer the <input> question based on the document in <content>.\n\
         2. If the answer is not explicitly in the content, say that you don't know.\n\
         3. Answer in markdown format.\n\
         4. Be detailed in your response.\n\
         </rules>"
    }

    pub fn document_prompt(&self, user_input: &str, content: &str) -> String {
        format!("<input>\n{user_input}\n</input>\n<content>\n{content}\n</content>")
    }
}

/// Return the content of the first `<markdown>` block, or the whole text
/// trimmed when there is none. An unclosed block runs to the end.
pub fn extract_markdown(text: &str) -> String {
    const OPEN: &str = "<markdown>";
    const CLOSE: &str = "</markdown>";

    let Some(start) = text.find(OPEN) else {
        return text.trim().to_string();
    };
    let body = &text[start + OPEN.len()..];
    let body = match body.find(CLOSE) {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim().to_string()
}

//! The assistant router: one entry point for every chat mode.
//!
//! Built once per process. Every run loads the session history, answers
//! with the requested strategy, and records exactly one exchange.

use chrono::Utc;
use parley_config::AppConfig;
use parley_core::error::{Error, USER_FACING_FAILURE};
use parley_core::event::{DomainEvent, EventBus};
use parley_core::message::{ChatMode, SessionId, Turn, render_history};
use parley_core::provider::{CompletionClient, CompletionRequest};
use parley_core::search::VectorStore;
use parley_core::tool::ToolRegistry;
use parley_tools::AnalyticsQaTool;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::loop_runner::{AgentLoop, LoopResult};
use crate::prompt::{PromptBuilder, extract_markdown};
use crate::session::SessionManager;

/// Reply for document mode when no document text was supplied.
pub const DOCUMENT_REQUIRED: &str = "Please provide the document content for this question.";

/// Model settings shared by every mode.
#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub top_k: usize,
    pub max_iterations: u32,
    pub max_parse_retries: u32,
}

impl AssistantSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.agent.temperature,
            max_tokens: (config.agent.max_tokens > 0).then_some(config.agent.max_tokens),
            top_k: config.retrieval.top_k,
            max_iterations: config.agent.max_iterations,
            max_parse_retries: config.agent.max_parse_retries,
        }
    }
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// One user request.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub session_id: SessionId,
    pub user_input: String,
    pub mode: ChatMode,
    /// Clear the session before loading its history.
    pub clean_history: bool,
    /// Overrides the configured dispatch budget for agentic runs.
    pub max_iterations: Option<u32>,
    /// Overrides the configured parse-failure budget for agentic runs.
    pub max_parse_retries: Option<u32>,
    /// Document text for document mode.
    pub document: Option<String>,
}

impl RunRequest {
    pub fn new(session_id: impl Into<SessionId>, user_input: impl Into<String>, mode: ChatMode) -> Self {
        Self {
            session_id: session_id.into(),
            user_input: user_input.into(),
            mode,
            clean_history: false,
            max_iterations: None,
            max_parse_retries: None,
            document: None,
        }
    }

    pub fn with_clean_history(mut self, clean: bool) -> Self {
        self.clean_history = clean;
        self
    }

    pub fn with_max_iterations(mut self, max: Option<u32>) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_parse_retries(mut self, max: Option<u32>) -> Self {
        self.max_parse_retries = max;
        self
    }

    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }
}

/// What the caller shows the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub text: String,
    /// `final_answer`, `exhausted`, `parse_failure_exceeded`, or `failed`.
    pub outcome: String,
}

pub struct Assistant {
    client: Arc<dyn CompletionClient>,
    tools: Arc<ToolRegistry>,
    sessions: SessionManager,
    documents: Option<Arc<dyn VectorStore>>,
    analytics: Option<AnalyticsQaTool>,
    settings: AssistantSettings,
    prompts: Option<PromptBuilder>,
    event_bus: Arc<EventBus>,
}

impl Assistant {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        tools: Arc<ToolRegistry>,
        sessions: SessionManager,
        settings: AssistantSettings,
    ) -> Self {
        Self {
            client,
            tools,
            sessions,
            documents: None,
            analytics: None,
            settings,
            prompts: None,
            event_bus: Arc::new(EventBus::default()),
        }
    }

    /// Enable rag mode over this store.
    pub fn with_documents(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.documents = Some(store);
        self
    }

    /// Enable analytics mode.
    pub fn with_analytics(mut self, analytics: AnalyticsQaTool) -> Self {
        self.analytics = Some(analytics);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = bus;
        self
    }

    /// Pin the prompt date instead of using today's.
    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = Some(prompts);
        self
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Answer one request and record the exchange.
    ///
    /// Completion and store failures end the run with an error; nothing is
    /// recorded for a failed run.
    pub async fn run(&self, request: &RunRequest) -> parley_core::Result<LoopResult> {
        let session = &request.session_id;
        info!(session = %session, mode = %request.mode, "Run started");
        self.event_bus.publish(DomainEvent::RunStarted {
            session_id: session.to_string(),
            mode: request.mode.to_string(),
            timestamp: Utc::now(),
        });

        let outcome = self.run_inner(request).await;

        self.event_bus.publish(DomainEvent::RunFinished {
            session_id: session.to_string(),
            outcome: match &outcome {
                Ok(result) => result.outcome().to_string(),
                Err(_) => "failed".to_string(),
            },
            timestamp: Utc::now(),
        });
        outcome
    }

    /// Like [`Assistant::run`], but never fails: errors are logged and the
    /// user sees a fixed message.
    pub async fn respond(&self, request: &RunRequest) -> ChatResponse {
        match self.run(request).await {
            Ok(result) => ChatResponse {
                session_id: request.session_id.to_string(),
                text: result.reply_text().to_string(),
                outcome: result.outcome().to_string(),
            },
            Err(e) => {
                error!(session = %request.session_id, mode = %request.mode, error = %e, "Run failed");
                ChatResponse {
                    session_id: request.session_id.to_string(),
                    text: USER_FACING_FAILURE.to_string(),
                    outcome: "failed".to_string(),
                }
            }
        }
    }

    async fn run_inner(&self, request: &RunRequest) -> parley_core::Result<LoopResult> {
        let session = &request.session_id;
        let turns = self.sessions.prepare(session, request.clean_history).await?;
        let prompts = self.prompts.clone().unwrap_or_else(PromptBuilder::today);
        let input = request.user_input.as_str();

        let result = match request.mode {
            ChatMode::Basic => self.basic(&prompts, &turns, input).await?,
            ChatMode::Agentic => self.agentic(&prompts, request, &turns).await?,
            ChatMode::Rag => self.rag(&prompts, input).await?,
            ChatMode::Analytics => self.analytics(&prompts, input).await?,
            ChatMode::Document => {
                self.document(&prompts, input, request.document.as_deref())
                    .await?
            }
        };

        self.sessions
            .record(session, input, result.reply_text())
            .await?;
        debug!(session = %session, outcome = result.outcome(), "Exchange recorded");
        Ok(result)
    }

    async fn complete(&self, system: String, prompt: String) -> parley_core::Result<String> {
        let request = CompletionRequest::new(self.settings.model.clone(), system, prompt)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);
        Ok(self.client.complete(request).await?.text)
    }

    // ── Strategies ──

    async fn basic(
        &self,
        prompts: &PromptBuilder,
        turns: &[Turn],
        input: &str,
    ) -> parley_core::Result<LoopResult> {
        let reply = self
            .complete(
                prompts.basic_system(),
                prompts.basic_prompt(&render_history(turns), input),
            )
            .await?;
        Ok(LoopResult::FinalAnswer(extract_markdown(&reply)))
    }

    async fn agentic(
        &self,
        prompts: &PromptBuilder,
        request: &RunRequest,
        turns: &[Turn],
    ) -> parley_core::Result<LoopResult> {
        let agent = AgentLoop::new(
            self.client.clone(),
            self.settings.model.clone(),
            self.tools.clone(),
            self.event_bus.clone(),
        )
        .with_temperature(self.settings.temperature)
        .with_max_tokens(self.settings.max_tokens)
        .with_max_iterations(request.max_iterations.unwrap_or(self.settings.max_iterations))
        .with_max_parse_retries(
            request
                .max_parse_retries
                .unwrap_or(self.settings.max_parse_retries),
        )
        .with_prompts(prompts.clone());

        let run = agent
            .run(&request.session_id, &render_history(turns), &request.user_input)
            .await?;
        Ok(run.result)
    }

    async fn rag(&self, prompts: &PromptBuilder, input: &str) -> parley_core::Result<LoopResult> {
        let store = self
            .documents
            .as_ref()
            .ok_or_else(|| Error::NotConfigured("rag mode needs a document store".into()))?;

        let hits = store.similarity_search(input, self.settings.top_k).await?;
        debug!(hits = hits.len(), store = store.name(), "Retrieved documents");

        let reply = self
            .complete(prompts.rag_system(), prompts.rag_prompt(&hits, input))
            .await?;
        Ok(LoopResult::FinalAnswer(reply.trim().to_string()))
    }

    async fn analytics(
        &self,
        prompts: &PromptBuilder,
        input: &str,
    ) -> parley_core::Result<LoopResult> {
        let analytics = self
            .analytics
            .as_ref()
            .ok_or_else(|| Error::NotConfigured("analytics mode needs a database".into()))?;

        let sql_result = analytics.query(input).await?;
        let reply = self
            .complete(
                prompts.analytics_system(),
                prompts.analytics_prompt(input, &sql_result),
            )
            .await?;
        Ok(LoopResult::FinalAnswer(reply.trim().to_string()))
    }

    async fn document(
        &self,
        prompts: &PromptBuilder,
        input: &str,
        document: Option<&str>,
    ) -> parley_core::Result<LoopResult> {
        let content = document.map(str::trim).unwrap_or_default();
        if content.is_empty() {
            return Ok(LoopResult::FinalAnswer(DOCUMENT_REQUIRED.to_string()));
        }

        let reply = self
            .complete(
                prompts.document_system().to_string(),
                prompts.document_prompt(input, content),
            )
            .await?;
        Ok(LoopResult::FinalAnswer(reply.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{EchoTool, FailingClient, ScriptedClient};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use parley_core::error::StoreError;
    use parley_core::message::Role;
    use parley_core::search::{NewDocument, ScoredDocument};
    use parley_core::sql::SqlDatabase;
    use parley_store::InMemoryTurnStore;

    fn assistant(client: Arc<dyn CompletionClient>) -> Assistant {
        let tools = Arc::new(ToolRegistry::new().with(Box::new(EchoTool)));
        let sessions = SessionManager::new(Arc::new(InMemoryTurnStore::new()));
        Assistant::new(client, tools, sessions, AssistantSettings::default())
            .with_prompts(PromptBuilder::new(NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()))
    }

    struct FixedStore;

    #[async_trait]
    impl VectorStore for FixedStore {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn add_documents(&self, documents: Vec<NewDocument>) -> Result<usize, StoreError> {
            Ok(documents.len())
        }

        async fn similarity_search(
            &self,
            _query: &str,
            k: usize,
        ) -> Result<Vec<ScoredDocument>, StoreError> {
            let doc = ScoredDocument {
                content: "Alice has five years of Rust experience.".into(),
                metadata: serde_json::Map::new(),
                score: 0.92,
            };
            Ok(vec![doc; k.min(1)])
        }
    }

    struct OneTableDb;

    #[async_trait]
    impl SqlDatabase for OneTableDb {
        fn dialect(&self) -> &str {
            "sqlite"
        }

        async fn table_info(&self) -> Result<String, StoreError> {
            Ok("CREATE TABLE people (name TEXT, years INTEGER)".into())
        }

        async fn run(&self, _sql: &str) -> Result<String, StoreError> {
            Ok("[(3,)]".into())
        }
    }

    #[tokio::test]
    async fn basic_mode_extracts_markdown_and_records() {
        let client = Arc::new(ScriptedClient::new(["<markdown>\n**Hello!**\n</markdown>"]));
        let assistant = assistant(client.clone());
        let request = RunRequest::new("s1", "hi", ChatMode::Basic);

        let result = assistant.run(&request).await.unwrap();
        assert_eq!(result, LoopResult::FinalAnswer("**Hello!**".into()));

        let turns = assistant.sessions().history(&"s1".into()).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].text, "hi");
        assert_eq!(turns[1].text, "**Hello!**");
    }

    #[tokio::test]
    async fn basic_mode_sees_prior_history() {
        let client = Arc::new(ScriptedClient::new(["first", "second"]));
        let assistant = assistant(client.clone());

        assistant
            .run(&RunRequest::new("s1", "my name is Ada", ChatMode::Basic))
            .await
            .unwrap();
        assistant
            .run(&RunRequest::new("s1", "what is my name?", ChatMode::Basic))
            .await
            .unwrap();

        let second = &client.requests()[1].prompt;
        assert!(second.contains("User: my name is Ada\nAssistant: first"));
    }

    #[tokio::test]
    async fn clean_history_drops_prior_turns() {
        let client = Arc::new(ScriptedClient::new(["one", "two"]));
        let assistant = assistant(client.clone());

        assistant
            .run(&RunRequest::new("s1", "old", ChatMode::Basic))
            .await
            .unwrap();
        assistant
            .run(&RunRequest::new("s1", "new", ChatMode::Basic).with_clean_history(true))
            .await
            .unwrap();

        assert!(!client.requests()[1].prompt.contains("old"));
        let turns = assistant.sessions().history(&"s1".into()).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].text, "new");
    }

    #[tokio::test]
    async fn agentic_mode_runs_the_loop() {
        let client = Arc::new(ScriptedClient::new([
            "<tool>Echo</tool><tool_input>hi</tool_input>",
            "<final_answer>done</final_answer>",
        ]));
        let assistant = assistant(client.clone());

        let response = assistant
            .respond(&RunRequest::new("s1", "echo hi", ChatMode::Agentic))
            .await;
        assert_eq!(response.text, "done");
        assert_eq!(response.outcome, "final_answer");
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn agentic_request_budgets_override_settings() {
        let client = Arc::new(ScriptedClient::repeating("not the format"));
        let assistant = assistant(client.clone());
        let request = RunRequest::new("s1", "hi", ChatMode::Agentic).with_max_parse_retries(Some(2));

        let result = assistant.run(&request).await.unwrap();
        assert_eq!(result, LoopResult::ParseFailureExceeded);
        assert_eq!(client.call_count(), 2);

        let turns = assistant.sessions().history(&"s1".into()).await.unwrap();
        assert_eq!(turns[1].text, crate::loop_runner::PARSE_FAILURE_NOTICE);
    }

    #[tokio::test]
    async fn rag_without_store_is_not_configured() {
        let assistant = assistant(Arc::new(ScriptedClient::new(Vec::<String>::new())));
        let err = assistant
            .run(&RunRequest::new("s1", "who knows Rust?", ChatMode::Rag))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));
    }

    #[tokio::test]
    async fn rag_mode_grounds_prompt_in_documents() {
        let client = Arc::new(ScriptedClient::new(["Alice does."]));
        let assistant = assistant(client.clone()).with_documents(Arc::new(FixedStore));

        let result = assistant
            .run(&RunRequest::new("s1", "who knows Rust?", ChatMode::Rag))
            .await
            .unwrap();
        assert_eq!(result, LoopResult::FinalAnswer("Alice does.".into()));
        assert!(client.requests()[0].prompt.contains("five years of Rust"));
    }

    #[tokio::test]
    async fn analytics_mode_answers_from_sql_result() {
        let client = Arc::new(ScriptedClient::new([
            "SELECT COUNT(*) FROM people LIMIT 5",
            "There are 3 people.",
        ]));
        let analytics = AnalyticsQaTool::new(client.clone(), Arc::new(OneTableDb), "mock-model", 5);
        let assistant = assistant(client.clone()).with_analytics(analytics);

        let result = assistant
            .run(&RunRequest::new("s1", "how many people?", ChatMode::Analytics))
            .await
            .unwrap();
        assert_eq!(result, LoopResult::FinalAnswer("There are 3 people.".into()));
        assert!(client.requests()[1].prompt.contains("[(3,)]"));
    }

    #[tokio::test]
    async fn document_mode_without_content_skips_model() {
        let client = Arc::new(ScriptedClient::new(Vec::<String>::new()));
        let assistant = assistant(client.clone());

        let result = assistant
            .run(&RunRequest::new("s1", "summarize", ChatMode::Document).with_document("   "))
            .await
            .unwrap();
        assert_eq!(result, LoopResult::FinalAnswer(DOCUMENT_REQUIRED.into()));
        assert_eq!(client.call_count(), 0);
        assert_eq!(assistant.sessions().history(&"s1".into()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn document_mode_puts_content_in_prompt() {
        let client = Arc::new(ScriptedClient::new(["It is about ferris."]));
        let assistant = assistant(client.clone());

        assistant
            .run(
                &RunRequest::new("s1", "what is it about?", ChatMode::Document)
                    .with_document("Ferris is the Rust mascot."),
            )
            .await
            .unwrap();
        let request = &client.requests()[0];
        assert!(request.prompt.contains("<content>\nFerris is the Rust mascot.\n</content>"));
        assert!(request.system.contains("<rules>"));
    }

    #[tokio::test]
    async fn failure_yields_fixed_message_and_records_nothing() {
        let assistant = assistant(Arc::new(FailingClient));
        let bus = assistant.event_bus().clone();
        let mut rx = bus.subscribe();

        let response = assistant
            .respond(&RunRequest::new("s1", "hi", ChatMode::Basic))
            .await;
        assert_eq!(response.text, USER_FACING_FAILURE);
        assert_eq!(response.outcome, "failed");
        assert!(!response.text.contains("connection refused"));
        assert!(assistant.sessions().history(&"s1".into()).await.unwrap().is_empty());

        let mut finished = None;
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::RunFinished { outcome, .. } = event.as_ref() {
                finished = Some(outcome.clone());
            }
        }
        assert_eq!(finished.as_deref(), Some("failed"));
    }
}

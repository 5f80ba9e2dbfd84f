//! Web search tool backed by the DuckDuckGo Instant Answer API.
//!
//! The API needs no key. Its answer is condensed into a short plain-text
//! digest: the abstract, a direct answer if any, then related topics.

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::search::WebSearch;
use parley_core::tool::Tool;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Topics included in a digest.
const MAX_TOPICS: usize = 5;

/// Queries the DuckDuckGo Instant Answer endpoint.
pub struct DuckDuckGoSearch {
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl DuckDuckGoSearch {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            endpoint: endpoint.into(),
            timeout,
            client,
        }
    }

    fn failure(reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: "WebSearch".into(),
            reason: reason.into(),
        }
    }
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::new("https://api.duckduckgo.com/", Duration::from_secs(15))
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<String, ToolError> {
        debug!(query = %query, "DuckDuckGo search");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout {
                        tool_name: "WebSearch".into(),
                        timeout_secs: self.timeout.as_secs(),
                    }
                } else {
                    Self::failure(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::failure(format!("HTTP {}", response.status())));
        }

        let body: InstantAnswer = response
            .json()
            .await
            .map_err(|e| Self::failure(format!("Invalid response: {e}")))?;

        digest(&body).ok_or_else(|| Self::failure(format!("No results for '{query}'")))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    // Usually a string, occasionally an object for widget answers.
    #[serde(default)]
    answer: serde_json::Value,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

/// Related topics are either a single result or a named group of results.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Result {
        #[serde(rename = "Text")]
        text: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

fn collect_topics<'a>(topics: &'a [RelatedTopic], out: &mut Vec<&'a str>) {
    for topic in topics {
        if out.len() >= MAX_TOPICS {
            return;
        }
        match topic {
            RelatedTopic::Result { text } if !text.trim().is_empty() => out.push(text.trim()),
            RelatedTopic::Result { .. } => {}
            RelatedTopic::Group { topics } => collect_topics(topics, out),
        }
    }
}

/// Condense an instant answer. `None` when it carries nothing useful.
fn digest(answer: &InstantAnswer) -> Option<String> {
    let mut parts = Vec::new();

    if let Some(direct) = answer.answer.as_str().map(str::trim).filter(|a| !a.is_empty()) {
        parts.push(direct.to_string());
    }
    if !answer.abstract_text.trim().is_empty() {
        let mut line = String::new();
        if !answer.heading.is_empty() {
            line.push_str(&answer.heading);
            line.push_str(": ");
        }
        line.push_str(answer.abstract_text.trim());
        if !answer.abstract_url.is_empty() {
            line.push_str(&format!(" ({})", answer.abstract_url));
        }
        parts.push(line);
    }

    let mut topics = Vec::new();
    collect_topics(&answer.related_topics, &mut topics);
    parts.extend(topics.into_iter().map(|t| format!("- {t}")));

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

/// The `WebSearch` agent tool.
pub struct WebSearchTool {
    search: Arc<dyn WebSearch>,
}

impl WebSearchTool {
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "WebSearch"
    }

    fn description(&self) -> &str {
        "Use this tool to search for information on current events, news, or general knowledge topics. \
         For example, recent news events, famous people, or common facts. The input is a search query."
    }

    fn fallback_error(&self) -> &str {
        "Sorry, I couldn't find any relevant information on that topic. Please try asking a different question."
    }

    async fn invoke(&self, input: &str) -> Result<String, ToolError> {
        let query = input.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput("Empty search query".into()));
        }
        self.search.search(query).await
    }
}

//! OpenAI-compatible completion client.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, and any
//! endpoint exposing `/chat/completions` and `/embeddings`.

use async_trait::async_trait;
use parley_core::error::CompletionError;
use parley_core::provider::{CompletionClient, CompletionRequest, CompletionResponse, Usage};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// An OpenAI-compatible completion backend.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a new client with the default 120s request timeout.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self::with_timeout(name, base_url, api_key, Duration::from_secs(120))
    }

    pub fn with_timeout(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenAI client (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an OpenRouter client (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an Ollama client (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the JSON body for `/chat/completions`.
    fn chat_body(request: &CompletionRequest) -> serde_json::Value {
        let mut messages = Vec::with_capacity(2);
        if !request.system.is_empty() {
            messages.push(ApiMessage {
                role: "system".into(),
                content: Some(request.system.clone()),
            });
        }
        messages.push(ApiMessage {
            role: "user".into(),
            content: Some(request.prompt.clone()),
        });

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }

        body
    }

    /// Map a non-success HTTP status to a completion error.
    fn status_error(status: u16, body: String) -> CompletionError {
        match status {
            429 => CompletionError::RateLimited {
                retry_after_secs: 5,
            },
            401 | 403 => CompletionError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ),
            _ => CompletionError::ApiError {
                status_code: status,
                message: body,
            },
        }
    }

    fn transport_error(e: reqwest::Error) -> CompletionError {
        if e.is_timeout() {
            CompletionError::Timeout(e.to_string())
        } else {
            CompletionError::Network(e.to_string())
        }
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, CompletionError> {
        let url = format!("{}{path}", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status, body = %error_body, "Backend returned error");
            return Err(Self::status_error(status, error_body));
        }

        Ok(response)
    }
}

/// Convert a parsed chat response into our response type.
fn into_completion(api_response: ApiResponse) -> Result<CompletionResponse, CompletionError> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionError::ApiError {
            status_code: 200,
            message: "No choices in response".into(),
        })?;

    let usage = api_response.usage.map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    Ok(CompletionResponse {
        text: choice.message.content.unwrap_or_default(),
        model: api_response.model,
        usage,
    })
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError> {
        let body = Self::chat_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            stop = request.stop.len(),
            "Sending completion request"
        );

        let response = self.post_json("/chat/completions", &body).await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| CompletionError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        into_completion(api_response)
    }

    async fn embed(
        &self,
        model: &str,
        inputs: Vec<String>,
    ) -> std::result::Result<Vec<Vec<f32>>, CompletionError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": model,
            "input": inputs,
            "encoding_format": "float",
        });

        debug!(
            provider = %self.name,
            model = %model,
            count = inputs.len(),
            "Sending embedding request"
        );

        let response = self.post_json("/embeddings", &body).await?;

        let api_resp: EmbeddingApiResponse =
            response.json().await.map_err(|e| CompletionError::ApiError {
                status_code: 200,
                message: format!("Failed to parse embedding response: {e}"),
            })?;

        let mut data = api_resp.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

// --- OpenAI API types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// --- Embedding API types ---

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openrouter_constructor() {
        let client = OpenAiCompatClient::openrouter("sk-test");
        assert_eq!(client.name(), "openrouter");
        assert!(client.base_url.contains("openrouter.ai"));
    }

    #[test]
    fn ollama_constructor() {
        let client = OpenAiCompatClient::ollama(None);
        assert_eq!(client.name(), "ollama");
        assert!(client.base_url.contains("localhost:11434"));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let client = OpenAiCompatClient::new("custom", "http://host:8000/v1/", "k");
        assert_eq!(client.base_url(), "http://host:8000/v1");
    }

    #[test]
    fn chat_body_carries_system_prompt_and_stop() {
        let request = CompletionRequest::new("gpt-4o-mini", "You are helpful", "Hello")
            .with_stop(vec!["</tool_input>".into(), "</final_answer>".into()])
            .with_max_tokens(Some(256));
        let body = OpenAiCompatClient::chat_body(&request);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Hello");
        assert_eq!(body["stop"][1], "</final_answer>");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn chat_body_omits_empty_system_and_stop() {
        let request = CompletionRequest::new("m", "", "Hi");
        let body = OpenAiCompatClient::chat_body(&request);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert!(body.get("stop").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            OpenAiCompatClient::status_error(429, String::new()),
            CompletionError::RateLimited { .. }
        ));
        assert!(matches!(
            OpenAiCompatClient::status_error(401, String::new()),
            CompletionError::AuthenticationFailed(_)
        ));
        match OpenAiCompatClient::status_error(500, "boom".into()) {
            CompletionError::ApiError {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_chat_response() {
        let raw = r#"{
            "model": "gpt-4o-mini-2024",
            "choices": [{"message": {"role": "assistant", "content": "<final_answer>Hi</final_answer>"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        let response = into_completion(parsed).unwrap();
        assert_eq!(response.text, "<final_answer>Hi</final_answer>");
        assert_eq!(response.model, "gpt-4o-mini-2024");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn empty_choices_is_an_error() {
        let parsed: ApiResponse =
            serde_json::from_str(r#"{"model": "m", "choices": []}"#).unwrap();
        assert!(into_completion(parsed).is_err());
    }

    #[test]
    fn parse_embedding_response() {
        let raw = r#"{"data": [{"index": 1, "embedding": [0.5]}, {"index": 0, "embedding": [0.1, 0.2]}]}"#;
        let parsed: EmbeddingApiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(parsed.data[1].embedding.len(), 2);
    }

    #[tokio::test]
    async fn embed_with_no_inputs_skips_request() {
        let client = OpenAiCompatClient::new("custom", "http://127.0.0.1:9", "k");
        let vectors = client.embed("text-embedding-3-small", Vec::new()).await.unwrap();
        assert!(vectors.is_empty());
    }
}

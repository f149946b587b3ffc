// OpenRouter client (HTTP direct, no SDK). OpenRouter speaks the OpenAI
// chat-completions dialect, so one client covers every routed model.

use crate::streaming::parse_chat_sse_stream;
use crate::traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse, EventStream, TokenUsage};
use crate::types::Message;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

pub struct OpenRouterClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenRouterClient {
    /// Create new client with API key
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("Invalid API key format")?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: OPENROUTER_API_BASE.to_string(),
        })
    }

    /// Point the client at a different OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build chat completion request payload
    fn build_chat_request(
        &self,
        model: &str,
        messages: &[Message],
        options: &ChatOptions,
        stream: bool,
    ) -> Result<Value> {
        let mut request = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": stream,
        });

        let obj = request.as_object_mut().unwrap();

        if let Some(temp) = options.temperature {
            obj.insert("temperature".to_string(), serde_json::json!(temp));
        }
        if let Some(max_tokens) = options.max_tokens {
            obj.insert("max_tokens".to_string(), serde_json::json!(max_tokens));
        }
        if options.reasoning {
            obj.insert("include_reasoning".to_string(), serde_json::json!(true));
        }

        Ok(request)
    }

    async fn post_completions(&self, payload: &Value) -> Result<reqwest::Response> {
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .json(payload)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenRouter API error ({}): {}", status, error_text);
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatClient for OpenRouterClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let payload =
            self.build_chat_request(&request.model, &request.messages, &request.options, false)?;

        let response = self.post_completions(&payload).await?;

        let raw: RawChatResponse = response
            .json()
            .await
            .context("Failed to parse response")?;

        let choice = raw.choices.first();
        Ok(ChatResponse {
            content: choice.and_then(|c| c.message.content.clone()),
            usage: raw.usage.map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.and_then(|c| c.finish_reason.clone()),
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream> {
        let payload =
            self.build_chat_request(&request.model, &request.messages, &request.options, true)?;

        let response = self.post_completions(&payload).await?;

        Ok(parse_chat_sse_stream(response))
    }
}

// ============================================================================
// WIRE TYPES (Chat Completions)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawChatResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Choice {
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResponseMessage {
    pub role: String,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_includes_reasoning_flag() {
        let client = OpenRouterClient::new("test-key").unwrap();
        let options = ChatOptions::new().reasoning(true);
        let payload = client
            .build_chat_request("openai/o1-mini", &[Message::human("hi")], &options, true)
            .unwrap();

        assert_eq!(payload["include_reasoning"], serde_json::json!(true));
        assert_eq!(payload["stream"], serde_json::json!(true));
        assert_eq!(payload["messages"][0]["role"], "user");
    }

    #[test]
    fn test_payload_omits_unset_options() {
        let client = OpenRouterClient::new("test-key").unwrap();
        let payload = client
            .build_chat_request(
                "openai/gpt-4o-mini",
                &[Message::human("hi")],
                &ChatOptions::default(),
                false,
            )
            .unwrap();

        assert!(payload.get("temperature").is_none());
        assert!(payload.get("max_tokens").is_none());
        assert!(payload.get("include_reasoning").is_none());
    }
}

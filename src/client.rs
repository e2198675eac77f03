//! The generative text service behind research requests.

use crate::error::{Error, Result};
use crate::types::TokenUsage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
pub const API_VERSION: &str = "2023-06-01";

/// Text returned by one service call
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Submits a prompt and returns the model's free-form text.
///
/// Every `Err` is treated as a transport failure by the caller and is not
/// retried.
#[async_trait]
pub trait ResearchClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Completion>;

    /// Model identifier recorded in processing metadata
    fn model(&self) -> &str;
}

/// Messages API client, optionally with the server-side web search tool
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    web_search: bool,
    endpoint: String,
}

impl AnthropicClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        web_search: bool,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("legislator-research/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            web_search,
            endpoint: MESSAGES_URL.to_string(),
        })
    }

    /// Point the client at a different Messages endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Tool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    name: &'static str,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

/// Concatenate the text blocks of a response; tool-use blocks are skipped
fn response_text(blocks: &[ContentBlock]) -> String {
    let text: String = blocks
        .iter()
        .filter(|block| block.block_type == "text")
        .filter_map(|block| block.text.as_deref())
        .collect();

    if text.is_empty() {
        "No text response received".to_string()
    } else {
        text
    }
}

#[async_trait]
impl ResearchClient for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<Completion> {
        let tools = if self.web_search {
            vec![Tool {
                tool_type: "web_search_20250305",
                name: "web_search",
            }]
        } else {
            Vec::new()
        };

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            tools,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("HTTP {}: {}", status, body.trim())));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("malformed response: {}", e)))?;

        Ok(Completion {
            text: response_text(&body.content),
            usage: body.usage.map(|u| TokenUsage::Counted {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_blocks_are_joined_and_tool_blocks_skipped() {
        let body: MessagesResponse = serde_json::from_str(
            r#"{
                "content": [
                    {"type": "text", "text": "Let me search. "},
                    {"type": "server_tool_use", "id": "x", "name": "web_search"},
                    {"type": "text", "text": "{\"issues\": []}"}
                ],
                "usage": {"input_tokens": 12, "output_tokens": 34}
            }"#,
        )
        .unwrap();

        assert_eq!(response_text(&body.content), "Let me search. {\"issues\": []}");
        assert_eq!(body.usage.map(|u| (u.input_tokens, u.output_tokens)), Some((12, 34)));
    }

    #[test]
    fn empty_content_yields_placeholder_text() {
        assert_eq!(response_text(&[]), "No text response received");
    }

    #[test]
    fn web_search_tool_is_serialized_only_when_enabled() {
        let request = MessagesRequest {
            model: "m",
            max_tokens: 10,
            messages: vec![Message {
                role: "user",
                content: "hi",
            }],
            tools: Vec::new(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
    }
}

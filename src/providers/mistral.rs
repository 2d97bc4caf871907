use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;

use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs,
};

use crate::config::AiConfig;
use crate::error::{Result, TodoAnalyticsError};
use crate::interfaces::providers::CompletionProvider;

/// The slice of a chat-completion response the summary is read from. Ids,
/// usage and finish reasons are ignored, so Mistral-specific values such as
/// `model_length` still parse.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completion client for Mistral's OpenAI-compatible API.
///
/// The HTTP client carries the configured timeout; requests are never retried.
#[derive(Clone)]
pub struct MistralProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl MistralProvider {
    pub fn new(config: &AiConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TodoAnalyticsError::Config(e.to_string()))?;
        let base_url = config.base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(TodoAnalyticsError::Config("missing AI base_url".to_string()));
        }
        Ok(Self {
            client,
            endpoint: format!("{base_url}/chat/completions"),
            api_key,
            model: config.model.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_user_text_message(prompt: &str) -> Result<ChatCompletionRequestMessage> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Text(
                prompt.to_string(),
            ))
            .build()
            .map_err(|e| TodoAnalyticsError::Upstream(e.to_string()))?;
        Ok(ChatCompletionRequestMessage::User(message))
    }

    fn build_request(&self, prompt: &str) -> Result<CreateChatCompletionRequest> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(self.model.clone());
        builder.messages(vec![Self::build_user_text_message(prompt)?]);
        builder
            .build()
            .map_err(|e| TodoAnalyticsError::Upstream(e.to_string()))
    }

    fn extract_text_from_response(response: ChatResponse) -> Result<String> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TodoAnalyticsError::Upstream("No choices returned".to_string()))?;
        Ok(choice.message.content.unwrap_or_default())
    }
}

#[async_trait]
impl CompletionProvider for MistralProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = self.build_request(prompt)?;
        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "sending completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| TodoAnalyticsError::Upstream(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TodoAnalyticsError::Upstream(e.to_string()))?;
        if !status.is_success() {
            return Err(TodoAnalyticsError::Upstream(format!(
                "HTTP {status}: {text}"
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| TodoAnalyticsError::Upstream(e.to_string()))?;
        Self::extract_text_from_response(parsed)
    }
}

use anyhow::{Context, Result, anyhow};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{ChatCompletionRequestMessage, CreateChatCompletionRequestArgs, ResponseFormat},
};
use async_trait::async_trait;
use tracing::debug;

/// The shape of answer requested from the LLM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFormat {
    /// Free text, suitable for speaking aloud.
    Text,
    /// A single JSON object.
    Json,
}

/// A generic client for interacting with an LLM.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Makes a single, non-streaming chat completion call and returns the text
    /// of the first choice.
    async fn complete(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        format: ReplyFormat,
    ) -> Result<String>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The specific model identifier to use for chat completions (e.g., "gpt-4o").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn complete(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        format: ReplyFormat,
    ) -> Result<String> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(messages);
        if format == ReplyFormat::Json {
            args.response_format(ResponseFormat::JsonObject);
        }
        let request = args.build()?;

        let response = self.client.chat().create(request).await?;
        debug!(model = %self.model, usage = ?response.usage, "LLM call completed");

        let choice = response
            .choices
            .first()
            .context("No response choice from LLM")?;
        choice
            .message
            .content
            .clone()
            .ok_or_else(|| anyhow!("LLM response had no text content."))
    }
}

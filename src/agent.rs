//! Reply generation via chat completions

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::{ChatConfig, OpenAiConfig};
use crate::conversation::{Conversation, Message};
use crate::{Error, Result};

/// Reply spoken when the chat model fails
pub const APOLOGY: &str = "I apologize, but I encountered an error. Please try again.";

/// Generates the next assistant message from a history
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete the conversation, returning the reply text (empty if none)
    ///
    /// # Errors
    ///
    /// Returns error if the provider call fails
    async fn complete(&self, messages: &[Message]) -> Result<String>;
}

/// Chat completions against the `OpenAI` API
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    config: ChatConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl ChatResponse {
    fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
    }
}

impl OpenAiChat {
    /// Create a new chat client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(openai: &OpenAiConfig, config: ChatConfig) -> Result<Self> {
        if openai.api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for chat".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: openai.api_key.clone(),
            base_url: openai.base_url.trim_end_matches('/').to_string(),
            config,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Agent(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Agent(format!("chat completion error {status}: {body}")));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Agent(format!("invalid chat response: {e}")))?;
        Ok(body.into_text())
    }
}

/// Keeps the conversation history and asks the model for replies
pub struct Agent {
    model: Arc<dyn ChatModel>,
    conversation: Conversation,
}

impl Agent {
    /// Create an agent with a fresh history seeded by `system_prompt`
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>, system_prompt: &str) -> Self {
        Self {
            model,
            conversation: Conversation::new(system_prompt),
        }
    }

    /// Record the customer's input and return the assistant's reply
    ///
    /// Model failures are logged and answered with [`APOLOGY`]; the failed turn
    /// leaves the user message in the history without an assistant message.
    pub async fn reply(&mut self, user_input: &str) -> String {
        self.conversation.push_user(user_input);

        match self.model.complete(self.conversation.messages()).await {
            Ok(reply) => {
                tracing::debug!(reply_len = reply.len(), "assistant replied");
                self.conversation.push_assistant(reply.clone());
                reply
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to get assistant response");
                APOLOGY.to_string()
            }
        }
    }

    /// The conversation so far
    #[must_use]
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("messages", &self.conversation.len())
            .finish_non_exhaustive()
    }
}

use std::future::Future;

use serde::{Deserialize, Serialize};

use super::error::RerankResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message of a chat-style completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatTurn>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the provider to constrain output to a JSON object.
    pub json_mode: bool,
}

/// Chat completion returning the first text choice.
pub trait CompletionProvider: Send + Sync {
    fn model_id(&self) -> &str;

    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = RerankResult<String>> + Send;
}

use std::time::Duration;

use genai::Client;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatResponseFormat};
use tracing::{debug, error, instrument};

use super::error::{RerankError, RerankResult};
use super::provider::{ChatRole, CompletionProvider, CompletionRequest};

/// Completion provider backed by the `genai` multi-provider client.
#[derive(Clone)]
pub struct GenaiCompleter {
    client: Client,
    model: String,
    timeout: Duration,
}

impl std::fmt::Debug for GenaiCompleter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenaiCompleter")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GenaiCompleter {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::default(),
            model: model.into(),
            timeout,
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

fn to_chat_request(request: &CompletionRequest) -> ChatRequest {
    let messages: Vec<ChatMessage> = request
        .messages
        .iter()
        .map(|turn| match turn.role {
            ChatRole::System => ChatMessage::system(turn.content.clone()),
            ChatRole::User => ChatMessage::user(turn.content.clone()),
            ChatRole::Assistant => ChatMessage::assistant(turn.content.clone()),
        })
        .collect();
    ChatRequest::new(messages)
}

fn to_chat_options(request: &CompletionRequest) -> ChatOptions {
    let options = ChatOptions::default()
        .with_temperature(f64::from(request.temperature))
        .with_max_tokens(request.max_tokens);
    if request.json_mode {
        options.with_response_format(ChatResponseFormat::JsonMode)
    } else {
        options
    }
}

impl CompletionProvider for GenaiCompleter {
    fn model_id(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: &CompletionRequest) -> RerankResult<String> {
        let chat_request = to_chat_request(request);
        let options = to_chat_options(request);

        let call = self
            .client
            .exec_chat(&self.model, chat_request, Some(&options));
        let response = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!(error = %e, "completion provider error");
                return Err(RerankError::Completion {
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(RerankError::Timeout {
                    timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
        };

        let text = response.first_text().unwrap_or_default().to_string();
        debug!(chars = text.len(), "completion received");
        Ok(text)
    }
}

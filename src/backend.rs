//! Conversation backends: the AI side of the transcript chat.
//!
//! A backend owns one conversation's history and turns each user message
//! into a stream of reply chunks.

use crate::config::Prompts;
use crate::error::{Result, VidchatError};
use crate::provider::{
    create_client_with_timeout, select_model, EnvironmentKeys, ModelConfiguration,
};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionResponseStream, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Incremental reply text, finished when the stream ends.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Maximum number of history turns sent along with the system prompt.
const MAX_HISTORY_TURNS: usize = 40;

/// The AI chat collaborator.
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    /// System prompt the backend sends with every turn.
    fn system_prompt(&self) -> String;

    /// Start a new turn. The returned stream yields the reply in pieces.
    async fn send_message(&self, message: &str) -> Result<TextStream>;
}

/// Builds a backend once a transcript is available.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn create(&self, transcript: &str) -> Result<Arc<dyn ConversationBackend>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
struct Turn {
    role: TurnRole,
    content: String,
}

/// Backend that streams from an OpenAI-compatible chat completions endpoint.
pub struct ProviderBackend {
    client: Client<OpenAIConfig>,
    config: ModelConfiguration,
    system_prompt: String,
    history: Arc<Mutex<Vec<Turn>>>,
}

impl ProviderBackend {
    /// Create a backend for a transcript.
    pub fn new(
        transcript: &str,
        config: ModelConfiguration,
        prompts: &Prompts,
        timeout: Duration,
    ) -> Result<Self> {
        let client = create_client_with_timeout(&config, timeout)?;
        info!(
            "Chat backend using {} ({})",
            config.provider.display_name(),
            config.model_id
        );

        Ok(Self {
            client,
            system_prompt: prompts.chat_system(transcript),
            config,
            history: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn build_messages(&self, turns: &[Turn]) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.system_prompt.clone())
                .build()
                .map_err(|e| VidchatError::Provider(e.to_string()))?
                .into(),
        ];

        let start = turns.len().saturating_sub(MAX_HISTORY_TURNS);
        for turn in &turns[start..] {
            let message: ChatCompletionRequestMessage = match turn.role {
                TurnRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content.clone())
                    .build()
                    .map_err(|e| VidchatError::Provider(e.to_string()))?
                    .into(),
                TurnRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content.clone())
                    .build()
                    .map_err(|e| VidchatError::Provider(e.to_string()))?
                    .into(),
            };
            messages.push(message);
        }

        Ok(messages)
    }
}

/// Store a completed user/assistant pair, keeping at most
/// `MAX_HISTORY_TURNS` turns.
fn record_exchange(history: &mut Vec<Turn>, message: String, reply: String) {
    history.push(Turn {
        role: TurnRole::User,
        content: message,
    });
    history.push(Turn {
        role: TurnRole::Assistant,
        content: reply,
    });
    if history.len() > MAX_HISTORY_TURNS {
        let excess = history.len() - MAX_HISTORY_TURNS;
        history.drain(..excess);
    }
}

/// State carried across chunks of one streamed reply.
struct ReplyState {
    inner: ChatCompletionResponseStream,
    message: String,
    reply: String,
    history: Arc<Mutex<Vec<Turn>>>,
}

#[async_trait]
impl ConversationBackend for ProviderBackend {
    fn system_prompt(&self) -> String {
        self.system_prompt.clone()
    }

    #[instrument(skip(self, message), fields(provider = %self.config.provider, len = message.len()))]
    async fn send_message(&self, message: &str) -> Result<TextStream> {
        // The user turn is only stored once the reply completes, so a failed
        // request leaves no unanswered turn behind.
        let mut turns = self
            .history
            .lock()
            .map_err(|_| VidchatError::Provider("Conversation history poisoned".to_string()))?
            .clone();
        turns.push(Turn {
            role: TurnRole::User,
            content: message.to_string(),
        });

        debug!("Sending turn with {} history entries", turns.len());

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model_id)
            .messages(self.build_messages(&turns)?)
            .stream(true)
            .build()
            .map_err(|e| VidchatError::Provider(e.to_string()))?;

        let inner = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| VidchatError::Provider(format!("Chat API error: {}", e)))?;

        let state = ReplyState {
            inner,
            message: message.to_string(),
            reply: String::new(),
            history: Arc::clone(&self.history),
        };

        let chunks = stream::unfold(Some(state), |state| async move {
            let mut state = state?;
            loop {
                match state.inner.next().await {
                    Some(Ok(response)) => {
                        let text: String = response
                            .choices
                            .iter()
                            .filter_map(|choice| choice.delta.content.as_deref())
                            .collect();
                        if text.is_empty() {
                            continue;
                        }
                        state.reply.push_str(&text);
                        return Some((Ok(text), Some(state)));
                    }
                    Some(Err(e)) => {
                        warn!("Stream interrupted: {}", e);
                        let error = VidchatError::Provider(format!("Stream error: {}", e));
                        return Some((Err(error), None));
                    }
                    None => {
                        if let Ok(mut history) = state.history.lock() {
                            record_exchange(
                                &mut history,
                                std::mem::take(&mut state.message),
                                std::mem::take(&mut state.reply),
                            );
                        }
                        return None;
                    }
                }
            }
        });

        Ok(Box::pin(chunks))
    }
}

/// Default factory: pick a provider from the environment and build a
/// [`ProviderBackend`].
pub struct ProviderBackendFactory {
    model: Option<ModelConfiguration>,
    prompts: Prompts,
    timeout: Duration,
}

impl ProviderBackendFactory {
    pub fn new(prompts: Prompts, timeout: Duration) -> Self {
        Self {
            model: None,
            prompts,
            timeout,
        }
    }

    /// Use an already selected model configuration instead of detecting one.
    pub fn with_model(mut self, model: ModelConfiguration) -> Self {
        self.model = Some(model);
        self
    }
}

#[async_trait]
impl BackendFactory for ProviderBackendFactory {
    async fn create(&self, transcript: &str) -> Result<Arc<dyn ConversationBackend>> {
        let config = match &self.model {
            Some(model) => model.clone(),
            None => select_model(&EnvironmentKeys::from_env(), None, None)?,
        };

        let backend = ProviderBackend::new(transcript, config, &self.prompts, self.timeout)?;
        Ok(Arc::new(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;

    fn test_config() -> ModelConfiguration {
        ModelConfiguration {
            provider: Provider::OpenAI,
            model_id: "gpt-4o-mini".to_string(),
            api_key: "sk-test".to_string(),
            api_base: Provider::OpenAI.api_base().to_string(),
        }
    }

    #[test]
    fn test_system_prompt_embeds_transcript() {
        let backend = ProviderBackend::new(
            "the quick brown fox",
            test_config(),
            &Prompts::default(),
            Duration::from_secs(5),
        )
        .unwrap();

        let prompt = backend.system_prompt();
        assert!(prompt.contains("<transcript>the quick brown fox</transcript>"));
        assert!(prompt.contains("markdown"));
    }

    #[test]
    fn test_history_is_trimmed() {
        let backend = ProviderBackend::new(
            "T",
            test_config(),
            &Prompts::default(),
            Duration::from_secs(5),
        )
        .unwrap();

        let turns: Vec<Turn> = (0..50)
            .map(|i| Turn {
                role: if i % 2 == 0 { TurnRole::User } else { TurnRole::Assistant },
                content: format!("turn {}", i),
            })
            .collect();

        let messages = backend.build_messages(&turns).unwrap();
        assert_eq!(messages.len(), MAX_HISTORY_TURNS + 1);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
    }

    #[test]
    fn test_record_exchange_keeps_pairs_bounded() {
        let mut history = Vec::new();
        for i in 0..30 {
            record_exchange(&mut history, format!("q{}", i), format!("a{}", i));
        }

        assert_eq!(history.len(), MAX_HISTORY_TURNS);
        assert_eq!(history[0].role, TurnRole::User);
        assert_eq!(history[0].content, "q10");
        assert_eq!(history.last().unwrap().content, "a29");
        assert!(history
            .chunks(2)
            .all(|pair| pair[0].role == TurnRole::User && pair[1].role == TurnRole::Assistant));
    }

    #[tokio::test]
    async fn test_failed_request_leaves_history_untouched() {
        let config = ModelConfiguration {
            api_base: "http://127.0.0.1:9/v1".to_string(),
            ..test_config()
        };
        let backend =
            ProviderBackend::new("T", config, &Prompts::default(), Duration::from_secs(2)).unwrap();

        if let Ok(mut stream) = backend.send_message("hello").await {
            let _ = tokio::time::timeout(Duration::from_secs(5), async {
                while let Some(item) = stream.next().await {
                    if item.is_err() {
                        break;
                    }
                }
            })
            .await;
        }

        assert!(backend.history.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_factory_uses_injected_model() {
        let factory = ProviderBackendFactory::new(Prompts::default(), Duration::from_secs(5))
            .with_model(test_config());
        let backend = factory.create("injected").await.unwrap();
        assert!(backend.system_prompt().contains("<transcript>injected</transcript>"));
    }
}

//! Chat persistence, caching, and in-character response generation.

mod transcript;

pub use transcript::{ChatRecord, ChatSummary, TranscriptStore, TurnRecord};

use crate::cache::{chat_history_key, user_chats_key, ResponseCache, USER_CHATS_PREFIX};
use crate::config::Prompts;
use crate::error::{ReplikkError, Result};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Default timeout for chat completion requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create an OpenAI client with a configured timeout.
///
/// Uses a 5-minute timeout to prevent hung API calls.
pub fn create_client() -> Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .expect("Failed to create HTTP client");

    Client::with_config(OpenAIConfig::default()).with_http_client(http_client)
}

/// Generates in-character responses for one chat session.
///
/// The engine holds the conversation history for its session; each turn
/// renders the persona prompt with the locked movie context and the new
/// message.
pub struct ChatEngine {
    client: Client<OpenAIConfig>,
    model: String,
    prompts: Prompts,
    history: Vec<ChatCompletionRequestMessage>,
    max_history_messages: usize,
}

impl ChatEngine {
    pub fn new(model: &str, history_turns: usize) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            prompts: Prompts::default(),
            history: Vec::new(),
            // One turn is a user message plus an assistant message.
            max_history_messages: history_turns * 2,
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Generate the in-character response for one turn.
    #[instrument(skip(self, dialogue_context, message), fields(movie = %movie_title))]
    pub async fn respond(
        &mut self,
        movie_title: &str,
        dialogue_context: &str,
        message: &str,
    ) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert("movie_title".to_string(), movie_title.to_string());
        vars.insert(
            "dialogue_context".to_string(),
            dialogue_context.to_string(),
        );
        vars.insert("message".to_string(), message.to_string());

        let user_content = self
            .prompts
            .render_with_custom(&self.prompts.persona.turn, &vars);

        let user_message = ChatCompletionRequestUserMessageArgs::default()
            .content(user_content)
            .build()
            .map_err(|e| ReplikkError::Generation(e.to_string()))?;
        self.history.push(user_message.into());

        let mut messages: Vec<ChatCompletionRequestMessage> =
            vec![ChatCompletionRequestSystemMessageArgs::default()
                .content(self.prompts.persona.system.clone())
                .build()
                .map_err(|e| ReplikkError::Generation(e.to_string()))?
                .into()];
        messages.extend(self.history.clone());

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.7)
            .build()
            .map_err(|e| ReplikkError::Generation(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| ReplikkError::OpenAI(format!("Failed to generate response: {}", e)))?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| ReplikkError::Generation("Empty response from model".to_string()))?
            .clone();

        let assistant_message = ChatCompletionRequestAssistantMessageArgs::default()
            .content(answer.clone())
            .build()
            .map_err(|e| ReplikkError::Generation(e.to_string()))?;
        self.history.push(assistant_message.into());
        self.trim_history();

        debug!("Generated {} characters", answer.len());
        Ok(answer)
    }

    fn trim_history(&mut self) {
        if self.history.len() > self.max_history_messages {
            self.history = self.history[self.history.len() - self.max_history_messages..].to_vec();
        }
    }

    /// Clear conversation history.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

/// Fronts the transcript store with the listing/history cache.
pub struct ChatService {
    transcripts: Arc<TranscriptStore>,
    cache: Arc<ResponseCache>,
    listing_ttl: Duration,
}

impl ChatService {
    pub fn new(
        transcripts: Arc<TranscriptStore>,
        cache: Arc<ResponseCache>,
        listing_ttl: Duration,
    ) -> Self {
        Self {
            transcripts,
            cache,
            listing_ttl,
        }
    }

    /// Create a new chat for a user and return its id.
    pub fn create_chat(&self, user_id: &str) -> Result<String> {
        self.transcripts.create_chat(user_id)
    }

    /// Append a completed turn to a chat.
    pub fn append_turn(&self, chat_id: &str, message: &str, response: &str) -> Result<bool> {
        self.transcripts.append_turn(chat_id, message, response)
    }

    /// A user's chats, newest first, cached.
    #[instrument(skip(self))]
    pub fn user_chats(&self, user_id: &str) -> Result<Vec<ChatSummary>> {
        let key = user_chats_key(user_id);
        if let Some(cached) = self.cache.get::<Vec<ChatSummary>>(&key) {
            return Ok(cached);
        }

        let chats = self.transcripts.user_chats(user_id)?;
        self.cache.put(&key, &chats, self.listing_ttl);
        Ok(chats)
    }

    /// One chat's full transcript, cached.
    #[instrument(skip(self))]
    pub fn chat_history(&self, chat_id: &str) -> Result<Option<ChatRecord>> {
        let key = chat_history_key(chat_id);
        if let Some(cached) = self.cache.get::<ChatRecord>(&key) {
            return Ok(Some(cached));
        }

        match self.transcripts.get_chat(chat_id)? {
            Some(chat) => {
                self.cache.put(&key, &chat, self.listing_ttl);
                Ok(Some(chat))
            }
            None => Ok(None),
        }
    }

    /// Delete a chat and drop every cache entry that could mention it: the
    /// transcript's own key and all user listings, whoever owns them.
    #[instrument(skip(self))]
    pub fn delete_chat(&self, chat_id: &str) -> Result<bool> {
        let deleted = self.transcripts.delete_chat(chat_id)?;

        self.cache.invalidate_prefix(USER_CHATS_PREFIX);
        self.cache.invalidate(&chat_history_key(chat_id));

        if deleted {
            info!("Deleted chat {} and invalidated listings", chat_id);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_history_trim() {
        let mut engine = ChatEngine::new("gpt-4o-mini", 2);

        for i in 0..5 {
            let user = ChatCompletionRequestUserMessageArgs::default()
                .content(format!("message {}", i))
                .build()
                .unwrap();
            engine.history.push(user.into());

            let assistant = ChatCompletionRequestAssistantMessageArgs::default()
                .content(format!("response {}", i))
                .build()
                .unwrap();
            engine.history.push(assistant.into());

            engine.trim_history();
        }

        // Two turns of history, four messages.
        assert_eq!(engine.history.len(), 4);
    }

    #[test]
    fn test_engine_clear_history() {
        let mut engine = ChatEngine::new("gpt-4o-mini", 10);
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content("hello")
            .build()
            .unwrap();
        engine.history.push(user.into());

        engine.clear_history();
        assert!(engine.history.is_empty());
    }

    fn service() -> (ChatService, Arc<TranscriptStore>, Arc<ResponseCache>) {
        let transcripts = Arc::new(TranscriptStore::in_memory().unwrap());
        let cache = Arc::new(ResponseCache::new());
        let service = ChatService::new(
            Arc::clone(&transcripts),
            Arc::clone(&cache),
            Duration::from_secs(300),
        );
        (service, transcripts, cache)
    }

    #[test]
    fn test_user_chats_served_from_cache() {
        let (service, transcripts, _cache) = service();

        let chat_id = service.create_chat("alice").unwrap();
        let first = service.user_chats("alice").unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].chat_id, chat_id);

        // A write that bypasses the service is invisible until the TTL
        // expires, the listing comes from the cache.
        transcripts.create_chat("alice").unwrap();
        let second = service.user_chats("alice").unwrap();
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_chat_history_missing_is_none() {
        let (service, _transcripts, _cache) = service();
        assert!(service.chat_history("nope").unwrap().is_none());
    }

    #[test]
    fn test_delete_chat_invalidates_all_user_listings() {
        let (service, _transcripts, cache) = service();

        let alice_chat = service.create_chat("alice").unwrap();
        service.create_chat("bob").unwrap();
        service.append_turn(&alice_chat, "hello", "hi").unwrap();

        // Warm every cache entry.
        service.user_chats("alice").unwrap();
        service.user_chats("bob").unwrap();
        service.chat_history(&alice_chat).unwrap();
        assert_eq!(cache.len(), 3);

        assert!(service.delete_chat(&alice_chat).unwrap());

        // Listings for every user are gone, not just the owner's.
        let listing: Option<Vec<ChatSummary>> = cache.get(&user_chats_key("alice"));
        assert!(listing.is_none());
        let listing: Option<Vec<ChatSummary>> = cache.get(&user_chats_key("bob"));
        assert!(listing.is_none());
        let history: Option<ChatRecord> = cache.get(&chat_history_key(&alice_chat));
        assert!(history.is_none());

        assert!(service.chat_history(&alice_chat).unwrap().is_none());
        assert!(service.user_chats("alice").unwrap().is_empty());
    }
}

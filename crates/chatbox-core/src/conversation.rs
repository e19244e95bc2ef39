//! Conversation controller
//!
//! Owns the message log, the loading flag and the [`GlobalConfig`], and keeps
//! durable storage in step with them. Storage and the completions endpoint
//! are injected so the whole flow can run against fakes.

use anyhow::Result;

use crate::ai::{CompletionReply, CompletionRequest, CompletionsClient};
use crate::config::{GlobalConfig, CONFIG_KEY, CONVERSATION_KEY};
use crate::error::ConversationError;
use crate::state::{ChatMessage, ChatRole};
use crate::storage::Storage;

pub struct Conversation<S, C> {
    messages: Vec<ChatMessage>,
    loading: bool,
    config: GlobalConfig,
    storage: S,
    client: C,
}

impl<S: Storage, C: CompletionsClient> Conversation<S, C> {
    /// Empty log and default config, without touching storage
    pub fn new(storage: S, client: C) -> Self {
        Self {
            messages: Vec::new(),
            loading: false,
            config: GlobalConfig::default(),
            storage,
            client,
        }
    }

    /// Best-effort restore of config and (when persist is on) the log.
    ///
    /// Never fails: unreadable or malformed entries are logged and the
    /// defaults kept. Storage is reconciled once afterwards.
    pub fn restore(storage: S, client: C) -> Self {
        let mut conversation = Self::new(storage, client);

        if let Some(config) = conversation.load_config() {
            if config.persist {
                conversation.messages = conversation.load_log().unwrap_or_default();
            }
            conversation.config = config;
        }

        conversation.persist_log();
        conversation
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Replace the settings and save them for the next session
    pub fn set_config(&mut self, config: GlobalConfig) {
        self.config = config;

        match self.config.to_json() {
            Ok(json) => {
                if let Err(e) = self.storage.set(CONFIG_KEY, &json) {
                    log::warn!("Failed to save settings: {:#}", e);
                }
            }
            Err(e) => log::warn!("Failed to serialize settings: {:#}", e),
        }

        self.persist_log();
    }

    /// Empty the log. Not allowed while a reply is pending, since the reply
    /// would otherwise land in the cleared log.
    pub fn clear(&mut self) -> Result<(), ConversationError> {
        if self.loading {
            return Err(ConversationError::Busy);
        }
        self.messages.clear();
        self.persist_log();
        Ok(())
    }

    /// Append `text` as a user message, raise the loading flag and build the
    /// request that carries the full log.
    pub fn begin_submit(&mut self, text: &str) -> Result<CompletionRequest, ConversationError> {
        if self.loading {
            return Err(ConversationError::Busy);
        }

        self.messages.push(ChatMessage::user(text));
        self.loading = true;
        self.persist_log();

        log::debug!(
            "Sending {} messages to model {}",
            self.messages.len(),
            self.config.model
        );

        Ok(CompletionRequest {
            key: self.config.api_key.clone(),
            model: self.config.model.clone(),
            messages: self.messages.clone(),
        })
    }

    /// Append the answer to the pending submission and clear the loading flag.
    ///
    /// Server rejections and failed exchanges become assistant messages
    /// (`"Error: <msg>"` and `"Error"`), never errors.
    pub fn finish_submit(
        &mut self,
        outcome: Result<CompletionReply>,
    ) -> Result<ChatMessage, ConversationError> {
        if !self.loading {
            return Err(ConversationError::NotPending);
        }

        let reply = match outcome {
            Ok(CompletionReply::Message(message)) => {
                if message.role != ChatRole::Assistant {
                    log::debug!("Reply arrived with role {}", message.role.as_str());
                }
                ChatMessage::assistant(message.content)
            }
            Ok(CompletionReply::Rejected { msg }) => {
                ChatMessage::assistant(format!("Error: {}", msg.as_deref().unwrap_or("Unknown")))
            }
            Err(e) => {
                log::warn!("Completions request failed: {:#}", e);
                ChatMessage::assistant("Error")
            }
        };

        self.messages.push(reply.clone());
        self.persist_log();
        self.loading = false;

        Ok(reply)
    }

    /// Submit `text` and wait for the answer
    pub async fn submit(&mut self, text: &str) -> Result<ChatMessage, ConversationError> {
        let request = self.begin_submit(text)?;
        let outcome = self.client.complete(&request).await;
        self.finish_submit(outcome)
    }

    /// Mirror the log to storage when persist is on, drop it otherwise
    fn persist_log(&mut self) {
        let result = if self.config.persist {
            serde_json::to_string(&self.messages)
                .map_err(anyhow::Error::from)
                .and_then(|json| self.storage.set(CONVERSATION_KEY, &json))
        } else {
            self.storage.remove(CONVERSATION_KEY)
        };

        if let Err(e) = result {
            log::warn!("Failed to update stored conversation: {:#}", e);
        }
    }

    fn load_config(&self) -> Option<GlobalConfig> {
        let raw = self.read_entry(CONFIG_KEY)?;
        match GlobalConfig::from_json(&raw) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Ignoring stored settings: {:#}", e);
                None
            }
        }
    }

    fn load_log(&self) -> Option<Vec<ChatMessage>> {
        let raw = self.read_entry(CONVERSATION_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(messages) => Some(messages),
            Err(e) => {
                log::warn!("Ignoring stored conversation: {}", e);
                None
            }
        }
    }

    /// Non-empty stored value for `key`; read errors count as absent
    fn read_entry(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                log::warn!("Failed to read {}: {:#}", key, e);
                None
            }
        }
    }
}

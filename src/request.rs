//! Request data model: `ProviderRequest`, chat messages, and their derived views.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default request timeout when the caller does not supply one.
pub const DEFAULT_TIMEOUT_S: f64 = 30.0;

/// A single chat turn. `content` may be a plain string or an ordered list of
/// strings (joined with no separator is wrong; callers read `content_text()`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<String>),
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    /// Content flattened to a single string (parts joined with a single space,
    /// empty parts dropped).
    pub fn content_text(&self) -> String {
        match &self.content {
            MessageContent::Text(s) => s.trim().to_string(),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    fn normalized(&self) -> Option<ChatMessage> {
        let role = self.role.trim().to_string();
        let text = self.content_text();
        if text.is_empty() {
            return None;
        }
        Some(ChatMessage {
            role,
            content: MessageContent::Text(text),
        })
    }
}

/// Immutable request value driving one provider call (or one consensus round).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub model: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub options: HashMap<String, Value>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    #[serde(default)]
    pub stop: Vec<String>,
    #[serde(default = "default_timeout")]
    pub timeout_s: f64,
}

fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT_S
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            messages: Vec::new(),
            options: HashMap::new(),
            metadata: HashMap::new(),
            max_tokens: None,
            temperature: None,
            top_p: None,
            stop: Vec::new(),
            timeout_s: DEFAULT_TIMEOUT_S,
        }
    }

    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn with_timeout_s(mut self, timeout_s: f64) -> Self {
        self.timeout_s = timeout_s;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// `model` non-empty after trimming whitespace.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("model must not be empty".to_string());
        }
        Ok(())
    }

    /// Derived view: `prompt` if non-empty after stripping, else the first
    /// user-role message's content.
    pub fn prompt_text(&self) -> String {
        let trimmed = self.prompt.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
        self.messages
            .iter()
            .find(|m| m.role.trim() == "user")
            .map(|m| m.content_text())
            .unwrap_or_default()
    }

    /// Derived view: normalized messages, or a single synthesized user turn
    /// built from `prompt_text()` when no messages were supplied.
    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        let normalized: Vec<ChatMessage> =
            self.messages.iter().filter_map(|m| m.normalized()).collect();
        if !normalized.is_empty() {
            return normalized;
        }
        let prompt_text = self.prompt_text();
        if prompt_text.is_empty() {
            return Vec::new();
        }
        vec![ChatMessage::user(prompt_text)]
    }
}

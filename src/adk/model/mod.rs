// SPDX-License-Identifier: MIT

//! Model module - defines the LLM model trait and message types
//!
//! Providers live in their own submodules:
//! - [anthropic] - Anthropic's Messages API
//! - [scripted] - replays canned responses, for tests and offline runs

pub mod anthropic;
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adk::error::ModelError;
use crate::adk::tool::ToolSpec;

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    /// When set, the provider must answer with a JSON value matching this schema
    pub response_schema: Option<ResponseSchema>,
}

/// A named JSON schema bound for structured output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
    /// Stable message id; the `messages` reducer replaces by id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Parts of a message - text, thinking, function calls, etc.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Part {
    /// Regular text output from the model
    Text(String),
    /// Thinking/reasoning content from thinking models
    Thinking(String),
    /// Function/tool call requested by the model
    FunctionCall {
        name: String,
        args: serde_json::Value,
        /// Provider-assigned call id, echoed back with the response
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
    },
    /// Response from executing a function/tool
    FunctionResponse {
        name: String,
        response: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
    },
}

impl Content {
    fn text_message(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part::Text(text.into())],
            id: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::text_message("system", text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text_message("user", text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::text_message("model", text)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Concatenated text parts, ignoring thinking and tool parts
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Render a conversation as `role: text` lines
pub fn buffer_string(messages: &[Content]) -> String {
    messages
        .iter()
        .map(|m| {
            let role = match m.role.as_str() {
                "user" => "Human",
                "model" => "AI",
                "system" => "System",
                other => other,
            };
            format!("{}: {}", role, m.text())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Core trait for LLM model implementations
#[async_trait]
pub trait Model: Send + Sync {
    /// Provider name for logs and errors
    fn provider(&self) -> &str;

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[ToolSpec]>,
    ) -> Result<Content, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_text_skips_non_text_parts() {
        let content = Content {
            role: "model".to_string(),
            parts: vec![
                Part::Thinking("hmm".to_string()),
                Part::Text("Hello ".to_string()),
                Part::FunctionCall {
                    name: "multiply".to_string(),
                    args: serde_json::json!({"a": 2, "b": 3}),
                    call_id: None,
                },
                Part::Text("world".to_string()),
            ],
            id: None,
        };
        assert_eq!(content.text(), "Hello world");
    }

    #[test]
    fn test_buffer_string() {
        let messages = vec![
            Content::user("I want to research coffee shops."),
            Content::model("Which city?"),
        ];
        assert_eq!(
            buffer_string(&messages),
            "Human: I want to research coffee shops.\nAI: Which city?"
        );
    }

    #[test]
    fn test_content_id_skipped_when_absent() {
        let json = serde_json::to_value(Content::user("hi")).unwrap();
        assert!(json.get("id").is_none());

        let json = serde_json::to_value(Content::user("hi").with_id("m1")).unwrap();
        assert_eq!(json["id"], "m1");
    }
}

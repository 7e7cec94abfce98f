// SPDX-License-Identifier: MIT

//! Anthropic Model - Claude Messages API implementation
//!
//! Structured output is requested the way the Messages API supports it: the
//! bound schema is offered as a single tool and `tool_choice` forces the model
//! to call it, so the answer arrives as that tool's input.

use super::{Content, GenerationConfig, Model, Part, ResponseSchema};
use crate::adk::error::ModelError;
use crate::adk::tool::ToolSpec;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::env;

const PROVIDER: &str = "Anthropic";
const API_VERSION: &str = "2023-06-01";

/// Anthropic Claude model implementation
pub struct AnthropicModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl AnthropicModel {
    /// Create a new AnthropicModel
    ///
    /// Requires `ANTHROPIC_API_KEY` environment variable to be set.
    /// Optionally uses `ANTHROPIC_BASE_URL` for custom endpoints.
    pub fn new(model_name: String) -> Result<Self, ModelError> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .map_err(|_| ModelError::ApiKeyMissing(PROVIDER.to_string()))?;
        let base_url = env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com/v1".to_string());

        Ok(Self::with_endpoint(model_name, api_key, base_url))
    }

    /// Create a model against an explicit endpoint, bypassing the environment
    pub fn with_endpoint(model_name: String, api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
        }
    }

    /// All system messages joined; the API takes them as one top-level field
    fn extract_system_message(history: &[Content]) -> Option<String> {
        let system: Vec<String> = history
            .iter()
            .filter(|c| c.role == "system")
            .map(Content::text)
            .filter(|t| !t.is_empty())
            .collect();
        if system.is_empty() {
            None
        } else {
            Some(system.join("\n\n"))
        }
    }

    /// Convert internal Content to Anthropic message format
    fn content_to_anthropic_message(content: &Content) -> Option<Value> {
        if content.role == "system" {
            return None;
        }

        let role = match content.role.as_str() {
            "model" => "assistant",
            _ => "user",
        };

        let blocks: Vec<Value> = content
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(t) if t.is_empty() => None,
                Part::Text(t) => Some(json!({ "type": "text", "text": t })),
                // Thinking blocks need provider signatures to be replayed
                Part::Thinking(_) => None,
                Part::FunctionCall {
                    name,
                    args,
                    call_id,
                } => Some(json!({
                    "type": "tool_use",
                    "id": call_id.clone().unwrap_or_else(|| format!("toolu_{}", name)),
                    "name": name,
                    "input": args
                })),
                Part::FunctionResponse {
                    name,
                    response,
                    call_id,
                } => Some(json!({
                    "type": "tool_result",
                    "tool_use_id": call_id.clone().unwrap_or_else(|| format!("toolu_{}", name)),
                    "content": response.to_string()
                })),
            })
            .collect();

        if blocks.is_empty() {
            return None;
        }

        Some(json!({ "role": role, "content": blocks }))
    }

    fn tool_to_anthropic_format(spec: &ToolSpec) -> Value {
        json!({
            "name": spec.name,
            "description": spec.description,
            "input_schema": spec.input_schema
        })
    }

    fn schema_tool(schema: &ResponseSchema) -> Value {
        json!({
            "name": schema.name,
            "description": format!("Respond with a {} object.", schema.name),
            "input_schema": schema.schema
        })
    }

    fn build_request_body(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[ToolSpec]>,
    ) -> Value {
        let messages: Vec<Value> = history
            .iter()
            .filter_map(Self::content_to_anthropic_message)
            .collect();

        let mut body = json!({
            "model": self.model_name,
            "messages": messages,
            "max_tokens": config.and_then(|c| c.max_output_tokens).unwrap_or(8192)
        });

        if let Some(sys) = Self::extract_system_message(history) {
            body["system"] = json!(sys);
        }

        let mut tool_defs: Vec<Value> = tools
            .unwrap_or_default()
            .iter()
            .map(Self::tool_to_anthropic_format)
            .collect();

        if let Some(cfg) = config {
            if let Some(temp) = cfg.temperature {
                body["temperature"] = json!(temp);
            }
            if let Some(top_p) = cfg.top_p {
                body["top_p"] = json!(top_p);
            }
            if let Some(top_k) = cfg.top_k {
                body["top_k"] = json!(top_k);
            }
            if let Some(schema) = &cfg.response_schema {
                tool_defs.push(Self::schema_tool(schema));
                body["tool_choice"] = json!({ "type": "tool", "name": schema.name });
            }
        }

        if !tool_defs.is_empty() {
            body["tools"] = Value::Array(tool_defs);
        }

        body
    }

    /// Parse Anthropic response into Content
    fn parse_anthropic_response(response: &Value) -> Result<Content, ModelError> {
        let content_blocks = response["content"].as_array().ok_or_else(|| {
            ModelError::InvalidResponse("No content in Anthropic response".to_string())
        })?;

        let mut parts = Vec::new();

        for block in content_blocks {
            match block["type"].as_str() {
                Some("text") => {
                    if let Some(text) = block["text"].as_str().filter(|t| !t.is_empty()) {
                        parts.push(Part::Text(text.to_string()));
                    }
                }
                Some("thinking") => {
                    if let Some(thinking) = block["thinking"].as_str().filter(|t| !t.is_empty()) {
                        parts.push(Part::Thinking(thinking.to_string()));
                    }
                }
                Some("tool_use") => {
                    let name = block["name"].as_str().ok_or_else(|| {
                        ModelError::InvalidResponse("tool_use block without name".to_string())
                    })?;
                    parts.push(Part::FunctionCall {
                        name: name.to_string(),
                        args: block["input"].clone(),
                        call_id: block["id"].as_str().map(str::to_string),
                    });
                }
                other => log::debug!("Ignoring Anthropic content block {:?}", other),
            }
        }

        if let Some(stop_reason) = response["stop_reason"].as_str() {
            log::debug!("Anthropic stop reason: {}", stop_reason);
        }

        Ok(Content {
            role: "model".to_string(),
            parts,
            id: response["id"].as_str().map(str::to_string),
        })
    }
}

#[async_trait]
impl Model for AnthropicModel {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[ToolSpec]>,
    ) -> Result<Content, ModelError> {
        let url = format!("{}/messages", self.base_url);
        let body = self.build_request_body(history, config, tools);

        log::debug!(
            "Anthropic request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ModelError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(ModelError::api(PROVIDER, status.as_u16(), text));
        }

        let resp_json: Value = resp.json().await?;
        log::info!(
            "Anthropic response: {} content blocks, usage {}",
            resp_json["content"].as_array().map(Vec::len).unwrap_or(0),
            resp_json["usage"]
        );

        Self::parse_anthropic_response(&resp_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> AnthropicModel {
        AnthropicModel::with_endpoint(
            "claude-3-7-sonnet-latest".to_string(),
            "test-key".to_string(),
            "http://localhost".to_string(),
        )
    }

    #[test]
    fn test_extract_system_message() {
        let history = vec![
            Content::system("You are helpful"),
            Content::system("Be brief"),
            Content::user("Hello"),
        ];

        let system = AnthropicModel::extract_system_message(&history);
        assert_eq!(system, Some("You are helpful\n\nBe brief".to_string()));
    }

    #[test]
    fn test_content_to_anthropic_messages() {
        let msg = AnthropicModel::content_to_anthropic_message(&Content::user("Hello")).unwrap();
        assert_eq!(msg["role"], "user");
        assert_eq!(msg["content"][0]["type"], "text");
        assert_eq!(msg["content"][0]["text"], "Hello");

        let msg =
            AnthropicModel::content_to_anthropic_message(&Content::model("I can help")).unwrap();
        assert_eq!(msg["role"], "assistant");

        assert!(AnthropicModel::content_to_anthropic_message(&Content::system("sys")).is_none());
    }

    #[test]
    fn test_tool_round_trip_keeps_call_id() {
        let call = Content {
            role: "model".to_string(),
            parts: vec![Part::FunctionCall {
                name: "multiply".to_string(),
                args: json!({"a": 2, "b": 3}),
                call_id: Some("toolu_42".to_string()),
            }],
            id: None,
        };
        let msg = AnthropicModel::content_to_anthropic_message(&call).unwrap();
        assert_eq!(msg["content"][0]["type"], "tool_use");
        assert_eq!(msg["content"][0]["id"], "toolu_42");

        let result = Content {
            role: "user".to_string(),
            parts: vec![Part::FunctionResponse {
                name: "multiply".to_string(),
                response: json!(6),
                call_id: Some("toolu_42".to_string()),
            }],
            id: None,
        };
        let msg = AnthropicModel::content_to_anthropic_message(&result).unwrap();
        assert_eq!(msg["content"][0]["type"], "tool_result");
        assert_eq!(msg["content"][0]["tool_use_id"], "toolu_42");
        assert_eq!(msg["content"][0]["content"], "6");
    }

    #[test]
    fn test_response_schema_forces_tool_choice() {
        let config = GenerationConfig {
            response_schema: Some(ResponseSchema {
                name: "Route".to_string(),
                schema: json!({"type": "object", "properties": {"step": {"type": "string"}}}),
            }),
            ..Default::default()
        };

        let body = model().build_request_body(&[Content::user("route me")], Some(&config), None);
        assert_eq!(body["tool_choice"]["name"], "Route");
        assert_eq!(body["tools"][0]["name"], "Route");
        assert_eq!(body["max_tokens"], 8192);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn test_plain_request_has_no_tools() {
        let body = model().build_request_body(&[Content::user("hi")], None, Some(&[]));
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn test_parse_anthropic_text_response() {
        let response = json!({
            "id": "msg_1",
            "content": [{ "type": "text", "text": "Hello, how can I help?" }],
            "stop_reason": "end_turn"
        });

        let content = AnthropicModel::parse_anthropic_response(&response).unwrap();
        assert_eq!(content.role, "model");
        assert_eq!(content.id.as_deref(), Some("msg_1"));
        assert_eq!(content.text(), "Hello, how can I help?");
    }

    #[test]
    fn test_parse_anthropic_tool_use_response() {
        let response = json!({
            "content": [
                { "type": "text", "text": "I can calculate that." },
                { "type": "tool_use", "id": "toolu_1", "name": "multiply", "input": {"a": 2, "b": 3} }
            ],
            "stop_reason": "tool_use"
        });

        let content = AnthropicModel::parse_anthropic_response(&response).unwrap();
        assert_eq!(content.parts.len(), 2);

        match &content.parts[1] {
            Part::FunctionCall {
                name,
                args,
                call_id,
            } => {
                assert_eq!(name, "multiply");
                assert_eq!(args["b"], 3);
                assert_eq!(call_id.as_deref(), Some("toolu_1"));
            }
            other => panic!("Expected FunctionCall part, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_response_without_content_is_invalid() {
        let err = AnthropicModel::parse_anthropic_response(&json!({"type": "error"})).unwrap_err();
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }
}

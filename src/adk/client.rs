// SPDX-License-Identifier: MIT

//! LLM client - the narrow port steps use to reach a model
//!
//! Wraps any [`Model`] provider with three calls: plain `invoke`, schema-bound
//! `invoke_structured`, and `invoke_with_tools`. Retries, timeouts and rate
//! limits stay with the provider.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::adk::error::ModelError;
use crate::adk::model::{Content, GenerationConfig, Model, Part, ResponseSchema};
use crate::adk::tool::{ToolCall, ToolSpec};

/// A model reply split into text and requested tool calls
#[derive(Debug, Clone)]
pub struct Response {
    pub content: Content,
    pub tool_calls: Vec<ToolCall>,
}

impl Response {
    fn from_content(content: Content) -> Self {
        let tool_calls = content
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::FunctionCall {
                    name,
                    args,
                    call_id,
                } => Some(ToolCall {
                    name: name.clone(),
                    args: args.clone(),
                    call_id: call_id.clone(),
                }),
                _ => None,
            })
            .collect();
        Self {
            content,
            tool_calls,
        }
    }

    pub fn text(&self) -> String {
        self.content.text()
    }
}

/// Shared handle to a model; cheap to clone into every step context
#[derive(Clone)]
pub struct LlmClient {
    model: Arc<dyn Model>,
    config: GenerationConfig,
}

impl LlmClient {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self {
            model,
            config: GenerationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn provider(&self) -> &str {
        self.model.provider()
    }

    /// Free-text call
    pub async fn invoke(&self, messages: &[Content]) -> Result<Response, ModelError> {
        let content = self
            .model
            .generate_content(messages, Some(&self.config), None)
            .await?;
        Ok(Response::from_content(content))
    }

    /// Single user prompt, text back
    pub async fn prompt(&self, text: impl Into<String>) -> Result<String, ModelError> {
        Ok(self.invoke(&[Content::user(text)]).await?.text())
    }

    /// Call with tools bound; the reply may request zero or more tool calls
    pub async fn invoke_with_tools(
        &self,
        messages: &[Content],
        tools: &[ToolSpec],
    ) -> Result<Response, ModelError> {
        let content = self
            .model
            .generate_content(messages, Some(&self.config), Some(tools))
            .await?;
        Ok(Response::from_content(content))
    }

    /// Call with a schema derived from `T` bound, decoding the answer into `T`
    pub async fn invoke_structured<T>(&self, messages: &[Content]) -> Result<T, ModelError>
    where
        T: JsonSchema + DeserializeOwned,
    {
        let schema = ResponseSchema {
            name: T::schema_name(),
            schema: serde_json::to_value(schemars::schema_for!(T))
                .map_err(|e| ModelError::structured(T::schema_name(), e.to_string()))?,
        };
        let value = self.invoke_value(messages, schema.clone()).await?;
        serde_json::from_value(value).map_err(|e| ModelError::structured(schema.name, e.to_string()))
    }

    /// Call with an explicit JSON schema bound, returning the raw value
    pub async fn invoke_value(
        &self,
        messages: &[Content],
        schema: ResponseSchema,
    ) -> Result<Value, ModelError> {
        let config = GenerationConfig {
            response_schema: Some(schema.clone()),
            ..self.config.clone()
        };
        let content = self
            .model
            .generate_content(messages, Some(&config), None)
            .await?;
        extract_structured(&content, &schema.name)
    }
}

/// Pull the structured answer out of a reply: the schema tool's input if the
/// provider used one, otherwise the text parsed as JSON.
fn extract_structured(content: &Content, schema_name: &str) -> Result<Value, ModelError> {
    for part in &content.parts {
        if let Part::FunctionCall { name, args, .. } = part {
            if name == schema_name {
                return Ok(args.clone());
            }
        }
    }

    let text = content.text();
    let trimmed = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(trimmed).map_err(|e| {
        ModelError::structured(schema_name, format!("{} (reply was: {:?})", e, text))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::model::scripted::ScriptedModel;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct SearchQuery {
        search_query: String,
        justification: String,
    }

    #[tokio::test]
    async fn test_invoke_structured_from_schema_tool() {
        let model = Arc::new(ScriptedModel::new(vec![ScriptedModel::structured(
            "SearchQuery",
            json!({"search_query": "calcium score cholesterol", "justification": "relevant"}),
        )]));
        let client = LlmClient::new(model.clone());

        let query: SearchQuery = client
            .invoke_structured(&[Content::user("How does Calcium CT score relate to high cholesterol?")])
            .await
            .unwrap();
        assert_eq!(query.search_query, "calcium score cholesterol");
        assert_eq!(model.requests()[0].schema.as_deref(), Some("SearchQuery"));
    }

    #[tokio::test]
    async fn test_invoke_structured_from_fenced_text() {
        let model = Arc::new(ScriptedModel::texts([
            "```json\n{\"search_query\": \"q\", \"justification\": \"j\"}\n```",
        ]));
        let client = LlmClient::new(model);

        let query: SearchQuery = client.invoke_structured(&[Content::user("x")]).await.unwrap();
        assert_eq!(
            query,
            SearchQuery {
                search_query: "q".to_string(),
                justification: "j".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_invoke_structured_rejects_mismatched_reply() {
        let model = Arc::new(ScriptedModel::texts(["not json at all"]));
        let client = LlmClient::new(model);

        let err = client
            .invoke_structured::<SearchQuery>(&[Content::user("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::StructuredOutput { .. }));
    }

    #[tokio::test]
    async fn test_invoke_with_tools_collects_calls() {
        let model = Arc::new(ScriptedModel::new(vec![ScriptedModel::tool_call(
            "I can calculate that for you.",
            "multiply",
            json!({"a": 2, "b": 3}),
        )]));
        let client = LlmClient::new(model);

        let response = client.invoke_with_tools(&[Content::user("What is 2 times 3?")], &[]).await.unwrap();
        assert_eq!(response.text(), "I can calculate that for you.");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "multiply");
        assert_eq!(response.tool_calls[0].args, json!({"a": 2, "b": 3}));
    }

    #[tokio::test]
    async fn test_prompt_returns_text() {
        let client = LlmClient::new(Arc::new(ScriptedModel::texts(["a poem"])));
        assert_eq!(client.prompt("Write a poem").await.unwrap(), "a poem");
    }
}

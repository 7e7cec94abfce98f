// SPDX-License-Identifier: MIT

//! The augmented LLM: the building block every other pattern is made of.
//!
//! Three augmentations on a bare client, no graph involved: structured
//! output, tool calling, and conversation memory.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::error::Error;
use std::sync::Arc;

use crate::adk::client::LlmClient;
use crate::adk::error::{ModelError, WeftError};
use crate::adk::memory::ConversationMemory;
use crate::adk::model::{Content, Part};
use crate::adk::registry::ToolRegistry;
use crate::adk::tool::Tool;

const DEFAULT_QUESTION: &str = "How does Calcium CT score relate to high cholesterol?";
const DEFAULT_MATH: &str = "What is 2 times 3?";

/// Structured answer: a query tuned for web search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchQuery {
    /// Query that is optimized for web search
    pub search_query: String,
    /// Why this query is relevant to the user's request
    pub justification: String,
}

pub struct MultiplyTool {
    schema: Value,
}

impl MultiplyTool {
    pub fn new() -> Self {
        Self {
            schema: json!({
                "type": "object",
                "properties": {
                    "a": { "type": "number" },
                    "b": { "type": "number" }
                },
                "required": ["a", "b"]
            }),
        }
    }
}

impl Default for MultiplyTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for MultiplyTool {
    fn name(&self) -> &str {
        "multiply"
    }

    fn description(&self) -> &str {
        "Multiply two numbers"
    }

    fn schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, input: Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let a = input["a"].as_f64().ok_or("missing number 'a'")?;
        let b = input["b"].as_f64().ok_or("missing number 'b'")?;
        Ok(json!(a * b))
    }
}

/// Ask for a web search query instead of an answer
pub async fn search_query(client: &LlmClient, question: &str) -> Result<SearchQuery, ModelError> {
    client.invoke_structured(&[Content::user(question)]).await
}

/// Bind the registry's tools, then execute whatever calls the model asks for.
///
/// Returns the tool responses in request order; empty when the model
/// answered directly.
pub async fn call_tools(
    client: &LlmClient,
    tools: &ToolRegistry,
    question: &str,
) -> Result<Vec<Part>, ModelError> {
    let specs = tools.specs().await;
    let response = client
        .invoke_with_tools(&[Content::user(question)], &specs)
        .await?;

    let mut results = Vec::with_capacity(response.tool_calls.len());
    for call in &response.tool_calls {
        results.push(tools.dispatch(call).await);
    }
    Ok(results)
}

/// A chat that folds its own transcript into every prompt
pub struct MemoryChat {
    client: LlmClient,
    memory: ConversationMemory,
}

impl MemoryChat {
    pub fn new(client: LlmClient) -> Self {
        Self {
            client,
            memory: ConversationMemory::new(),
        }
    }

    pub async fn send(&mut self, input: &str) -> Result<String, ModelError> {
        let prompt = self.memory.augment(input);
        let answer = self.client.prompt(prompt).await?;
        self.memory.add_message("user", input);
        self.memory.add_message("assistant", answer.clone());
        Ok(answer)
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }
}

/// Run all three augmentations.
///
/// Recognised input keys: `question`, `math` and `turns` (array of strings).
pub async fn run(client: LlmClient, input: &Value) -> Result<Value, WeftError> {
    let question = input["question"].as_str().unwrap_or(DEFAULT_QUESTION);
    let query = search_query(&client, question).await?;
    log::info!("Search query: {}", query.search_query);

    let registry = ToolRegistry::new();
    registry.register(Arc::new(MultiplyTool::new())).await;
    let math = input["math"].as_str().unwrap_or(DEFAULT_MATH);
    let tool_results: Vec<Value> = call_tools(&client, &registry, math)
        .await?
        .into_iter()
        .filter_map(|part| match part {
            Part::FunctionResponse { name, response, .. } => {
                Some(json!({ "tool": name, "result": response }))
            }
            _ => None,
        })
        .collect();

    let turns: Vec<String> = match input.get("turns") {
        Some(turns) => serde_json::from_value(turns.clone())?,
        None => vec!["Hi, my name is Alice".to_string(), "What's my name?".to_string()],
    };
    let mut chat = MemoryChat::new(client);
    let mut replies = Vec::with_capacity(turns.len());
    for turn in &turns {
        replies.push(chat.send(turn).await?);
    }

    Ok(json!({
        "search_query": query,
        "tool_results": tool_results,
        "replies": replies,
    }))
}

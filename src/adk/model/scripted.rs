// SPDX-License-Identifier: MIT

//! Scripted model - replays canned responses in order
//!
//! Used by the test suite and by the CLI's `--offline` mode. Every request is
//! recorded so tests can assert on what a step actually sent.

use super::{Content, GenerationConfig, Model, Part};
use crate::adk::error::ModelError;
use crate::adk::tool::ToolSpec;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

/// A request as observed by the scripted model
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub history: Vec<Content>,
    pub schema: Option<String>,
    pub tools: Vec<String>,
}

/// What to do when the script runs out
#[derive(Debug, Clone)]
enum Fallback {
    Fail,
    Repeat,
}

pub struct ScriptedModel {
    responses: Vec<Content>,
    fallback: Fallback,
    served: Mutex<usize>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Content>) -> Self {
        Self {
            responses,
            fallback: Fallback::Fail,
            served: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Plain text replies, one per call
    pub fn texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(Content::model).collect())
    }

    /// Keep serving the last response once the script is exhausted
    pub fn repeat_last(mut self) -> Self {
        self.fallback = Fallback::Repeat;
        self
    }

    /// A reply carrying a structured value as a call of the schema tool
    pub fn structured(schema_name: &str, value: Value) -> Content {
        Content {
            role: "model".to_string(),
            parts: vec![Part::FunctionCall {
                name: schema_name.to_string(),
                args: value,
                call_id: None,
            }],
            id: None,
        }
    }

    /// A reply requesting a tool call
    pub fn tool_call(text: &str, tool: &str, args: Value) -> Content {
        let mut parts = Vec::new();
        if !text.is_empty() {
            parts.push(Part::Text(text.to_string()));
        }
        parts.push(Part::FunctionCall {
            name: tool.to_string(),
            args,
            call_id: Some(format!("call_{}", tool)),
        });
        Content {
            role: "model".to_string(),
            parts,
            id: None,
        }
    }

    /// Build from a JSON script: a string is a text reply,
    /// `{"structured": name, "value": v}` a structured answer and
    /// `{"tool": name, "args": a}` a tool call.
    pub fn from_script(script: &Value) -> Result<Self, ModelError> {
        let entries = script
            .as_array()
            .ok_or_else(|| ModelError::InvalidResponse("script must be a JSON array".to_string()))?;
        let mut responses = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let reply = match entry {
                Value::String(text) => Content::model(text.clone()),
                Value::Object(obj) => match (obj.get("structured"), obj.get("tool")) {
                    (Some(Value::String(name)), _) => {
                        Self::structured(name, obj.get("value").cloned().unwrap_or(Value::Null))
                    }
                    (_, Some(Value::String(tool))) => Self::tool_call(
                        obj.get("text").and_then(Value::as_str).unwrap_or_default(),
                        tool,
                        obj.get("args").cloned().unwrap_or(Value::Null),
                    ),
                    _ => {
                        return Err(ModelError::InvalidResponse(format!(
                            "script entry {} needs a 'structured' or 'tool' key",
                            i
                        )))
                    }
                },
                other => {
                    return Err(ModelError::InvalidResponse(format!(
                        "script entry {} is neither text nor object: {}",
                        i, other
                    )))
                }
            };
            responses.push(reply);
        }
        Ok(Self::new(responses))
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn served(&self) -> usize {
        self.served.lock().map(|s| *s).unwrap_or(0)
    }
}

#[async_trait]
impl Model for ScriptedModel {
    fn provider(&self) -> &str {
        "Scripted"
    }

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[ToolSpec]>,
    ) -> Result<Content, ModelError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                history: history.to_vec(),
                schema: config
                    .and_then(|c| c.response_schema.as_ref())
                    .map(|s| s.name.clone()),
                tools: tools
                    .unwrap_or_default()
                    .iter()
                    .map(|t| t.name.clone())
                    .collect(),
            });
        }

        let mut served = self
            .served
            .lock()
            .map_err(|_| ModelError::InvalidResponse("scripted model poisoned".to_string()))?;
        let idx = *served;
        *served += 1;

        match (self.responses.get(idx), &self.fallback) {
            (Some(response), _) => Ok(response.clone()),
            (None, Fallback::Repeat) => self
                .responses
                .last()
                .cloned()
                .ok_or(ModelError::Exhausted { served: idx }),
            (None, Fallback::Fail) => Err(ModelError::Exhausted { served: idx }),
        }
    }
}

// SPDX-License-Identifier: MIT

//! YAML schema types for workflow definitions
//!
//! A workflow file declares the state schema, prompt steps and the edges
//! between them. `START` and `END` may be spelled `START`/`END` or
//! `__start__`/`__end__`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::graph::{END, START};
use super::state::StateSchema;

/// Top-level workflow definition
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// State fields with their type, reducer and default
    #[serde(default)]
    pub state: StateSchema,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
    #[serde(default)]
    pub routes: Vec<RouteDefinition>,
    #[serde(default)]
    pub fan_out: Vec<FanOutDefinition>,
    #[serde(default)]
    pub joins: Vec<JoinDefinition>,
    pub loop_guard: Option<LoopGuardDefinition>,
    #[serde(default)]
    pub interrupt_before: Vec<String>,
}

/// A prompt step: render `prompt` from state, call the model, write the answer
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct StepDefinition {
    pub id: String,
    /// Template with `{field}` or `{field.path}` placeholders
    pub prompt: String,
    pub system: Option<String>,
    /// Field receiving the whole answer
    pub output: Option<String>,
    /// JSON Schema for structured output
    pub output_schema: Option<Value>,
    /// Maps state fields to paths in the structured answer
    pub outputs: Option<BTreeMap<String, String>>,
    /// Numeric field bumped by one on every invocation
    pub counter: Option<String>,
}

/// One or more destinations (single string or array)
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Targets {
    Single(String),
    Multiple(Vec<String>),
}

impl Targets {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Targets::Single(s) => vec![s.clone()],
            Targets::Multiple(v) => v.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EdgeDefinition {
    pub from: String,
    pub to: Targets,
}

/// Ordered branches; the first whose `when` holds wins, a branch without
/// `when` is the fallback
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RouteDefinition {
    pub from: String,
    pub branches: Vec<BranchDefinition>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BranchDefinition {
    pub when: Option<String>,
    pub goto: String,
}

/// One branch of `to` per element of the `over` list, the element passed
/// in the payload field `as`
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FanOutDefinition {
    pub from: String,
    pub over: String,
    pub to: String,
    #[serde(rename = "as")]
    pub item: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JoinDefinition {
    pub sources: Vec<String>,
    pub target: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoopGuardDefinition {
    pub counter: String,
    pub bound: u64,
}

/// Map the `START`/`END` spellings onto the engine's sentinels
pub fn node_name(name: &str) -> &str {
    match name {
        "START" => START,
        "END" => END,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets() {
        assert_eq!(Targets::Single("a".to_string()).to_vec(), vec!["a"]);
        assert_eq!(
            Targets::Multiple(vec!["a".to_string(), "b".to_string()]).to_vec(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_node_name_aliases() {
        assert_eq!(node_name("START"), "__start__");
        assert_eq!(node_name("END"), "__end__");
        assert_eq!(node_name("__end__"), "__end__");
        assert_eq!(node_name("write"), "write");
    }
}

// SPDX-License-Identifier: MIT

//! Workflow loader - YAML file loading and parsing

use super::types::WorkflowDefinition;
use crate::adk::error::WeftError;
use std::fs;
use std::path::Path;

/// Loads workflow definitions from YAML files
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a workflow definition from a YAML file
    pub fn load_workflow<P: AsRef<Path>>(&self, path: P) -> Result<WorkflowDefinition, WeftError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| WeftError::config(format!("cannot read {}: {}", path.display(), e)))?;
        let def = Self::parse_yaml(&content)?;
        log::info!("Loaded workflow '{}' from {}", def.name, path.display());
        Ok(def)
    }

    /// Parse a workflow definition from a YAML string
    pub fn parse_yaml(content: &str) -> Result<WorkflowDefinition, WeftError> {
        let def: WorkflowDefinition = serde_yaml::from_str(content)?;
        if def.steps.is_empty() {
            return Err(WeftError::config(format!("workflow '{}' declares no steps", def.name)));
        }
        Ok(def)
    }
}

impl Default for WorkflowLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weft::workflow::state::ReducerType;
    use crate::weft::workflow::types::Targets;

    #[test]
    fn test_parse_evaluator_workflow() {
        let yaml = r#"
name: joke_loop
description: "Write, grade, retry"

state:
  topic: { type: string }
  joke: { type: string }
  grade: { type: string }
  feedback: { type: string }
  retries: { type: number, default: -1 }

steps:
  - id: write
    prompt: "Write a joke about {topic}. Feedback: {feedback}"
    output: joke
    counter: retries
  - id: evaluate
    prompt: "Grade this joke: {joke}"
    output_schema:
      type: object
      properties:
        grade: { type: string, enum: [funny, not_funny] }
        feedback: { type: string }
    outputs:
      grade: grade
      feedback: feedback

edges:
  - from: START
    to: write
  - from: write
    to: evaluate

routes:
  - from: evaluate
    branches:
      - when: "grade == 'not_funny' and retries < 3"
        goto: write
      - goto: END

loop_guard:
  counter: retries
  bound: 3
"#;
        let def = WorkflowLoader::parse_yaml(yaml).unwrap();
        assert_eq!(def.name, "joke_loop");
        assert_eq!(def.steps.len(), 2);
        assert_eq!(def.steps[0].counter.as_deref(), Some("retries"));
        assert_eq!(def.edges[0].to, Targets::Single("write".to_string()));
        assert_eq!(def.routes[0].branches.len(), 2);
        assert!(def.routes[0].branches[1].when.is_none());
        assert_eq!(def.loop_guard.as_ref().map(|g| g.bound), Some(3));
        assert_eq!(def.state.fields["retries"].default, Some(serde_json::json!(-1)));
    }

    #[test]
    fn test_parse_fan_out_and_join() {
        let yaml = r#"
name: report
state:
  topic: { type: string }
  sections: { type: array }
  completed_sections: { type: array, reducer: append }
steps:
  - id: orchestrator
    prompt: "Plan a report on {topic}"
    output: sections
  - id: llm_call
    prompt: "Write section {section.name}"
    output: completed_sections
  - id: synthesizer
    prompt: "Join {completed_sections}"
    output: topic
edges:
  - from: START
    to: orchestrator
  - from: llm_call
    to: [synthesizer]
  - from: synthesizer
    to: END
fan_out:
  - from: orchestrator
    over: sections
    to: llm_call
    as: section
"#;
        let def = WorkflowLoader::parse_yaml(yaml).unwrap();
        assert_eq!(def.fan_out[0].item, "section");
        assert_eq!(def.edges[1].to, Targets::Multiple(vec!["synthesizer".to_string()]));
        assert_eq!(
            def.state.fields["completed_sections"].reducer,
            ReducerType::Append
        );
    }

    #[test]
    fn test_workflow_without_steps_is_config_error() {
        let err = WorkflowLoader::parse_yaml("name: empty").unwrap_err();
        assert!(matches!(err, WeftError::Config(_)));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = WorkflowLoader::parse_yaml("name: [unclosed").unwrap_err();
        assert!(matches!(err, WeftError::Yaml(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = WorkflowLoader::new()
            .load_workflow("/nonexistent/workflow.yaml")
            .unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}

// SPDX-License-Identifier: MIT

//! Workflow builder - turns a YAML definition into a compiled graph
//!
//! Every YAML step becomes a [`PromptStep`]; routes become routers built from
//! `when` conditions; `fan_out` entries dispatch one branch per list element.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::adk::client::LlmClient;
use crate::adk::error::WeftError;
use crate::adk::model::{Content, ResponseSchema};
use crate::adk::registry::ToolRegistry;
use crate::weft::workflow::checkpoint::Checkpointer;
use crate::weft::workflow::condition::{self, Expression};
use crate::weft::workflow::graph::{
    CompiledGraph, Dispatch, StateGraph, Step, StepContext, StepError, StepOutput,
};
use crate::weft::workflow::loader::WorkflowLoader;
use crate::weft::workflow::state::{ReducerType, StateUpdate, WorkflowState};
use crate::weft::workflow::types::{node_name, RouteDefinition, StepDefinition, WorkflowDefinition};

/// Label a route yields when no branch matches and none is a fallback
const NO_MATCH: &str = "__no_match__";

/// High-level builder for graphs described in YAML
pub struct WorkflowBuilder {
    loader: WorkflowLoader,
    client: Option<LlmClient>,
    tools: ToolRegistry,
    checkpointer: Option<Arc<dyn Checkpointer>>,
}

impl WorkflowBuilder {
    pub fn new(client: Option<LlmClient>) -> Self {
        Self {
            loader: WorkflowLoader::new(),
            client,
            tools: ToolRegistry::new(),
            checkpointer: None,
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    /// Build a graph from a YAML file path
    pub fn build_file<P: AsRef<Path>>(&self, path: P) -> Result<CompiledGraph, WeftError> {
        let def = self.loader.load_workflow(path)?;
        self.build(&def)
    }

    /// Build a graph from a parsed definition
    pub fn build(&self, def: &WorkflowDefinition) -> Result<CompiledGraph, WeftError> {
        let mut graph = StateGraph::new(def.state.clone()).with_tools(self.tools.clone());
        if let Some(client) = &self.client {
            graph = graph.with_client(client.clone());
        }
        if let Some(checkpointer) = &self.checkpointer {
            graph = graph.with_checkpointer(checkpointer.clone());
        }

        for step_def in &def.steps {
            graph.add_step(&step_def.id, PromptStep::from_definition(step_def, def)?);
        }

        for edge in &def.edges {
            for to in edge.to.to_vec() {
                graph.add_edge(node_name(&edge.from), node_name(&to));
            }
        }

        for route in &def.routes {
            add_route(&mut graph, route)?;
        }

        for fan_out in &def.fan_out {
            let over = fan_out.over.clone();
            let to = fan_out.to.clone();
            let item = fan_out.item.clone();
            graph.add_fan_out(node_name(&fan_out.from), [fan_out.to.clone()], move |state: &WorkflowState| {
                state
                    .get_array(&over)
                    .iter()
                    .map(|value| Dispatch::with(to.clone(), item.clone(), value.clone()))
                    .collect()
            });
        }

        for join in &def.joins {
            graph.add_join(
                join.sources.iter().map(|s| node_name(s).to_string()),
                node_name(&join.target),
            );
        }

        if let Some(guard) = &def.loop_guard {
            graph.loop_guard(&guard.counter, guard.bound);
        }
        if !def.interrupt_before.is_empty() {
            graph.interrupt_before(def.interrupt_before.iter().cloned());
        }

        let compiled = graph.compile()?;
        log::info!(
            "Built workflow '{}' with {} steps",
            def.name,
            compiled.step_names().len()
        );
        Ok(compiled)
    }
}

fn add_route(graph: &mut StateGraph, route: &RouteDefinition) -> Result<(), WeftError> {
    let mut branches: Vec<(Option<Expression>, String)> = Vec::new();
    for branch in &route.branches {
        let expr = branch.when.as_deref().map(condition::parse).transpose()?;
        branches.push((expr, node_name(&branch.goto).to_string()));
    }
    if branches.is_empty() {
        return Err(WeftError::config(format!("route from '{}' has no branches", route.from)));
    }

    let path_map: BTreeMap<String, String> = branches
        .iter()
        .map(|(_, goto)| (goto.clone(), goto.clone()))
        .collect();

    graph.add_conditional_edges(
        node_name(&route.from),
        move |state: &WorkflowState| {
            branches
                .iter()
                .find(|(expr, _)| expr.as_ref().map_or(true, |e| condition::evaluate(e, state)))
                .map(|(_, goto)| goto.clone())
                .unwrap_or_else(|| NO_MATCH.to_string())
        },
        path_map,
    );
    Ok(())
}

/// Render `prompt`, ask the model, write the answer into state
pub struct PromptStep {
    id: String,
    template: String,
    system: Option<String>,
    output: Option<String>,
    schema: Option<ResponseSchema>,
    outputs: BTreeMap<String, String>,
    counter: Option<(String, bool)>,
}

impl PromptStep {
    fn from_definition(step: &StepDefinition, def: &WorkflowDefinition) -> Result<Self, WeftError> {
        if step.output.is_none() && step.outputs.is_none() {
            return Err(WeftError::config(format!(
                "step '{}' needs `output` or `outputs`",
                step.id
            )));
        }
        if step.outputs.is_some() && step.output_schema.is_none() {
            return Err(WeftError::config(format!(
                "step '{}' maps `outputs` but has no `output_schema`",
                step.id
            )));
        }

        let counter = match &step.counter {
            Some(field) => {
                let def = def.state.get(field).ok_or_else(|| {
                    WeftError::config(format!("step '{}' counts into undeclared field '{}'", step.id, field))
                })?;
                Some((field.clone(), def.reducer == ReducerType::Sum))
            }
            None => None,
        };

        Ok(Self {
            id: step.id.clone(),
            template: step.prompt.clone(),
            system: step.system.clone(),
            output: step.output.clone(),
            schema: step.output_schema.clone().map(|schema| ResponseSchema {
                name: format!("{}_output", step.id),
                schema,
            }),
            outputs: step.outputs.clone().unwrap_or_default(),
            counter,
        })
    }

    fn messages(&self, state: &WorkflowState) -> Vec<Content> {
        let mut messages = Vec::new();
        if let Some(system) = &self.system {
            messages.push(Content::system(render(system, state)));
        }
        messages.push(Content::user(render(&self.template, state)));
        messages
    }
}

#[async_trait]
impl Step for PromptStep {
    async fn run(&self, state: WorkflowState, ctx: StepContext) -> Result<StepOutput, StepError> {
        let client = ctx.client()?;
        let messages = self.messages(&state);

        let answer = match &self.schema {
            Some(schema) => client.invoke_value(&messages, schema.clone()).await?,
            None => Value::String(client.invoke(&messages).await?.text()),
        };

        let mut update = StateUpdate::new();
        if let Some(field) = &self.output {
            update.insert(field.clone(), answer.clone());
        }
        for (field, path) in &self.outputs {
            match extract_json_path(&answer, path) {
                Some(value) => update.insert(field.clone(), value),
                None => log::warn!("Step {} answer has nothing at '{}'", self.id, path),
            }
        }
        if let Some((field, summing)) = &self.counter {
            let next = if *summing {
                1
            } else {
                state.get_i64(field).unwrap_or(0) + 1
            };
            update.insert(field.clone(), next);
        }
        Ok(update.into())
    }
}

/// Fill `{field}` and `{field.path}` placeholders from state; anything else
/// in braces is left as written
pub fn render(template: &str, state: &WorkflowState) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}');
        let key = close.map(|c| &after[..c]);
        match key {
            Some(key)
                if !key.is_empty()
                    && key
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') =>
            {
                match state.get_path(key) {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(Value::Null) | None => {}
                    Some(other) => out.push_str(&other.to_string()),
                }
                rest = &after[key.len() + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn extract_json_path(json: &Value, path: &str) -> Option<Value> {
    let mut current = json;
    for part in path.split('.') {
        current = match current {
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            other => other.get(part)?,
        };
    }
    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::model::scripted::ScriptedModel;
    use crate::weft::workflow::graph::{GraphError, RunConfig};
    use crate::weft::workflow::state::{FieldType, StateSchema};
    use serde_json::json;

    const EVALUATOR_YAML: &str = r#"
name: joke_loop
state:
  topic: { type: string }
  joke: { type: string }
  grade: { type: string }
  feedback: { type: string }
  retries: { type: number, default: -1 }
steps:
  - id: write
    prompt: "Write a joke about {topic}. {feedback}"
    output: joke
    counter: retries
  - id: evaluate
    prompt: "Grade this joke: {joke}"
    output_schema: { type: object }
    outputs:
      grade: grade
      feedback: feedback
edges:
  - { from: START, to: write }
  - { from: write, to: evaluate }
routes:
  - from: evaluate
    branches:
      - when: "grade == 'not_funny' and retries < 3"
        goto: write
      - goto: END
loop_guard: { counter: retries, bound: 3 }
"#;

    #[test]
    fn test_render_placeholders() {
        let state = WorkflowState::new(Arc::new(
            StateSchema::new()
                .field("topic", FieldType::String)
                .field("section", FieldType::Object),
        ))
        .merge(&StateUpdate::new().set("topic", "cats").set("section", json!({"name": "Intro"})))
        .unwrap();

        assert_eq!(render("A joke about {topic}", &state), "A joke about cats");
        assert_eq!(render("Write {section.name}!", &state), "Write Intro!");
        assert_eq!(render("{missing} stays empty", &state), " stays empty");
        assert_eq!(render("JSON like {\"a\": 1} is kept", &state), "JSON like {\"a\": 1} is kept");
        assert_eq!(render("unclosed {brace", &state), "unclosed {brace");
    }

    #[tokio::test]
    async fn test_evaluator_workflow_runs_until_bound() {
        let model = Arc::new(ScriptedModel::new(vec![
            Content::model("joke 1"),
            ScriptedModel::structured("evaluate_output", json!({"grade": "not_funny", "feedback": "meh"})),
            Content::model("joke 2"),
            ScriptedModel::structured("evaluate_output", json!({"grade": "not_funny", "feedback": "meh"})),
            Content::model("joke 3"),
            ScriptedModel::structured("evaluate_output", json!({"grade": "not_funny", "feedback": "meh"})),
            Content::model("joke 4"),
            ScriptedModel::structured("evaluate_output", json!({"grade": "not_funny", "feedback": "meh"})),
        ]));
        let def = WorkflowLoader::parse_yaml(EVALUATOR_YAML).unwrap();
        let graph = WorkflowBuilder::new(Some(LlmClient::new(model.clone())))
            .build(&def)
            .unwrap();
        assert!(graph.warnings().is_empty());

        let outcome = graph
            .invoke(StateUpdate::new().set("topic", "cats"), &RunConfig::default())
            .await
            .unwrap();
        assert_eq!(outcome.visits("write"), 4);
        assert_eq!(outcome.state.get_i64("retries"), Some(3));
        assert_eq!(outcome.state.get_str("joke"), Some("joke 4"));
        assert_eq!(model.served(), 8);
    }

    #[tokio::test]
    async fn test_unmatched_route_is_unknown_label() {
        let yaml = r#"
name: strict
state:
  grade: { type: string }
steps:
  - id: grade
    prompt: "Grade"
    output: grade
edges:
  - { from: START, to: grade }
routes:
  - from: grade
    branches:
      - when: "grade == 'funny'"
        goto: END
"#;
        let def = WorkflowLoader::parse_yaml(yaml).unwrap();
        let graph = WorkflowBuilder::new(Some(LlmClient::new(Arc::new(ScriptedModel::texts(["dull"])))))
            .build(&def)
            .unwrap();

        let err = graph.invoke(StateUpdate::new(), &RunConfig::default()).await.unwrap_err();
        assert!(matches!(err.kind, GraphError::UnknownLabel { ref label, .. } if label == NO_MATCH));
        assert_eq!(err.state.get_str("grade"), Some("dull"));
    }

    #[test]
    fn test_bad_condition_is_reported() {
        let mut def = WorkflowLoader::parse_yaml(EVALUATOR_YAML).unwrap();
        def.routes[0].branches[0].when = Some("grade = 'x'".to_string());
        let err = WorkflowBuilder::new(None).build(&def).err().unwrap();
        assert!(matches!(err, WeftError::Condition(_)));
    }

    #[test]
    fn test_step_without_output_is_config_error() {
        let mut def = WorkflowLoader::parse_yaml(EVALUATOR_YAML).unwrap();
        def.steps[0].output = None;
        let err = WorkflowBuilder::new(None).build(&def).err().unwrap();
        assert!(err.to_string().contains("needs `output`"));
    }

    #[test]
    fn test_unknown_edge_target_is_graph_error() {
        let mut def = WorkflowLoader::parse_yaml(EVALUATOR_YAML).unwrap();
        def.edges[1].to = crate::weft::workflow::types::Targets::Single("grade_it".to_string());
        let err = WorkflowBuilder::new(None).build(&def).err().unwrap();
        assert!(matches!(err, WeftError::Graph(GraphError::Compile(_))));
    }
}
